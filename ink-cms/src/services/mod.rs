use std::sync::Arc;

use ink_auth::Authenticator;
use ink_core::{InkApp, InkService};
use ink_media::MediaAdapter;
use serde_json::Value;

use crate::config::CmsConfig;
use crate::store::CmsState;

pub mod types;
pub use types::{Caller, CmsParams};

pub mod shared;

pub mod categories;
pub mod comments;
pub mod media;
pub mod posts;
pub mod settings;
pub mod tags;
pub mod tenants;
pub mod users;

pub type CmsService = Arc<dyn InkService<Value, CmsParams>>;

/// The registered services, ready to be mounted.
pub struct CmsServices {
    pub posts: CmsService,
    pub categories: CmsService,
    pub tags: CmsService,
    pub comments: CmsService,
    pub media: CmsService,
    pub users: CmsService,
    pub settings: CmsService,
    pub tenants: CmsService,
}

fn register(app: &InkApp<Value, CmsParams>, name: &str, svc: CmsService) -> CmsService {
    app.register_service(name, Arc::clone(&svc));
    svc
}

pub fn configure(
    app: &InkApp<Value, CmsParams>,
    state: Arc<CmsState>,
    auth: Arc<Authenticator>,
    media: MediaAdapter,
    config: &CmsConfig,
) -> anyhow::Result<CmsServices> {
    let per_page = config.admin_posts_per_page;

    let posts = register(app, "posts", Arc::new(posts::PostsService::new(Arc::clone(&state), per_page)));
    posts::posts_shared::register_hooks(app)?;

    let categories = register(app, "categories", Arc::new(categories::CategoriesService::new(Arc::clone(&state))));
    categories::categories_shared::register_hooks(app)?;

    let tags = register(app, "tags", Arc::new(tags::TagsService::new(Arc::clone(&state))));
    tags::tags_shared::register_hooks(app)?;

    let comments = register(app, "comments", Arc::new(comments::CommentsService::new(Arc::clone(&state))));
    comments::comments_shared::register_hooks(app)?;

    let media_svc = register(
        app,
        "media",
        Arc::new(media::MediaService::new(Arc::clone(&state), media.clone(), per_page)),
    );

    let users = register(app, "users", Arc::new(users::UsersService::new(Arc::clone(&state))));
    users::users_shared::register_hooks(app, Arc::clone(&auth))?;

    let settings = register(app, "settings", Arc::new(settings::SettingsService::new(Arc::clone(&state))));
    settings::settings_shared::register_hooks(app)?;

    let tenants = register(app, "tenants", Arc::new(tenants::TenantsService::new(state, media, auth)));
    tenants::tenants_shared::register_hooks(app)?;

    tracing::debug!(services = ?app.service_names(), "services configured");

    Ok(CmsServices {
        posts,
        categories,
        tags,
        comments,
        media: media_svc,
        users,
        settings,
        tenants,
    })
}
