use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ink_auth::{AuthError, Authenticator, Role};
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use ink_media::MediaAdapter;
use serde_json::Value;

use crate::services::media::media_shared::delete_tenant_blobs;
use crate::services::shared::{paginate, require_id, MAX_PER_PAGE};
use crate::services::users::users_shared::{insert_user, NewUser};
use crate::services::CmsParams;
use crate::store::{parse_id, CmsState, NewTenant};
use crate::validate::{validate, FieldErrors};

use super::tenants_schema::{CreateTenant, PatchTenant, ERROR_MESSAGE};
use super::tenants_shared::{self, check_admin_fields};

/// The global tenant directory. Every method ignores the request's own
/// tenant; only super admins get here.
pub struct TenantsService {
    state: Arc<CmsState>,
    media: MediaAdapter,
    auth: Arc<Authenticator>,
}

impl TenantsService {
    pub fn new(state: Arc<CmsState>, media: MediaAdapter, auth: Arc<Authenticator>) -> Self {
        Self { state, media, auth }
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for TenantsService {
    fn capabilities(&self) -> ServiceCapabilities {
        tenants_shared::capabilities()
    }

    /// By id; `?active=` and `?q=` (name, subdomain, domain) filter.
    async fn find(&self, _ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        let active = params.query_bool("active");
        let needle = params.query_str("q").map(str::to_lowercase);

        let tenants: Vec<_> = self
            .state
            .tenants
            .list()
            .await?
            .into_iter()
            .filter(|t| active.map_or(true, |a| t.is_active == a))
            .filter(|t| {
                needle.as_deref().map_or(true, |q| {
                    t.name.to_lowercase().contains(q)
                        || t.subdomain.contains(q)
                        || t.custom_domain.as_deref().is_some_and(|d| d.contains(q))
                })
            })
            .collect();

        Ok(paginate(tenants, &params, MAX_PER_PAGE)
            .iter()
            .map(|t| t.to_json())
            .collect())
    }

    async fn get(&self, _ctx: &TenantContext, id: &str, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Tenant", id)?;
        self.state
            .tenants
            .get(id)
            .await?
            .map(|t| t.to_json())
            .ok_or_else(|| InkError::not_found("Tenant not found").into_anyhow())
    }

    /// Creates the tenant and its first admin. The tenant is removed again
    /// when the admin can't be created.
    async fn create(&self, _ctx: &TenantContext, data: Value, _params: CmsParams) -> Result<Value> {
        let input: CreateTenant = validate(&data, ERROR_MESSAGE)?;
        let mut errors = FieldErrors::default();
        check_admin_fields(&input, self.auth.options().password.min_length, &mut errors);
        errors.finish(ERROR_MESSAGE)?;

        let password_hash = self
            .auth
            .hash_password(&input.admin_password)
            .map_err(AuthError::into_anyhow)?;

        let tenant = self
            .state
            .tenants
            .create(NewTenant {
                name: input.name,
                subdomain: input.subdomain,
                custom_domain: input.custom_domain,
                title: input.title,
                description: input.description,
                theme: input.theme,
            })
            .await?;

        let admin = insert_user(
            &self.state,
            &tenant.context(),
            NewUser {
                email: input.admin_email,
                username: input.admin_username,
                password_hash,
                first_name: input.admin_first_name.unwrap_or_default(),
                last_name: input.admin_last_name.unwrap_or_default(),
                role: Role::Admin,
                is_active: true,
                is_super_admin: false,
            },
        )
        .await;

        let admin = match admin {
            Ok(admin) => admin,
            Err(e) => {
                self.state.tenants.remove(tenant.id).await?;
                tracing::warn!(tenant = tenant.id, error = %e, "tenant rolled back");
                return Err(e);
            }
        };

        let mut body = tenant.to_json();
        body["admin"] = admin.to_json();
        Ok(body)
    }

    async fn patch(&self, _ctx: &TenantContext, id: Option<&str>, data: Value, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Tenant", require_id("Tenant", id)?)?;
        let input: PatchTenant = validate(&data, ERROR_MESSAGE)?;
        let tenant = self.state.tenants.update(id, input.into()).await?;
        tracing::info!(tenant = id, active = tenant.is_active, "tenant updated");
        Ok(tenant.to_json())
    }

    /// Deletes the tenant with all of its rows and blobs. The default
    /// tenant stays.
    ///
    /// The directory entry goes first so no request resolves to the tenant
    /// while its partition is being emptied.
    async fn remove(&self, _ctx: &TenantContext, id: Option<&str>, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Tenant", require_id("Tenant", id)?)?;
        let tenant = self
            .state
            .tenants
            .get(id)
            .await?
            .ok_or_else(|| InkError::not_found("Tenant not found").into_anyhow())?;
        if tenant.subdomain == self.state.tenants.default_subdomain() {
            return Err(InkError::bad_request("The default tenant cannot be removed").into_anyhow());
        }

        let tenant = self.state.tenants.remove(id).await?;
        let ctx = tenant.context();
        let blobs = delete_tenant_blobs(&self.state, &self.media, &ctx).await?;
        let rows = self.state.purge_tenant(&ctx.tenant_id).await?;

        tracing::info!(tenant = id, rows, blobs, "tenant removed");
        Ok(tenant.to_json())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ink_auth::AuthOptions;
    use ink_axum::{HostMatch, TenantResolver};
    use ink_core::ErrorKind;
    use ink_media::{MediaConfig, MediaUpload, MemoryBlobStore};
    use serde_json::json;

    use super::*;
    use crate::services::media::media_shared::record_upload;

    async fn service() -> (TenantsService, Arc<CmsState>, MediaAdapter) {
        let state = Arc::new(CmsState::in_memory("main").await.unwrap());
        let auth = Authenticator::new(AuthOptions::default().with_bcrypt_cost(4)).unwrap();
        let media = MediaAdapter::new(MemoryBlobStore::new(), MediaConfig::default());
        (TenantsService::new(Arc::clone(&state), media.clone(), Arc::new(auth)), state, media)
    }

    fn body(subdomain: &str, email: &str) -> Value {
        json!({
            "name": "Acme",
            "subdomain": subdomain,
            "admin_email": email,
            "admin_username": "acme-admin",
            "admin_password": "secret1",
        })
    }

    #[tokio::test]
    async fn creates_tenant_with_first_admin() {
        let (svc, state, _) = service().await;
        let any = TenantContext::new("0");

        let created = svc.create(&any, body("acme", "Ops@Acme.org"), CmsParams::system()).await.unwrap();
        assert_eq!(created["subdomain"], "acme");
        assert_eq!(created["admin"]["role"], "admin");
        assert_eq!(created["admin"]["email"], "ops@acme.org");

        let tenant = state.tenants.by_subdomain("acme").await.unwrap().unwrap();
        assert_eq!(state.users.count(&tenant.context(), |u| u.role == Role::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn admin_fields_are_checked_before_anything_is_created() {
        let (svc, state, _) = service().await;
        let any = TenantContext::new("0");

        let mut bad = body("acme", "not-an-email");
        bad["admin_password"] = json!("123");
        let err = svc.create(&any, bad, CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);
        let errors = InkError::from_anyhow(&err).unwrap().errors.clone().unwrap();
        assert!(errors.get("admin_email").is_some());
        assert!(errors.get("admin_password").is_some());
        assert!(state.tenants.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_tenant_survives_and_others_are_purged() {
        let (svc, state, _) = service().await;
        let any = TenantContext::new("0");

        let main = svc.create(&any, body("main", "a@main.org"), CmsParams::system()).await.unwrap();
        let acme = svc.create(&any, body("acme", "a@acme.org"), CmsParams::system()).await.unwrap();

        let main_id = main["id"].to_string();
        let err = svc.remove(&any, Some(&main_id), CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::BadRequest);

        let acme_id = acme["id"].as_u64().unwrap();
        let acme_ctx = state.tenants.get(acme_id).await.unwrap().unwrap().context();
        svc.remove(&any, Some(&acme_id.to_string()), CmsParams::system()).await.unwrap();
        assert!(state.tenants.get(acme_id).await.unwrap().is_none());
        assert_eq!(state.users.count(&acme_ctx, |_| true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn removed_tenants_stop_resolving_and_lose_their_files() {
        let (svc, state, media) = service().await;
        let any = TenantContext::new("0");

        let acme = svc.create(&any, body("acme", "a@acme.org"), CmsParams::system()).await.unwrap();
        let acme_id = acme["id"].as_u64().unwrap();
        let ctx = state.tenants.get(acme_id).await.unwrap().unwrap().context();
        let file = record_upload(
            &state,
            &media,
            &ctx,
            1,
            MediaUpload {
                original_filename: "brief.pdf".into(),
                content_type: Some("application/pdf".into()),
                data: Bytes::from_static(b"%PDF-1.4"),
            },
        )
        .await
        .unwrap();

        svc.remove(&any, Some(&acme_id.to_string()), CmsParams::system()).await.unwrap();

        let host = HostMatch::Subdomain("acme".into());
        assert!(state.resolve(&host).await.unwrap().is_none());
        assert!(media.open(&file.storage_key).await.is_err());
        assert_eq!(state.media.count(&ctx, |_| true).await.unwrap(), 0);

        let missing = svc.remove(&any, Some(&acme_id.to_string()), CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&missing), ErrorKind::NotFound);
    }
}
