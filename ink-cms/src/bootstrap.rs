//! First-run data: the default tenant and, when configured, its admin.
//!
//! Super admin rights are granted here and nowhere else: admins of the
//! default tenant whose address is on the `SUPER_ADMINS` list get the
//! flag when the server starts.

use anyhow::Result;
use ink_auth::{AuthError, Authenticator, Role};

use ink_core::TenantContext;

use crate::config::{BootstrapAdmin, CmsConfig};
use crate::models::Tenant;
use crate::services::users::users_shared::{insert_user, NewUser};
use crate::store::{CmsState, NewTenant};

/// Ensures the default tenant exists and seeds the bootstrap admin into it.
/// Safe to call more than once.
pub async fn seed(state: &CmsState, auth: &Authenticator, config: &CmsConfig) -> Result<Tenant> {
    let tenant = match state.tenants.by_subdomain(&config.default_tenant).await? {
        Some(t) => t,
        None => {
            state
                .tenants
                .create(NewTenant {
                    name: "Main Site".to_string(),
                    subdomain: config.default_tenant.clone(),
                    ..NewTenant::default()
                })
                .await?
        }
    };

    let ctx = tenant.context();
    if let Some(admin) = &config.bootstrap {
        seed_admin(state, auth, &ctx, admin).await?;
    }

    let promoted = state
        .users
        .update_all(&ctx, |u| {
            let listed = u.is_active && u.role == Role::Admin && config.auth.is_super_admin_email(&u.email);
            if !listed || u.is_super_admin {
                return false;
            }
            u.is_super_admin = true;
            true
        })
        .await?;
    if promoted > 0 {
        tracing::info!(tenant = tenant.id, promoted, "super admins granted");
    }
    Ok(tenant)
}

async fn seed_admin(state: &CmsState, auth: &Authenticator, ctx: &TenantContext, admin: &BootstrapAdmin) -> Result<()> {
    let email = admin.email.trim().to_lowercase();
    if state.users.find_one(ctx, |u| u.email == email).await?.is_some() {
        return Ok(());
    }

    let password_hash = auth.hash_password(&admin.password).map_err(AuthError::into_anyhow)?;
    insert_user(
        state,
        ctx,
        NewUser {
            email,
            username: admin.username.clone(),
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Admin,
            is_active: true,
            is_super_admin: true,
        },
    )
    .await?;
    tracing::info!(tenant = %ctx.tenant_id, "bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeding_twice_keeps_one_tenant_and_one_admin() {
        let mut config = CmsConfig::for_tests().unwrap();
        config.bootstrap = Some(BootstrapAdmin {
            email: "Owner@Example.com".into(),
            username: "owner".into(),
            password: "secret123".into(),
        });
        let auth = Authenticator::new(config.auth.clone()).unwrap();
        let state = CmsState::in_memory(&config.default_tenant).await.unwrap();

        let first = seed(&state, &auth, &config).await.unwrap();
        let second = seed(&state, &auth, &config).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(state.tenants.list().await.unwrap().len(), 1);

        let users = state.users.find(&first.context(), |_| true).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "owner@example.com");
        assert!(users[0].is_super_admin);
    }

    #[tokio::test]
    async fn listed_admins_of_the_default_tenant_are_promoted_at_startup() {
        let mut config = CmsConfig::for_tests().unwrap();
        config.auth = config.auth.clone().with_super_admins(["root@platform.io", "ops@platform.io"]);
        let auth = Authenticator::new(config.auth.clone()).unwrap();
        let state = CmsState::in_memory(&config.default_tenant).await.unwrap();
        let main = seed(&state, &auth, &config).await.unwrap();
        let other = state
            .tenants
            .create(NewTenant {
                name: "Other".into(),
                subdomain: "other".into(),
                ..NewTenant::default()
            })
            .await
            .unwrap();

        let user = |email: &str, role| NewUser {
            email: email.into(),
            username: email.split('@').next().unwrap_or_default().into(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role,
            is_active: true,
            is_super_admin: false,
        };
        insert_user(&state, &main.context(), user("root@platform.io", Role::Admin)).await.unwrap();
        insert_user(&state, &other.context(), user("root@platform.io", Role::Admin)).await.unwrap();
        insert_user(&state, &main.context(), user("OPS@platform.io", Role::Editor)).await.unwrap();

        seed(&state, &auth, &config).await.unwrap();

        let main_users = state.users.find(&main.context(), |_| true).await.unwrap();
        let admin = main_users.iter().find(|u| u.role == Role::Admin).unwrap();
        assert!(admin.is_super_admin);
        let editor = main_users.iter().find(|u| u.role == Role::Editor).unwrap();
        assert!(!editor.is_super_admin);
        let elsewhere = state.users.find(&other.context(), |_| true).await.unwrap();
        assert!(!elsewhere[0].is_super_admin);
    }
}
