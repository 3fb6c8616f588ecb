//! Application settings.
//!
//! Layered the same way for every deployment: built-in defaults, then the
//! plain environment variables (`PORT`, `DATABASE_URL`, ...), then
//! `INKWELL__SECTION__KEY` overrides.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use ink_auth::{AuthOptions, DEV_SECRET};
use ink_core::{ConfigSnapshot, InkConfig};
use ink_media::{MediaConfig, DEFAULT_EXTENSIONS};

use crate::store::is_supported_url;

pub const ENV_PREFIX: &str = "INKWELL";

/// Plain environment variables and the config keys they set.
const ENV_KEYS: &[(&str, &str)] = &[
    ("FLASK_ENV", "app.env"),
    // APP_ENV comes second so it wins over the legacy name.
    ("APP_ENV", "app.env"),
    ("HOST", "http.host"),
    ("PORT", "http.port"),
    ("DATABASE_URL", "database.url"),
    ("SECRET_KEY", "auth.secret"),
    ("BCRYPT_LOG_ROUNDS", "auth.bcrypt_rounds"),
    ("SUPER_ADMINS", "auth.super_admins"),
    ("MAIN_DOMAIN", "tenancy.main_domain"),
    ("DEFAULT_TENANT", "tenancy.default_tenant"),
    ("FALLBACK_HOSTS", "tenancy.fallback_hosts"),
    ("UPLOAD_FOLDER", "media.upload_folder"),
    ("MAX_CONTENT_LENGTH", "media.max_content_length"),
    ("ALLOWED_EXTENSIONS", "media.allowed_extensions"),
    ("POSTS_PER_PAGE", "posts.per_page"),
    ("ADMIN_POSTS_PER_PAGE", "posts.admin_per_page"),
    ("BOOTSTRAP_ADMIN_EMAIL", "bootstrap.admin_email"),
    ("BOOTSTRAP_ADMIN_PASSWORD", "bootstrap.admin_password"),
    ("BOOTSTRAP_ADMIN_USERNAME", "bootstrap.admin_username"),
];

const DEFAULTS: &[(&str, &str)] = &[
    ("app.env", "development"),
    ("http.host", "0.0.0.0"),
    ("http.port", "5000"),
    ("database.url", "sqlite://inkwell.db"),
    ("auth.secret", DEV_SECRET),
    ("auth.bcrypt_rounds", "12"),
    ("tenancy.main_domain", "localhost"),
    ("tenancy.default_tenant", "main"),
    ("tenancy.fallback_hosts", "localhost,127.0.0.1"),
    ("media.upload_folder", "./uploads"),
    ("media.url_prefix", "/uploads"),
    ("posts.per_page", "10"),
    ("posts.admin_per_page", "20"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "default" | "" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("unknown environment '{other}'"),
        }
    }
}

/// First admin created together with the default tenant.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct CmsConfig {
    pub env: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub main_domain: String,
    pub default_tenant: String,
    pub fallback_hosts: Vec<String>,
    /// `None` keeps uploaded files in memory.
    pub upload_folder: Option<PathBuf>,
    pub media: MediaConfig,
    pub auth: AuthOptions,
    pub posts_per_page: usize,
    pub admin_posts_per_page: usize,
    pub bootstrap: Option<BootstrapAdmin>,
}

fn required<T: FromStr>(snap: &ConfigSnapshot, key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = snap.get(key).unwrap_or_default();
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value '{raw}' for {key}: {e}"))
}

impl CmsConfig {
    /// Layer defaults, mapped variables and prefixed overrides from `vars`.
    pub fn layered<I>(vars: I) -> InkConfig
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let mut cfg = InkConfig::new();
        for (key, value) in DEFAULTS {
            cfg.set(*key, *value);
        }
        for (var, key) in ENV_KEYS {
            if let Some((_, value)) = vars.iter().find(|(k, _)| k == var) {
                cfg.set(*key, value.clone());
            }
        }
        cfg.load_env(ENV_PREFIX, vars);
        cfg
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_snapshot(&Self::layered(vars).snapshot())
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_snapshot(snap: &ConfigSnapshot) -> Result<Self> {
        let env: Environment = required(snap, "app.env")?;

        let database_url = snap.get_string("database.url").unwrap_or_default();
        if !is_supported_url(&database_url) {
            bail!("unsupported DATABASE_URL '{database_url}': use sqlite: or memory://");
        }

        let upload_folder = match snap.get("media.upload_folder").map(str::trim) {
            None | Some("") | Some("memory") => None,
            Some(path) => Some(PathBuf::from(path)),
        };

        let mut media = MediaConfig::default();
        if let Some(max) = snap.get("media.max_content_length") {
            media = media.with_max_file_bytes(
                max.trim()
                    .parse()
                    .with_context(|| format!("invalid MAX_CONTENT_LENGTH '{max}'"))?,
            );
        }
        let extensions = snap.get_list("media.allowed_extensions");
        media = if extensions.is_empty() {
            media.with_allowed_extensions(DEFAULT_EXTENSIONS.iter().copied())
        } else {
            media.with_allowed_extensions(extensions)
        };
        if let Some(prefix) = snap.get_string("media.url_prefix") {
            media = media.with_url_prefix(prefix);
        }

        let auth = AuthOptions::default()
            .with_secret(snap.get_string("auth.secret").unwrap_or_else(|| DEV_SECRET.to_string()))
            .with_bcrypt_cost(required(snap, "auth.bcrypt_rounds")?)
            .with_super_admins(snap.get_list("auth.super_admins"));
        if env.is_production() {
            auth.validate_for_production()?;
        } else {
            auth.validate()?;
        }

        let bootstrap = match (
            snap.get_string("bootstrap.admin_email"),
            snap.get_string("bootstrap.admin_password"),
        ) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some(BootstrapAdmin {
                username: snap
                    .get_string("bootstrap.admin_username")
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| "admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            env,
            host: snap.get_string("http.host").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: required(snap, "http.port")?,
            database_url,
            main_domain: snap
                .get_string("tenancy.main_domain")
                .unwrap_or_else(|| "localhost".to_string()),
            default_tenant: snap
                .get_string("tenancy.default_tenant")
                .unwrap_or_else(|| "main".to_string()),
            fallback_hosts: snap.get_list("tenancy.fallback_hosts"),
            upload_folder,
            media,
            auth,
            posts_per_page: required::<usize>(snap, "posts.per_page")?.max(1),
            admin_posts_per_page: required::<usize>(snap, "posts.admin_per_page")?.max(1),
            bootstrap,
        })
    }

    /// In-memory database and files, cheap bcrypt, `inkwell.test` as main domain.
    pub fn for_tests() -> Result<Self> {
        Self::from_vars(
            [
                ("APP_ENV", "testing"),
                ("MAIN_DOMAIN", "inkwell.test"),
                ("SECRET_KEY", "test-secret"),
                ("BCRYPT_LOG_ROUNDS", "4"),
                ("UPLOAD_FOLDER", "memory"),
                ("DATABASE_URL", "memory://"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
