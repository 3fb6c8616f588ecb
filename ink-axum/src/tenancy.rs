//! Host based tenant resolution.
//!
//! Every request is mapped from its `Host` header to a [`TenantContext`]
//! before any handler runs:
//!
//! - `acme.example.com` with main domain `example.com` → subdomain `acme`
//! - `example.com`, or a fallback host such as `localhost` → default tenant
//! - anything else → custom domain lookup
//!
//! Unknown or inactive tenants answer 404 and never reach a handler.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ink_core::errors::InkError;
use ink_core::tenant::TenantContext;

use crate::InkAxumError;

/// How a host name addresses a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatch {
    /// The main domain or a fallback host.
    Default,
    Subdomain(String),
    CustomDomain(String),
    /// Malformed host or a subdomain label that can't name a tenant.
    Invalid,
}

#[derive(Debug, Clone)]
pub struct HostRules {
    pub main_domain: String,
    /// Exact hosts, or `*.suffix` patterns, served by the default tenant.
    pub fallback_hosts: Vec<String>,
}

impl HostRules {
    pub fn new(main_domain: impl Into<String>) -> Self {
        Self {
            main_domain: main_domain.into().trim().trim_end_matches('.').to_ascii_lowercase(),
            fallback_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }

    pub fn with_fallback_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_hosts = hosts
            .into_iter()
            .map(|h| h.into().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    fn is_fallback(&self, host: &str) -> bool {
        self.fallback_hosts.iter().any(|pattern| match pattern.strip_prefix("*.") {
            Some(suffix) => host.len() > suffix.len() && host.ends_with(&format!(".{suffix}")),
            None => pattern == host,
        })
    }

    pub fn classify(&self, raw_host: &str) -> HostMatch {
        let Some(host) = normalize_host(raw_host) else {
            return HostMatch::Invalid;
        };

        if host == self.main_domain || self.is_fallback(&host) {
            return HostMatch::Default;
        }

        if let Some(label) = host.strip_suffix(&format!(".{}", self.main_domain)) {
            return if is_valid_subdomain(label) {
                HostMatch::Subdomain(label.to_string())
            } else {
                HostMatch::Invalid
            };
        }

        HostMatch::CustomDomain(host)
    }
}

/// Lowercase, strip the port and any trailing dot.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim().to_ascii_lowercase();

    let host = if let Some(rest) = raw.strip_prefix('[') {
        // [v6]:port
        let end = rest.find(']')?;
        format!("[{}]", &rest[..end])
    } else {
        match raw.rsplit_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h.to_string(),
            _ => raw,
        }
    };

    let host = host.trim_end_matches('.').to_string();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host)
}

/// A single DNS label made of ASCII letters, digits, `-` and `_`.
pub fn is_valid_subdomain(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && label.chars().any(|c| c.is_ascii_alphanumeric())
}

/// Looks tenants up for a classified host.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// `Ok(None)` when no active tenant answers to `host`.
    async fn resolve(&self, host: &HostMatch) -> anyhow::Result<Option<TenantContext>>;
}

/// State for the [`resolve_tenant`] middleware.
#[derive(Clone)]
pub struct Tenancy {
    resolver: Arc<dyn TenantResolver>,
    rules: Arc<HostRules>,
    exempt: Arc<Vec<String>>,
}

impl Tenancy {
    pub fn new(resolver: Arc<dyn TenantResolver>, rules: HostRules) -> Self {
        Self {
            resolver,
            rules: Arc::new(rules),
            exempt: Arc::new(Vec::new()),
        }
    }

    /// Serve `path` without a tenant (health checks and the like).
    pub fn exempt(mut self, path: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.exempt).push(path.into());
        self
    }

    pub fn rules(&self) -> &HostRules {
        &self.rules
    }

    pub async fn resolve_host(&self, raw_host: &str) -> anyhow::Result<Option<TenantContext>> {
        match self.rules.classify(raw_host) {
            HostMatch::Invalid => Ok(None),
            host => self.resolver.resolve(&host).await,
        }
    }
}

fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
}

pub async fn resolve_tenant(State(tenancy): State<Tenancy>, mut req: Request, next: Next) -> Response {
    if tenancy.exempt.iter().any(|p| p == req.uri().path()) {
        return next.run(req).await;
    }

    let Some(host) = request_host(&req) else {
        return InkAxumError::from(InkError::bad_request("Missing Host header")).into_response();
    };

    match tenancy.resolve_host(&host).await {
        Ok(Some(tenant)) => {
            tracing::debug!(%host, tenant = %tenant.tenant_id, "tenant resolved");
            req.extensions_mut().insert(tenant);
            next.run(req).await
        }
        Ok(None) => {
            tracing::debug!(%host, "no tenant for host");
            InkAxumError::from(InkError::not_found("Tenant not found")).into_response()
        }
        Err(e) => InkAxumError::from(e).into_response(),
    }
}

/// Extractor for the tenant resolved by [`resolve_tenant`].
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = InkAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(Tenant)
            .ok_or_else(|| InkError::not_found("Tenant not found").into())
    }
}
