//! Helpers shared by the CMS services.

use anyhow::Result;
use ink_core::errors::InkError;
use ink_core::{ServiceCapabilities, ServiceMethodKind};

use super::CmsParams;

pub const MAX_PER_PAGE: usize = 100;

pub fn crud_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Create,
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Update,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

/// Patch and remove only work on one record here.
pub fn require_id<'a>(entity: &str, id: Option<&'a str>) -> Result<&'a str> {
    id.filter(|id| !id.trim().is_empty())
        .ok_or_else(|| InkError::bad_request(format!("{entity} id is required")).into_anyhow())
}

/// Page `page` (1-based) of `perPage` items; out of range pages are empty.
pub fn paginate<T>(items: Vec<T>, params: &CmsParams, default_per_page: usize) -> Vec<T> {
    let page = params.query_usize("page").unwrap_or(1).max(1);
    let per_page = params
        .query_usize("perPage")
        .or_else(|| params.query_usize("per_page"))
        .unwrap_or(default_per_page)
        .clamp(1, MAX_PER_PAGE);

    items
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect()
}

/// Reads `?{key}=` as an id, `None` when absent; a malformed id is a 400.
pub fn query_id(params: &CmsParams, key: &str) -> Result<Option<u64>> {
    match params.query_str(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| InkError::bad_request(format!("'{key}' must be a numeric id")).into_anyhow()),
    }
}
