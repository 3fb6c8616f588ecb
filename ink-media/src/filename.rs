//! Upload file names.

use chrono::{DateTime, Utc};

/// Reduce a client supplied file name to something safe to store.
///
/// Path components are dropped, whitespace becomes `_`, anything outside
/// ASCII letters, digits, `.`, `-` and `_` is removed, and leading dots or
/// underscores are stripped. An empty result becomes `upload`.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_whitespace() {
            out.push('_');
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }

    let trimmed = out.trim_start_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

/// Lowercased extension after the last `.`, if any.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `YYYYmmdd_HHMMSS_<secure name>`.
pub fn stored_filename(original: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", at.format("%Y%m%d_%H%M%S"), secure_filename(original))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn secure_filename_cleans_names() {
        assert_eq!(secure_filename("My Photo (1).JPG"), "My_Photo_1.JPG");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\temp\\évil.png"), "vil.png");
        assert_eq!(secure_filename("..hidden"), "hidden");
        assert_eq!(secure_filename("___"), "upload");
        assert_eq!(secure_filename(""), "upload");
    }

    #[test]
    fn extensions_are_lowercased() {
        assert_eq!(extension_of("a.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn stored_names_carry_a_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(stored_filename("cat pic.png", at), "20240309_070501_cat_pic.png");
    }
}
