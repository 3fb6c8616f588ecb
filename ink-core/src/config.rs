//! # Configuration
//!
//! A string key/value store with `app.set()` / `app.get()` access. Hooks
//! receive an immutable [`ConfigSnapshot`] taken when the call starts.
//!
//! ```rust
//! use ink_core::InkApp;
//! let app = InkApp::<(), ()>::new();
//!
//! app.set("paginate.default", "10");
//! assert_eq!(app.get("paginate.default"), Some("10".to_string()));
//! ```
//!
//! Environment overrides use a prefix and double underscores as the
//! separator: `INKWELL__PAGINATE__DEFAULT=25` becomes
//! `paginate.default = 25` (see [`InkConfig::load_env`]).

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InkConfig {
    values: HashMap<String, String>,
}

impl InkConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy `PREFIX__A__B=v` pairs from `vars` into `a.b = v`.
    pub fn load_env<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// `true/1/yes/on` and `false/0/no/off`, case-insensitive.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_flag)
    }

    /// Comma separated list, entries trimmed, empties dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_prefix_maps_to_dotted_keys() {
        let mut cfg = InkConfig::new();
        cfg.load_env(
            "INKWELL",
            vec![
                ("INKWELL__PAGINATE__DEFAULT".to_string(), "25".to_string()),
                ("OTHER__X".to_string(), "1".to_string()),
            ],
        );
        let snap = cfg.snapshot();
        assert_eq!(snap.get_usize("paginate.default"), Some(25));
        assert!(!cfg.has("x"));
    }

    #[test]
    fn flags_and_lists() {
        let mut cfg = InkConfig::new();
        cfg.set("a", "Yes");
        cfg.set("b", "png, jpg,,gif");
        let snap = cfg.snapshot();
        assert_eq!(snap.get_bool("a"), Some(true));
        assert_eq!(snap.get_list("b"), vec!["png", "jpg", "gif"]);
        assert_eq!(snap.get_bool("missing"), None);
    }
}
