//! Auth token persistence.
//!
//! Tokens are pre-obtained by the user (tk/rtk/itk from a logged-in browser
//! session) and injected into localStorage before the flow starts. They are
//! kept in a flat JSON file next to the working directory, overwritten
//! wholesale on every save. Single writer assumed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl Tokens {
    pub fn has_any(&self) -> bool {
        self.tk.is_some() || self.rtk.is_some() || self.itk.is_some()
    }
}

/// File-backed token store.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files are treated as "no saved tokens", never as
    /// an error.
    pub fn load(&self) -> Option<Tokens> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Stamps `saved_at` and overwrites the file. A write failure must not
    /// interrupt the flow, so it is only logged.
    pub fn save(&self, tokens: &Tokens) {
        let stamped = Tokens {
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            ..tokens.clone()
        };
        match serde_json::to_string_pretty(&stamped) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    log::warn!("could not save tokens to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => log::warn!("could not serialize tokens: {}", e),
        }
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Masks a token for console display: first 20 chars + last 8. Pasted
/// tokens are arbitrary text, so indexing is by char, not byte.
pub fn mask(token: Option<&str>) -> String {
    let chars: Vec<char> = match token {
        Some(t) => t.chars().collect(),
        None => Vec::new(),
    };
    if chars.len() < 20 {
        return "(vazio)".to_string();
    }
    let head: String = chars[..20].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> TokenStore {
        let path = std::env::temp_dir().join(format!(
            "ra-tester-{}-{}.json",
            name,
            uuid::Uuid::new_v4()
        ));
        TokenStore::new(path)
    }

    #[test]
    fn test_token_round_trip() {
        let store = temp_store("roundtrip");
        let tokens = Tokens {
            tk: Some("a".to_string()),
            rtk: Some("b".to_string()),
            itk: Some("c".to_string()),
            saved_at: None,
        };

        store.save(&tokens);
        let loaded = store.load().expect("tokens should load back");

        assert_eq!(loaded.tk.as_deref(), Some("a"));
        assert_eq!(loaded.rtk.as_deref(), Some("b"));
        assert_eq!(loaded.itk.as_deref(), Some("c"));
        assert!(loaded.saved_at.is_some());

        store.clear().unwrap();
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let store = temp_store("missing");
        assert!(store.load().is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_none() {
        let store = temp_store("corrupt");
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(None), "(vazio)");
        assert_eq!(mask(Some("short")), "(vazio)");
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        let masked = mask(Some(long));
        assert!(masked.starts_with("abcdefghijklmnopqrst"));
        assert!(masked.ends_with("23456789"));
        assert!(masked.contains("..."));
    }

    #[test]
    fn test_mask_multibyte_token() {
        // ç is two bytes; byte indexing would split it at position 20
        let long = "açãoâêîôûçãoâêîôûçãoâêîôûçãoâêîôû";
        let masked = mask(Some(long));
        assert!(masked.contains("..."));
        assert_eq!(masked.chars().count(), 20 + 3 + 8);
    }
}
