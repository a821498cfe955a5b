use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::Token;
use crate::api::{ClassificationError, Result};

/// File-backed persistence for the access/refresh token pair.
#[derive(Debug, Clone)]
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

    /// Load the saved token.
    ///
    /// Any failure (missing file, unreadable file, malformed JSON, missing
    /// `access_token`/`refresh_token`) is reported as `TokenUnavailable`.
    pub fn load(&self) -> Result<Token> {
        if !self.path.is_file() {
            return Err(ClassificationError::TokenUnavailable(
                "File does not exist".to_string(),
            ));
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            ClassificationError::TokenUnavailable(format!("Error reading token from file: {e}"))
        })?;
        let token: Token = serde_json::from_str(&contents).map_err(|e| {
            ClassificationError::TokenUnavailable(format!("Error parsing token file: {e}"))
        })?;
        token.ensure_usable()?;

        debug!(path = %self.path.display(), "Loaded saved token");
        Ok(token)
    }

    /// Overwrite the token file.
    ///
    /// The token is written to a temporary file in the same directory and
    /// renamed over the target, so readers see either the old or the new
    /// file. The temporary file is removed if anything fails.
    pub fn save(&self, token: &Token) -> Result<()> {
        token.ensure_usable()?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let contents = serde_json::to_string_pretty(token)?;
        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), "Saved token");
        Ok(())
    }

    /// Remove the saved token, if any
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("myfolder").join("my-other-folder").join("token.json"))
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.path().exists());

        let mut token = Token::new("Bearer qwerty", "refresh-me");
        token.expires_in = Some(3600);
        token.expires_at = Some(Utc.timestamp_opt(1_900_000_000, 0).unwrap());
        token.extra.insert("scope".to_string(), json!(["a", "b"]));

        store.save(&token).unwrap();
        assert!(store.path().is_file());
        assert_eq!(store.load().unwrap(), token);
    }

    #[test]
    fn test_load_accepts_fractional_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        std::fs::write(
            store.path(),
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"expires_at":1900000000.5}"#,
        )
        .unwrap();

        let token = store.load().unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.expires_at, Some(Utc.timestamp_opt(1_900_000_000, 0).unwrap()));
        assert!(token.extra.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_in(&dir).load().unwrap_err();
        assert!(matches!(err, ClassificationError::TokenUnavailable(_)));
    }

    #[test]
    fn test_load_rejects_incomplete_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        for contents in [
            r#"{"access_token": "a"}"#,
            r#"{"refresh_token": "r"}"#,
            r#"{"access_token": "", "refresh_token": "r"}"#,
            r#"{"token": "Bearer qwerty", "expires_in": 3600}"#,
            "not json at all",
            "",
        ] {
            std::fs::write(store.path(), contents).unwrap();
            let err = store.load().unwrap_err();
            assert!(
                matches!(err, ClassificationError::TokenUnavailable(_)),
                "{contents:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_save_refuses_unusable_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let err = store.save(&Token::new("a", "")).unwrap_err();
        assert!(matches!(err, ClassificationError::TokenUnavailable(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_overwrites_and_clear_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&Token::new("a1", "r1")).unwrap();
        store.save(&Token::new("a2", "r2")).unwrap();
        assert_eq!(store.load().unwrap().access_token, "a2");

        // Only the token file is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }
}
