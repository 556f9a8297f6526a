use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::config::config_dir;

/// Name the OpenRouter key is stored under.
pub const API_KEY_NAME: &str = "openrouter_api_key";

/// Environment variable that overrides the stored key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to access credential file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse credential file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize credential file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A single named secret persisted in a small TOML file.
///
/// Every `get` goes to disk, so a key written by another process is picked
/// up on the next read. Other names in the same file are left alone.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    name: String,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Store for the OpenRouter key under the config directory.
    pub fn default_location() -> Self {
        Self::new(config_dir().join("credentials.toml"), API_KEY_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the persisted credential, or `None` if it was never set.
    /// A non-string entry under the name counts as unset.
    pub fn get(&self) -> Result<Option<String>, CredentialError> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(&self.name)
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Persist the credential, overwriting any previous value.
    pub fn set(&self, value: &str) -> Result<(), CredentialError> {
        let mut entries = self.read_entries()?;
        entries.insert(self.name.clone(), toml::Value::String(value.to_string()));
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), "stored credential");
        Ok(())
    }

    /// Remove the credential. Returns whether one was stored.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        let mut entries = self.read_entries()?;
        if entries.remove(&self.name).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }

    fn read_entries(&self) -> Result<toml::Table, CredentialError> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write to an owner-only temp file in the same directory, then rename it
    /// over the target so the secret is never briefly world-readable.
    fn write_entries(&self, entries: &toml::Table) -> Result<(), CredentialError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let content = toml::to_string(entries)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        restrict_permissions(tmp.path())?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Pick the effective credential: a non-empty environment override wins,
/// otherwise whatever the store holds.
pub fn resolve(env_value: Option<String>, stored: Option<String>) -> Option<String> {
    env_value.filter(|v| !v.is_empty()).or(stored)
}

/// Mask a secret for display, keeping the first 6 and last 4 characters.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("credentials.toml"), API_KEY_NAME)
    }

    #[test]
    fn get_without_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        store.set("sk-or-v1-abc123").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("sk-or-v1-abc123"));
    }

    #[test]
    fn set_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        store.set("first").unwrap();
        store.set("second").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn empty_string_is_distinct_from_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        store.set("").unwrap();
        assert_eq!(store.get().unwrap(), Some(String::new()));
    }

    #[test]
    fn get_reads_from_disk_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let other = temp_store(&dir);
        store.set("one").unwrap();
        other.set("two").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn other_entries_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "other_key = \"keep-me\"\n").unwrap();
        let store = CredentialStore::new(&path, API_KEY_NAME);
        store.set("sk-new").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("keep-me"));
        assert!(content.contains("sk-new"));
    }

    #[test]
    fn non_string_entries_do_not_block_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "other_count = 3\nenabled = true\n\n[extra]\nx = 1\n").unwrap();
        let store = CredentialStore::new(&path, API_KEY_NAME);

        assert_eq!(store.get().unwrap(), None);
        store.set("sk-new").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("sk-new"));

        let table: toml::Table = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(table["other_count"].as_integer(), Some(3));
        assert_eq!(table["enabled"].as_bool(), Some(true));
        assert_eq!(table["extra"]["x"].as_integer(), Some(1));
    }

    #[test]
    fn non_string_value_under_name_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, format!("{} = 42\n", API_KEY_NAME)).unwrap();
        let store = CredentialStore::new(&path, API_KEY_NAME);
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        store.set("one").unwrap();
        store.set("two").unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("credentials.toml")]);
    }

    #[test]
    fn clear_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        assert!(!store.clear().unwrap());
        store.set("sk").unwrap();
        assert!(store.clear().unwrap());
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        let store = CredentialStore::new(&path, API_KEY_NAME);
        assert!(matches!(store.get(), Err(CredentialError::Parse(_))));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        store.set("secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn overwriting_a_readable_file_replaces_it_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let before = std::fs::metadata(&path).unwrap();

        let store = CredentialStore::new(&path, API_KEY_NAME);
        store.set("secret").unwrap();

        let after = std::fs::metadata(&path).unwrap();
        assert_eq!(after.permissions().mode() & 0o777, 0o600);
        // Replaced by rename, not rewritten in place.
        use std::os::unix::fs::MetadataExt;
        assert_ne!(before.ino(), after.ino());
    }

    #[test]
    fn resolve_prefers_non_empty_env() {
        assert_eq!(
            resolve(Some("env".into()), Some("stored".into())).as_deref(),
            Some("env")
        );
        assert_eq!(
            resolve(Some(String::new()), Some("stored".into())).as_deref(),
            Some("stored")
        );
        assert_eq!(resolve(None, None), None);
    }

    #[test]
    fn mask_keeps_head_and_tail() {
        assert_eq!(mask("sk-or-v1-0123456789abcdef"), "sk-or-...cdef");
        assert_eq!(mask("short"), "*****");
    }
}
