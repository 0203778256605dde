//! The persistent document: load, typed access, and durable save.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use trellis_types::{BotError, Platform};

use crate::keys;

/// The entire bot state as one versioned JSON object document.
///
/// Defaults are merged *under* loaded values, so adding a new default key
/// in an upgrade never erases existing user data and never needs a
/// migration step.
pub struct BotData {
    path: PathBuf,
    defaults: Map<String, Value>,
    doc: Map<String, Value>,
}

impl BotData {
    /// Create a store over `path`, seeded with the default document.
    ///
    /// Nothing touches the filesystem until [`BotData::load`].
    pub fn new(path: impl Into<PathBuf>, default_prefix: &str, currency_emoji: &str) -> Self {
        let mut defaults = Map::new();
        for platform in [Platform::Twitch, Platform::Discord, Platform::Petal] {
            defaults.insert(platform.prefix_key(), Value::from(default_prefix));
        }
        defaults.insert(keys::CURRENCY_EMOJI.into(), Value::from(currency_emoji));
        defaults.insert(keys::BALANCE_LEADERBOARD.into(), Value::Array(Vec::new()));
        defaults.insert(keys::DAILY_REMINDERS.into(), Value::Array(Vec::new()));

        Self {
            path: path.into(),
            doc: defaults.clone(),
            defaults,
        }
    }

    /// Read the document from the backing file.
    ///
    /// A missing file is not an error: a fresh document seeded with the
    /// defaults is written out and used. Any other read or parse failure
    /// is fatal and propagates; the process must not start with a
    /// partially-loaded state.
    pub async fn load(&mut self) -> Result<(), BotError> {
        info!(path = %self.path.display(), "loading data");

        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let loaded: Map<String, Value> = serde_json::from_str(&raw)
                    .map_err(|e| BotError::Persistence(format!("malformed data file: {e}")))?;

                // Defaults merge under loaded values.
                let mut doc = self.defaults.clone();
                for (key, value) in loaded {
                    doc.insert(key, value);
                }
                self.doc = doc;
                info!("loaded data");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("data file not found, creating a new one");
                self.doc = self.defaults.clone();
                write_document(&self.path, &self.doc).await?;
                info!("created data file");
                Ok(())
            }
            Err(e) => Err(BotError::Persistence(format!(
                "failed to read data file: {e}"
            ))),
        }
    }

    /// Durably write the entire in-memory document.
    ///
    /// The current on-disk content is first read into an in-memory backup.
    /// The new document is then written to a sibling temp file and renamed
    /// over the target (never truncate-and-write). If the replacement
    /// fails, the backup is written back before the error propagates, so
    /// the file is always one complete document or the other.
    pub async fn save(&self, reason: &str) -> Result<(), BotError> {
        info!(reason, "saving data");

        let backup = match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(BotError::Persistence(format!(
                    "failed to back up data file before save: {e}"
                )))
            }
        };

        match write_document(&self.path, &self.doc).await {
            Ok(()) => {
                info!("saved data");
                Ok(())
            }
            Err(save_err) => {
                if let Some(backup) = backup {
                    if let Err(restore_err) = tokio::fs::write(&self.path, backup).await {
                        error!(%restore_err, "failed to restore data file from backup");
                    }
                }
                error!(%save_err, "failed to save data");
                Err(save_err)
            }
        }
    }

    // -- Typed accessors over the string-keyed document --

    pub fn contains_key(&self, key: &str) -> bool {
        self.doc.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Non-negative integer value; absent or non-numeric reads as 0.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.doc.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Signed integer value (timestamps); absent reads as 0.
    pub fn get_i64(&self, key: &str) -> i64 {
        self.doc.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.doc.get(key).and_then(Value::as_str)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.doc.get(key).and_then(Value::as_array)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.doc.insert(key.into(), value.into());
    }

    /// Append to an array value, creating the array if absent.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        match self.doc.get_mut(key).and_then(Value::as_array_mut) {
            Some(items) => items.push(value.into()),
            None => {
                self.doc
                    .insert(key.to_string(), Value::Array(vec![value.into()]));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.doc.remove(key)
    }

    /// Keys starting with `prefix`, for scanning pending-link records.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.doc
            .keys()
            .filter(move |k| k.starts_with(prefix))
            .map(String::as_str)
    }

    /// The raw document, for equality checks in tests.
    pub fn document(&self) -> &Map<String, Value> {
        &self.doc
    }
}

/// Serialize and atomically replace the file at `path`.
///
/// `serde_json`'s map type is ordered, so pretty output naturally has
/// sorted keys.
async fn write_document(path: &Path, doc: &Map<String, Value>) -> Result<(), BotError> {
    let pretty = serde_json::to_string_pretty(doc)
        .map_err(|e| BotError::Persistence(format!("failed to serialize document: {e}")))?;

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, pretty.as_bytes())
        .await
        .map_err(|e| BotError::Persistence(format!("failed to write temp file: {e}")))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BotError::Persistence(format!("failed to replace data file: {e}")))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> BotData {
        BotData::new(dir.path().join("data.json"), "~", "🌿")
    }

    #[tokio::test]
    async fn load_creates_missing_file_with_defaults() {
        let dir = TempDir::new().unwrap();
        let mut data = test_store(&dir);
        data.load().await.unwrap();

        assert!(dir.path().join("data.json").exists());
        assert_eq!(data.get_str("prefix:twitch"), Some("~"));
        assert_eq!(data.get_str("currency_emoji"), Some("🌿"));
        assert_eq!(data.get_array("bal:sorted").unwrap().len(), 0);
        assert_eq!(data.get_array("daily_reminders_list").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut data = test_store(&dir);
        data.load().await.unwrap();

        data.set("bal:42", 120u64);
        data.set("discord:999", "42");
        data.push("bal:sorted", "42");
        data.save("test").await.unwrap();

        let mut reloaded = test_store(&dir);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.document(), data.document());
    }

    #[tokio::test]
    async fn defaults_merge_under_loaded_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        // Document from an older deployment: custom prefix, no petal key.
        tokio::fs::write(&path, r#"{"prefix:twitch": "!"}"#)
            .await
            .unwrap();

        let mut data = BotData::new(&path, "~", "🌿");
        data.load().await.unwrap();

        // Loaded value wins; new default keys appear.
        assert_eq!(data.get_str("prefix:twitch"), Some("!"));
        assert_eq!(data.get_str("prefix:petal"), Some("~"));
    }

    #[tokio::test]
    async fn load_rejects_malformed_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "not json {").await.unwrap();

        let mut data = BotData::new(&path, "~", "🌿");
        let err = data.load().await.unwrap_err();
        assert!(matches!(err, BotError::Persistence(_)));
    }

    #[tokio::test]
    async fn failed_save_leaves_prior_document_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut data = BotData::new(&path, "~", "🌿");
        data.load().await.unwrap();
        data.set("bal:42", 10u64);
        data.save("seed").await.unwrap();
        let before = tokio::fs::read_to_string(&path).await.unwrap();

        // A directory squatting on the temp path makes the write fail
        // before the data file is touched.
        tokio::fs::create_dir(dir.path().join("data.json.tmp"))
            .await
            .unwrap();

        data.set("bal:42", 9999u64);
        let err = data.save("doomed").await.unwrap_err();
        assert!(matches!(err, BotError::Persistence(_)));

        let after = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn document_is_pretty_printed_with_sorted_keys() {
        let dir = TempDir::new().unwrap();
        let mut data = test_store(&dir);
        data.load().await.unwrap();
        data.set("zzz", 1u64);
        data.set("aaa", 2u64);
        data.save("test").await.unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join("data.json"))
            .await
            .unwrap();
        assert!(raw.contains('\n'));
        let aaa = raw.find("\"aaa\"").unwrap();
        let zzz = raw.find("\"zzz\"").unwrap();
        assert!(aaa < zzz);
    }

    #[test]
    fn push_creates_missing_array() {
        let dir = TempDir::new().unwrap();
        let mut data = test_store(&dir);
        data.push("boxes:42", "placeholder");
        assert_eq!(data.get_array("boxes:42").unwrap().len(), 1);
    }

    #[test]
    fn keys_with_prefix_filters() {
        let dir = TempDir::new().unwrap();
        let mut data = test_store(&dir);
        data.set("link:discord_1", "a");
        data.set("link:petal_x", "b");
        data.set("discord:1", "42");
        let links: Vec<_> = data.keys_with_prefix("link:").collect();
        assert_eq!(links.len(), 2);
    }
}
