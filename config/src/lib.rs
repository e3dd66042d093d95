//! Settings persistence for ZenReply.
//!
//! Settings are a small JSON document (`zenreply-settings.json`) holding the
//! API key, API base URL, and model name. Two rules hold at every boundary:
//!
//! - Values are normalized (trimmed, defaulted) on every read **and** write.
//! - Reads re-persist the normalized form, so a hand-edited or partially
//!   written file converges back to a canonical document.
//!
//! The flow controller re-reads settings immediately before each generation
//! attempt rather than caching them, so edits made while a session is open
//! take effect on the next attempt. [`SettingsStore`] is the seam that makes
//! that re-read testable without a filesystem.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use zenreply_types::AppSettings;

pub const SETTINGS_FILE_NAME: &str = "zenreply-settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("无法定位配置目录")]
    NoConfigDir,
    #[error("读写设置文件失败: {0}")]
    Io(#[from] io::Error),
    #[error("设置文件格式错误: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Async key-value store for [`AppSettings`].
///
/// `write` normalizes and returns the persisted value, so callers always see
/// exactly what landed on disk.
pub trait SettingsStore {
    fn read(&self) -> impl Future<Output = Result<AppSettings, SettingsError>>;
    fn write(
        &self,
        settings: AppSettings,
    ) -> impl Future<Output = Result<AppSettings, SettingsError>>;
}

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config directory, e.g.
    /// `~/.config/zenreply/zenreply-settings.json` on Linux.
    pub fn from_default_location() -> Result<Self, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dir.join("zenreply").join(SETTINGS_FILE_NAME)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, body).await?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    async fn read(&self) -> Result<AppSettings, SettingsError> {
        let settings = match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice::<AppSettings>(&bytes)?.normalized(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "settings file missing, using defaults");
                AppSettings::default()
            }
            Err(err) => return Err(err.into()),
        };

        // Converge the on-disk document to the normalized form.
        self.persist(&settings).await?;
        Ok(settings)
    }

    async fn write(&self, settings: AppSettings) -> Result<AppSettings, SettingsError> {
        let normalized = settings.normalized();
        self.persist(&normalized).await?;
        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{FileStore, SETTINGS_FILE_NAME, SettingsStore};
    use zenreply_types::{AppSettings, DEFAULT_API_BASE, DEFAULT_MODEL_NAME};

    fn store_in(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path().join(SETTINGS_FILE_NAME))
    }

    #[tokio::test]
    async fn read_missing_file_returns_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let settings = store.read().await.unwrap();
        assert_eq!(settings, AppSettings::default());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn write_normalizes_and_returns_persisted_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let saved = store
            .write(AppSettings {
                api_key: " sk-live ".to_string(),
                api_base: String::new(),
                model_name: "  ".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(saved.api_key, "sk-live");
        assert_eq!(saved.api_base, DEFAULT_API_BASE);
        assert_eq!(saved.model_name, DEFAULT_MODEL_NAME);

        let reread = store.read().await.unwrap();
        assert_eq!(reread, saved);
    }

    #[tokio::test]
    async fn read_converges_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), br#"{"api_key":"  k  "}"#).unwrap();

        let settings = store.read().await.unwrap();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.api_base, DEFAULT_API_BASE);

        let on_disk: AppSettings =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, settings);
    }

    #[tokio::test]
    async fn read_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), b"not json").unwrap();

        assert!(store.read().await.is_err());
    }
}
