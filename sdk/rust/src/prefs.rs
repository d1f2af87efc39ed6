use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use themis_core::types::Theme;
use tracing::warn;

use crate::error::Result;

/// The only state the client keeps between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

/// Preferences bound to a JSON file.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield the defaults.
    pub async fn load(&self) -> Preferences {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read preferences: {e}");
                return Preferences::default();
            },
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "ignoring malformed preferences: {e}");
            Preferences::default()
        })
    }

    pub async fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(prefs).map_err(std::io::Error::other)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Flip the theme, persist it and return the new value.
    pub async fn toggle_theme(&self) -> Result<Theme> {
        let mut prefs = self.load().await;
        prefs.theme = prefs.theme.toggled();
        self.save(&prefs).await?;
        Ok(prefs.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_gives_light_theme() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.load().await.theme, Theme::Light);
    }

    #[tokio::test]
    async fn theme_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = PreferenceStore::new(&path);
        assert_eq!(store.toggle_theme().await.unwrap(), Theme::Dark);

        let reopened = PreferenceStore::new(&path);
        assert_eq!(reopened.load().await.theme, Theme::Dark);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dark\""));
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ theme: ").unwrap();
        assert_eq!(PreferenceStore::new(path).load().await, Preferences::default());
    }
}
