//! Persistent settings (`config.json` in the data directory) and path defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const APP_DIR: &str = "commanders-watch";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub watch_folder: Option<PathBuf>,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// ArcDPS log folder under the user's documents, when it exists.
pub fn default_watch_folder() -> Option<PathBuf> {
    let path = dirs::document_dir()?
        .join("Guild Wars 2")
        .join("addons")
        .join("arcdps")
        .join("arcdps.cbtlogs");
    path.is_dir().then_some(path)
}

/// Missing file yields the default config.
pub fn load(path: &Path) -> Result<AppConfig> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid config file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

pub fn save(path: &Path, cfg: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(cfg)?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

/// Pick the folder to watch: explicit value, then the saved one, then
/// `fallback`. The explicit value must exist; a stale saved value is skipped.
pub fn resolve_watch_folder(
    explicit: Option<&Path>,
    saved: &AppConfig,
    fallback: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_dir() {
            bail!("watch folder {} is not a directory", path.display());
        }
        return Ok(path.to_path_buf());
    }
    if let Some(path) = saved.watch_folder.as_deref() {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "saved watch folder no longer exists");
    }
    match fallback {
        Some(path) => Ok(path),
        None => bail!(
            "no watch folder configured; pass --watch-folder <ArcDPS log folder>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_is_default_and_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = config_path(dir.path());
        assert_eq!(load(&path).unwrap(), AppConfig::default());

        let cfg = AppConfig {
            watch_folder: Some(dir.path().to_path_buf()),
        };
        save(&path, &cfg).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("WatchFolder"));
        assert_eq!(load(&path).unwrap(), cfg);
    }

    #[test]
    fn explicit_folder_wins_and_must_exist() {
        let dir = TempDir::new().unwrap();
        let saved = AppConfig {
            watch_folder: Some(PathBuf::from("/elsewhere")),
        };
        assert_eq!(
            resolve_watch_folder(Some(dir.path()), &saved, None).unwrap(),
            dir.path()
        );
        assert!(resolve_watch_folder(Some(&dir.path().join("x")), &saved, None).is_err());
    }

    #[test]
    fn stale_saved_folder_falls_back() {
        let dir = TempDir::new().unwrap();
        let saved = AppConfig {
            watch_folder: Some(dir.path().join("gone")),
        };
        let fallback = dir.path().to_path_buf();
        assert_eq!(
            resolve_watch_folder(None, &saved, Some(fallback.clone())).unwrap(),
            fallback
        );
        assert!(resolve_watch_folder(None, &saved, None).is_err());
    }
}
