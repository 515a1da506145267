use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "TASKFLOW_ASSET_DIR";

/// Directory holding `config.json` and the default SQLite database.
pub fn asset_dir() -> PathBuf {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(override_dir) if !override_dir.trim().is_empty() => {
            PathBuf::from(override_dir.trim())
        }
        _ if cfg!(debug_assertions) => PathBuf::from(PROJECT_ROOT).join("../../dev_assets"),
        _ => ProjectDirs::from("io", "taskflow", "taskflow")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".taskflow")),
    };

    if !path.exists()
        && let Err(err) = std::fs::create_dir_all(&path)
    {
        tracing::warn!("Failed to create asset directory {}: {}", path.display(), err);
    }

    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn default_database_url() -> String {
    format!(
        "sqlite://{}?mode=rwc",
        asset_dir().join("db.sqlite").to_string_lossy()
    )
}
