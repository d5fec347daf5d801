use crate::errors::{AppError, AppResult};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "SUBSTORY_TRACKER_DATA_DIR";

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "substory-tracker";
const APP_NAME: &str = "Substory Tracker";
const SESSION_FILENAME: &str = "config.toml";
const REGISTRY_FILENAME: &str = "datasets.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub datasets_dir: PathBuf,
    pub session_path: PathBuf,
    pub log_dir: PathBuf,
    pub registry_path: PathBuf,
}

impl AppPaths {
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            datasets_dir: data_dir.join("datasets"),
            session_path: data_dir.join(SESSION_FILENAME),
            log_dir: data_dir.join("logs"),
            registry_path: data_dir.join(REGISTRY_FILENAME),
            data_dir,
        }
    }

    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::from_data_dir(resolve_data_dir(explicit, std::env::var_os(DATA_DIR_ENV).map(PathBuf::from)))
    }

    pub fn ensure_dirs(&self) -> AppResult<()> {
        for dir in [&self.data_dir, &self.datasets_dir, &self.log_dir] {
            fs::create_dir_all(dir).map_err(|error| AppError::Io(format!("{}: {}", dir.display(), error)))?;
        }
        Ok(())
    }
}

fn resolve_data_dir(explicit: Option<&Path>, from_env: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = from_env.filter(|dir| !dir.as_os_str().is_empty()) {
        return dir;
    }
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}
