use std::path::Path;

use tracing::{info, warn};

use crate::error::AppError;

/// Env files in load order; later files override earlier ones.
pub fn env_files_for_profile(profile: &str) -> Vec<&'static str> {
    if profile == "production" {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    }
}

/// Which env files were applied. Loading happens before the subscriber
/// exists, so the caller logs this once tracing is up.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadedEnvironment {
    pub loaded: Vec<String>,
    pub skipped: Vec<String>,
}

impl LoadedEnvironment {
    pub fn log(&self) {
        for path in &self.loaded {
            info!("Loaded environment from: {}", path);
        }
        for path in &self.skipped {
            warn!("Environment file {} not found, skipping", path);
        }
    }
}

pub fn load_environment() -> Result<LoadedEnvironment, AppError> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
    load_env_files(&env_files_for_profile(&profile))
}

pub fn load_env_files<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedEnvironment, AppError> {
    let mut outcome = LoadedEnvironment::default();

    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            outcome.skipped.push(path.display().to_string());
            continue;
        }

        dotenvy::from_filename_override(path)
            .map_err(|e| AppError::Config(format!("Failed to load {}: {}", path.display(), e)))?;
        outcome.loaded.push(path.display().to_string());
    }

    Ok(outcome)
}
