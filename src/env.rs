use std::path::Path;

use tracing::{info, warn};

/// Env files for a deployment profile, later files overriding earlier ones.
pub fn env_files(profile: &str) -> Vec<&'static str> {
    match profile {
        "production" => vec!["config/common.env", "config/prod.env", ".secrets.env"],
        _ => vec!["config/common.env", "config/dev.env", ".secrets.env"],
    }
}

pub fn app_profile() -> String {
    dotenvy::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

pub fn load_environment() -> anyhow::Result<Vec<&'static str>> {
    let mut loaded = Vec::new();

    for env_file in env_files(&app_profile()) {
        if load_env_file(env_file)? {
            loaded.push(env_file);
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> anyhow::Result<bool> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(true)
}
