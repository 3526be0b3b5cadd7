use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

/// Process-wide configuration, loaded once at startup.
///
/// Every value the services read from the environment lives here so
/// that missing settings fail at boot instead of mid-request.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_path: String,
    /// URL the rendered QR codes point students at.
    pub qr_target_url: String,
    /// Validity window for newly issued attendance codes, in hours.
    pub code_validity_hours: i64,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(|| {
            let project_name = env::var("PROJECT_NAME").unwrap_or_else(|_| "spots-api".into());
            let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
            let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/api.log".into());
            let database_path = env::var("DATABASE_PATH").expect("DATABASE_PATH must be set");
            let qr_target_url = env::var("QR_TARGET_URL").expect("QR_TARGET_URL must be set");
            let code_validity_hours = env::var("CODE_VALIDITY_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(3);

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                fs::create_dir_all(parent).expect("Failed to create log directory");
            }

            Config {
                project_name,
                log_level,
                log_file,
                database_path,
                qr_target_url,
                code_validity_hours,
            }
        })
    }

    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized")
    }
}
