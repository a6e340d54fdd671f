pub mod chart;
pub mod config;
pub mod log;
pub mod state;
pub mod util;

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use chart::{OrderFlowChart, ProcessedState};
pub use config::Config;
pub use config::timezone::UserTimezone;
pub use state::FlatState;

use ::log::{info, warn};

pub const CONFIG_PATH: &str = "orderflow-chart.json";
pub const DATA_DIR: &str = "orderflow-chart";
const DATA_PATH_ENV: &str = "ORDERFLOW_DATA_PATH";

#[derive(thiserror::Error, Debug, Clone)]
pub enum InternalError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Open error: {0}")]
    Open(String),
}

/// نوشتن محتوا در پوشه داده‌ها و برگرداندن مسیر کامل فایل
pub fn write_to_file(contents: &str, file_name: &str) -> std::io::Result<PathBuf> {
    let path = data_path(Some(file_name));

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid data file path")
    })?;

    if !parent.exists() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

/// خواندن تنظیمات ذخیره‌شده. نبود فایل یعنی تنظیمات پیش‌فرض؛ فایل خراب
/// ابتدا با نام `*_old.json` پشتیبان‌گیری می‌شود.
pub fn load_config() -> Config {
    match read_config(CONFIG_PATH) {
        Ok(config) => config,
        Err(InternalError::Config(err)) => {
            warn!("Failed to load config, using defaults: {err}");
            Config::default()
        }
        Err(err) => {
            info!("{err}, using default config");
            Config::default()
        }
    }
}

fn read_config(file_name: &str) -> Result<Config, InternalError> {
    let path = data_path(Some(file_name));

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => return Err(InternalError::Open(format!("No config at {path:?}: {e}"))),
    };

    let mut contents = String::new();
    if let Err(e) = file.read_to_string(&mut contents) {
        return Err(InternalError::Config(e.to_string()));
    }

    match serde_json::from_str(&contents) {
        Ok(config) => Ok(config),
        Err(e) => {
            drop(file);

            // فایل خراب کنار گذاشته می‌شود تا اجرای بعدی با تنظیمات پیش‌فرض شروع شود

            let backup_file_name = if let Some(pos) = file_name.rfind('.') {
                format!("{}_old{}", &file_name[..pos], &file_name[pos..])
            } else {
                format!("{}_old", file_name)
            };

            let backup_path = data_path(Some(&backup_file_name));

            if let Err(rename_err) = std::fs::rename(&path, &backup_path) {
                warn!(
                    "Failed to backup corrupted config file '{}' to '{}': {}",
                    path.display(),
                    backup_path.display(),
                    rename_err
                );
            } else {
                info!(
                    "Backed up corrupted config file to '{}'. It can be restored manually.",
                    backup_path.display()
                );
            }

            Err(InternalError::Config(e.to_string()))
        }
    }
}

pub fn save_config(config: &Config) -> Result<(), InternalError> {
    let json =
        serde_json::to_string_pretty(config).map_err(|e| InternalError::Config(e.to_string()))?;

    let path = write_to_file(&json, CONFIG_PATH)
        .map_err(|e| InternalError::Config(format!("Failed to write config: {e}")))?;

    info!("Config saved to {path:?}");
    Ok(())
}

/// باز کردن فایل با برنامه پیش‌فرض سیستم
pub fn open_file(path: &Path) -> Result<(), InternalError> {
    if !path.exists() {
        return Err(InternalError::Open(format!(
            "File does not exist: {:?}",
            path
        )));
    }

    if let Err(err) = open::that(path) {
        Err(InternalError::Open(format!(
            "Failed to open {:?}, error: {}",
            path, err
        )))
    } else {
        info!("Opened {:?}", path);
        Ok(())
    }
}

/// مسیر داخل پوشه داده‌ها. متغیر `ORDERFLOW_DATA_PATH` جایگزین پوشه
/// داده پیش‌فرض سیستم می‌شود.
pub fn data_path(path_name: Option<&str>) -> PathBuf {
    let data_dir = match std::env::var(DATA_PATH_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIR),
    };

    match path_name {
        Some(path_name) => data_dir.join(path_name),
        None => data_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // متغیر محیطی بین تست‌ها مشترک است، پس تست‌ها پشت سر هم اجرا می‌شوند
    static DATA_PATH_LOCK: Mutex<()> = Mutex::new(());

    fn temp_data_dir(name: &str) -> (PathBuf, MutexGuard<'static, ()>) {
        let guard = DATA_PATH_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let dir = std::env::temp_dir().join(format!("orderflow-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        unsafe { std::env::set_var(DATA_PATH_ENV, &dir) };
        (dir, guard)
    }

    #[test]
    fn data_path_follows_env_override() {
        let (dir, _guard) = temp_data_dir("path");

        assert_eq!(data_path(None), dir);
        assert_eq!(data_path(Some(CONFIG_PATH)), dir.join(CONFIG_PATH));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_config_uses_defaults() {
        let (dir, _guard) = temp_data_dir("missing");

        assert_eq!(load_config(), Config::default());
        assert!(!dir.join(CONFIG_PATH).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_config_is_backed_up() {
        let (dir, _guard) = temp_data_dir("corrupt");
        std::fs::write(dir.join(CONFIG_PATH), "{not json").unwrap();

        assert_eq!(load_config(), Config::default());
        assert!(!dir.join(CONFIG_PATH).exists());
        assert_eq!(
            std::fs::read_to_string(dir.join("orderflow-chart_old.json")).unwrap(),
            "{not json"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn saved_config_loads_back() {
        let (dir, _guard) = temp_data_dir("saved");
        let config = Config {
            timezone: UserTimezone::Local,
            visible_candles: 25,
            price_window_ticks: 80,
        };

        save_config(&config).unwrap();

        assert!(dir.join(CONFIG_PATH).exists());
        assert_eq!(load_config(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
