use std::path::PathBuf;
use std::{fs, io};

use crate::data_path;

pub const LOG_FILE: &str = "orderflow-chart-current.log";
pub const PREVIOUS_LOG_FILE: &str = "orderflow-chart-previous.log";

/// دریافت مسیر کامل فایل لاگ و اطمینان از وجود پوشه مربوطه
pub fn path() -> Result<PathBuf, Error> {
    let full_path = data_path(Some(LOG_FILE));

    let parent = full_path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file path"))?;

    // ساخت پوشه داده‌ها در اجرای اول
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    Ok(full_path)
}

/// خطاهای راه‌اندازی سیستم لاگ
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error), // پوشه یا فایل لاگ
    #[error(transparent)]
    SetLog(#[from] log::SetLoggerError), // لاگر سراسری از قبل تنظیم شده
    #[error(transparent)]
    ParseLevel(#[from] log::ParseLevelError), // مقدار نامعتبر در RUST_LOG
}
