//! Launcher event log.
//!
//! Lines are formatted as `[YYYY-MM-DD HH:MM:SS] message` and written both to
//! stderr and to `launcher.log` under the state directory, so diagnostic
//! history survives between runs.

use crate::env;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

struct LauncherLogger {
    level: LevelFilter,
    file: Mutex<Option<File>>,
}

impl Log for LauncherLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.args()
        );
        eprintln!("{line}");
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(f) = file.as_mut()
            && let Err(e) = writeln!(f, "{line}")
        {
            eprintln!("[logger] failed to write launcher.log: {e}");
        }
    }

    fn flush(&self) {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(f) = file.as_mut() {
            let _ = f.flush();
        }
    }
}

fn open_log_file() -> Option<File> {
    if let Err(e) = std::fs::create_dir_all(&*env::LOGS_DIR) {
        eprintln!("[logger] could not create logs dir: {e}");
        return None;
    }
    match OpenOptions::new()
        .append(true)
        .create(true)
        .open(&*env::LAUNCHER_LOG_FILE)
    {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("[logger] could not open launcher.log: {e}");
            None
        }
    }
}

pub fn init() {
    let level = *env::COMFY_LAUNCHER_LOG;
    let logger = LauncherLogger {
        level,
        file: Mutex::new(open_log_file()),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    }
}
