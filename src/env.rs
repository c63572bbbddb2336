use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;
use std::time::Duration;

/// TCP port the managed ComfyUI server binds on localhost.
pub static COMFY_PORT: Lazy<u16> = Lazy::new(|| var_u16("COMFY_LAUNCHER_PORT").unwrap_or(8188));

/// Cadence of the readiness poll loop.
pub static CHECK_INTERVAL: Lazy<Duration> = Lazy::new(|| {
    Duration::from_millis(var_u64("COMFY_LAUNCHER_CHECK_INTERVAL_MS").unwrap_or(300))
});

/// Maximum time to wait for the server port on launches after the first one.
pub static MAX_WAIT: Lazy<Duration> =
    Lazy::new(|| Duration::from_secs(var_u64("COMFY_LAUNCHER_MAX_WAIT").unwrap_or(90)));

/// How long `stop` keeps re-checking the port before giving up.
pub static STOP_GRACE: Lazy<Duration> =
    Lazy::new(|| Duration::from_secs(var_u64("COMFY_LAUNCHER_STOP_GRACE").unwrap_or(5)));

pub static HOME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir().unwrap_or_else(|| {
        eprintln!("Warning: Could not determine home directory");
        PathBuf::from("/tmp")
    })
});

pub static CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("COMFY_LAUNCHER_CONFIG_DIR")
        .unwrap_or(HOME_DIR.join(".config").join("comfy-launcher"))
});

pub static CONFIG_FILE: Lazy<PathBuf> = Lazy::new(|| CONFIG_DIR.join("config.toml"));

pub static STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("COMFY_LAUNCHER_STATE_DIR").unwrap_or(
        dirs::state_dir()
            .unwrap_or(HOME_DIR.join(".local").join("state"))
            .join("comfy-launcher"),
    )
});

pub static LOGS_DIR: Lazy<PathBuf> = Lazy::new(|| STATE_DIR.join("logs"));
pub static LAUNCHER_LOG_FILE: Lazy<PathBuf> = Lazy::new(|| LOGS_DIR.join("launcher.log"));

pub static COMFY_LAUNCHER_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("COMFY_LAUNCHER_LOG").unwrap_or(log::LevelFilter::Info));

// Capture the PATH at startup so spawned servers can find user tools
pub static ORIGINAL_PATH: Lazy<Option<String>> = Lazy::new(|| var("PATH").ok());

/// Locate a binary on the search path without spawning anything.
/// On Windows the `.exe` suffix is tried as well.
pub(crate) fn find_in_path(bin: &str) -> Option<PathBuf> {
    let paths = var_os("PATH")?;
    for dir in split_paths(&paths) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let candidate = dir.join(format!("{bin}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_u64(name: &str) -> Option<u64> {
    var(name).ok().and_then(|val| val.parse().ok())
}

fn var_u16(name: &str) -> Option<u16> {
    var(name).ok().and_then(|val| val.parse().ok())
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
