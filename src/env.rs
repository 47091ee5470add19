use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

pub static CWD: Lazy<PathBuf> = Lazy::new(|| current_dir().unwrap_or_default());
pub static HOME_DIR: Lazy<PathBuf> = Lazy::new(|| dirs::home_dir().unwrap_or_default());

pub static LOGWEAVE_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("LOGWEAVE_STATE_DIR").unwrap_or(
        dirs::state_dir()
            .unwrap_or(HOME_DIR.join(".local").join("state"))
            .join("logweave"),
    )
});

pub static LOGWEAVE_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("LOGWEAVE_LOG").unwrap_or(log::LevelFilter::Info));
pub static LOGWEAVE_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("LOGWEAVE_LOG_FILE_LEVEL").unwrap_or(*LOGWEAVE_LOG));
pub static LOGWEAVE_LOGS_DIR: Lazy<PathBuf> =
    Lazy::new(|| var_path("LOGWEAVE_LOGS_DIR").unwrap_or(LOGWEAVE_STATE_DIR.join("logs")));
pub static LOGWEAVE_LOG_FILE: Lazy<PathBuf> = Lazy::new(|| LOGWEAVE_LOGS_DIR.join("logweave.log"));

pub static IPC_SOCK_DIR: Lazy<PathBuf> = Lazy::new(|| LOGWEAVE_STATE_DIR.join("sock"));
pub static IPC_SOCK_MAIN: Lazy<PathBuf> = Lazy::new(|| IPC_SOCK_DIR.join("main").with_extension("sock"));
pub static IPC_JSON: Lazy<bool> = Lazy::new(|| !var_false("LOGWEAVE_IPC_JSON"));

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}

fn var_false(name: &str) -> bool {
    var(name)
        .map(|val| val.to_lowercase())
        .map(|val| val == "false" || val == "0")
        .unwrap_or(false)
}
