//! Server process supervisor.
//!
//! Owns the single tracked ComfyUI process handle and sequences the
//! start/stop/restart lifecycle around it. Split into:
//! - `lifecycle`: ensure_running / stop_hard operations
//!
//! One long-lived instance per application is expected; the [`SUPERVISOR`]
//! static exists for the CLI, but the type is freely constructible (tests
//! build their own against scratch ports).

mod lifecycle;

pub use lifecycle::{StartOutcome, StopOutcome};

use crate::config::Build;
use crate::procs::PROCS;
use crate::env;
use once_cell::sync::Lazy;
use std::time::Duration;
use tokio::sync::Mutex;

/// Lifecycle states: Idle → Starting → Running → Stopping → Idle, with
/// Running → Restarting → Starting on restart. Errors drop back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum ServerStatus {
    Idle,
    Starting,
    Running,
    Stopping,
    Restarting,
}

impl ServerStatus {
    pub fn style(&self) -> String {
        let s = self.to_string();
        match self {
            ServerStatus::Idle => console::style(s).dim().to_string(),
            ServerStatus::Starting => console::style(s).yellow().to_string(),
            ServerStatus::Running => console::style(s).green().to_string(),
            ServerStatus::Stopping => console::style(s).yellow().to_string(),
            ServerStatus::Restarting => console::style(s).yellow().to_string(),
        }
    }
}

/// The tracked server process. At most one exists at a time.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    pub pid: u32,
    pub mode_label: String,
}

pub struct Supervisor {
    port: u16,
    handle: Mutex<Option<ServerHandle>>,
    status: Mutex<ServerStatus>,
}

pub static SUPERVISOR: Lazy<Supervisor> = Lazy::new(|| Supervisor::new(*env::COMFY_PORT));

impl Supervisor {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            handle: Mutex::new(None),
            status: Mutex::new(ServerStatus::Idle),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn status(&self) -> ServerStatus {
        *self.status.lock().await
    }

    pub(crate) async fn set_status(&self, status: ServerStatus) {
        let mut current = self.status.lock().await;
        if *current != status {
            debug!("supervisor status: {current} -> {status}");
            *current = status;
        }
    }

    /// Snapshot of the tracked handle without a liveness check.
    pub async fn tracked(&self) -> Option<ServerHandle> {
        self.handle.lock().await.clone()
    }

    /// The tracked handle, validated against the process table. A handle
    /// whose process has exited is cleared here.
    pub(crate) async fn live_handle(&self) -> Option<ServerHandle> {
        let mut handle = self.handle.lock().await;
        if let Some(h) = handle.as_ref() {
            PROCS.refresh_pids(&[h.pid]);
            if PROCS.is_running(h.pid) {
                return handle.clone();
            }
            info!("tracked server process {} has exited, clearing handle", h.pid);
            *handle = None;
        }
        None
    }

    pub(crate) async fn track(&self, new: ServerHandle) {
        *self.handle.lock().await = Some(new);
    }

    pub(crate) async fn clear_handle(&self) {
        *self.handle.lock().await = None;
    }

    /// Restart sequencing: hard stop, then a fresh ensure_running.
    pub async fn restart(&self, build: &Build, show_cmd: bool, grace: Duration) -> StartOutcome {
        info!("Restarting ComfyUI...");
        self.set_status(ServerStatus::Restarting).await;
        self.stop_hard(grace).await;
        self.ensure_running(build, show_cmd).await
    }
}
