//! Server start/stop operations.
//!
//! Every public operation here catches at its own boundary and reports a
//! structured outcome; spawn and enumeration errors never propagate to the
//! caller as panics or `Err`s.

use super::{ServerHandle, ServerStatus, Supervisor};
use crate::console_buffer::CONSOLE;
use crate::launch::{self, LaunchCommand, LaunchPlan};
use crate::config::Build;
use crate::procs::PROCS;
use crate::{env, gpu, probe};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{self, Instant};

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Pacing of the phase-3 port re-check inside the grace window.
const SWEEP_RECHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of an `ensure_running` call.
#[derive(Debug, Clone, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum StartOutcome {
    /// A live tracked process or an already-bound port was found; no spawn.
    AlreadyRunning,
    Started { pid: u32, mode_label: String },
    StartFailed { error: String },
}

/// Outcome of a `stop_hard` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    /// The port was still bound when the grace period ran out.
    StopIncomplete,
    NothingToStop,
}

impl Supervisor {
    /// Make sure the server for `build` is running, spawning it if needed.
    ///
    /// The already-running checks (tracked handle liveness, then port
    /// liveness) fully resolve before any spawn is attempted, so a second
    /// call while the first process is alive never spawns a duplicate.
    pub async fn ensure_running(&self, build: &Build, show_cmd: bool) -> StartOutcome {
        self.set_status(ServerStatus::Starting).await;

        if let Some(handle) = self.live_handle().await {
            warn!("ComfyUI process is already running (pid {}), skip start", handle.pid);
            self.set_status(ServerStatus::Running).await;
            return StartOutcome::AlreadyRunning;
        }

        if probe::is_port_open(self.port()) {
            info!(
                "port {} is already accepting connections, ComfyUI already launched",
                self.port()
            );
            self.set_status(ServerStatus::Running).await;
            return StartOutcome::AlreadyRunning;
        }

        let gpu_available = gpu::gpu_available().await;
        let plan = match launch::resolve_plan(&build.path, build.startup_mode, gpu_available) {
            Ok(plan) => plan,
            Err(e) => {
                error!("failed to resolve a launch plan: {e}");
                self.set_status(ServerStatus::Idle).await;
                return StartOutcome::StartFailed {
                    error: e.to_string(),
                };
            }
        };
        info!("Starting ComfyUI in {} mode...", plan.label);

        match self.spawn_plan(&plan, show_cmd) {
            Ok(pid) => {
                self.track(ServerHandle {
                    pid,
                    mode_label: plan.label.clone(),
                })
                .await;
                self.set_status(ServerStatus::Running).await;
                info!("ComfyUI started (pid {pid}) in {} mode", plan.label);
                StartOutcome::Started {
                    pid,
                    mode_label: plan.label,
                }
            }
            Err(e) => {
                error!("process start failed: {e}");
                self.set_status(ServerStatus::Idle).await;
                StartOutcome::StartFailed { error: e }
            }
        }
    }

    fn spawn_plan(&self, plan: &LaunchPlan, show_cmd: bool) -> Result<u32, String> {
        let mut cmd = build_command(plan, show_cmd);
        cmd.current_dir(&plan.cwd);

        if show_cmd {
            // visible console: output goes to the server's own window/tty
            #[cfg(windows)]
            cmd.creation_flags(CREATE_NEW_CONSOLE);
        } else {
            #[cfg(windows)]
            cmd.creation_flags(CREATE_NO_WINDOW);
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| format!("failed to spawn: {e}"))?;
        let pid = child
            .id()
            .ok_or_else(|| "process exited before PID could be captured".to_string())?;

        if !show_cmd {
            if let Some(stdout) = child.stdout.take() {
                drain_into_console(stdout);
            }
            if let Some(stderr) = child.stderr.take() {
                drain_into_console(stderr);
            }
        }

        // Reap the child when it exits; handle clearing happens lazily via
        // the liveness check, which consults the process table.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("ComfyUI process {pid} exited with {status}"),
                Err(e) => warn!("failed waiting on ComfyUI process {pid}: {e}"),
            }
        });

        Ok(pid)
    }

    /// Hard stop: a three-phase best-effort sweep.
    ///
    /// 1. Kill the full process tree of anything whose command line names a
    ///    known launch script, then re-scan for orphaned children.
    /// 2. If nothing matched, fall back to the entry-point/product-name
    ///    heuristic and kill matches directly.
    /// 3. Whatever matched, keep re-checking the port for up to `grace`,
    ///    killing the trees of any pids still listening on it.
    ///
    /// The tracked handle is cleared unconditionally; calling this with
    /// nothing running is safe.
    pub async fn stop_hard(&self, grace: Duration) -> StopOutcome {
        self.set_status(ServerStatus::Stopping).await;
        info!("Stopping ComfyUI...");

        PROCS.refresh_processes();
        let markers: Vec<String> = launch::SCRIPT_MARKERS
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        let script_pids =
            PROCS.matching_cmdline(|cmd| markers.iter().any(|m| cmd.contains(m.as_str())));

        let mut killed = false;
        for pid in script_pids {
            info!("killing launch script process and all its descendants (pid {pid})");
            if let Err(e) = PROCS.kill_tree_async(pid).await {
                warn!("failed to kill process tree {pid}: {e}");
            }
            killed = true;
        }

        if !killed {
            PROCS.refresh_processes();
            let fallback = PROCS.matching_cmdline(|cmd| {
                cmd.contains("comfyui") || cmd.contains(launch::ENTRY_POINT)
            });
            for pid in fallback {
                info!("force quitting ComfyUI (pid {pid})");
                if let Err(e) = PROCS.kill_async(pid).await {
                    warn!("failed to kill pid {pid}: {e}");
                }
                killed = true;
            }
        }

        // Second line of defense: the name heuristics can miss the owning
        // process, but the connection table cannot.
        let deadline = Instant::now() + grace;
        while probe::is_port_open(self.port()) && Instant::now() < deadline {
            for pid in PROCS.port_listeners(self.port()) {
                warn!("port {} still owned by pid {pid}, killing its tree", self.port());
                if let Err(e) = PROCS.kill_tree_async(pid).await {
                    warn!("failed to kill listener tree {pid}: {e}");
                }
                killed = true;
            }
            time::sleep(SWEEP_RECHECK_INTERVAL).await;
        }

        let port_still_open = probe::is_port_open(self.port());
        self.clear_handle().await;
        self.set_status(ServerStatus::Idle).await;

        if port_still_open {
            warn!("port {} still busy, possible residual process", self.port());
            StopOutcome::StopIncomplete
        } else if killed {
            info!("port {} closed, server fully stopped", self.port());
            StopOutcome::Stopped
        } else {
            warn!("no ComfyUI process found to stop");
            StopOutcome::NothingToStop
        }
    }
}

fn build_command(plan: &LaunchPlan, show_cmd: bool) -> Command {
    #[cfg(not(windows))]
    let _ = show_cmd;
    match &plan.command {
        LaunchCommand::Script { path } => {
            #[cfg(windows)]
            {
                let mut cmd = Command::new("cmd.exe");
                // /k keeps the visible console window around after exit
                cmd.arg(if show_cmd { "/k" } else { "/c" }).arg(path);
                cmd
            }
            #[cfg(not(windows))]
            {
                let mut cmd = Command::new("sh");
                cmd.arg(path);
                cmd
            }
        }
        LaunchCommand::Interpreter { python, args, env: plan_env } => {
            debug!(
                "interpreter invocation: {} {}",
                python.display(),
                shell_words::join(args)
            );
            let mut cmd = Command::new(python);
            cmd.args(args);
            // keep the launcher's original PATH unless the plan overrides it
            if let Some(path) = &*env::ORIGINAL_PATH {
                cmd.env("PATH", path);
            }
            for (key, val) in plan_env {
                cmd.env(key, val);
            }
            cmd
        }
    }
}

fn drain_into_console<R>(stream: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => CONSOLE.push(line),
                Ok(None) => break,
                Err(e) => {
                    CONSOLE.push(format!("[console reader error] {e}"));
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    #[cfg(windows)]
    use super::*;

    #[cfg(windows)]
    #[test]
    fn test_visible_console_keeps_window_open() {
        let plan = LaunchPlan {
            command: LaunchCommand::Script {
                path: "run_cpu.bat".into(),
            },
            label: "CPU".to_string(),
            cwd: ".".into(),
        };
        let args = |show_cmd: bool| {
            build_command(&plan, show_cmd)
                .as_std()
                .get_args()
                .map(|a| a.to_string_lossy().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(args(true)[0], "/k");
        assert_eq!(args(false)[0], "/c");
    }
}
