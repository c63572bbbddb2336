//! Narrow process-table surface the supervisor is written against:
//! liveness, children, kill, command-line matching, and port listeners.
//! All OS specifics live behind this module.

use itertools::Itertools;
use miette::IntoDiagnostic;
use once_cell::sync::Lazy;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, UpdateKind};
#[cfg(unix)]
use sysinfo::Signal;

/// Pacing of the post-signal exit check; ten rounds before escalating.
const TERM_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Procs {
    system: Mutex<sysinfo::System>,
}

pub static PROCS: Lazy<Procs> = Lazy::new(Procs::new);

impl Default for Procs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procs {
    pub fn new() -> Self {
        let procs = Self {
            system: Mutex::new(sysinfo::System::new()),
        };
        procs.refresh_processes();
        procs
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, sysinfo::System> {
        self.system.lock().unwrap_or_else(|poisoned| {
            warn!("System mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn name(&self, pid: u32) -> Option<String> {
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .map(|p| p.name().to_string_lossy().to_string())
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .is_some()
    }

    /// All descendants of `pid`, found by walking each process's parent chain.
    pub fn all_children(&self, pid: u32) -> Vec<u32> {
        let system = self.lock_system();
        let all = system.processes();
        let mut children = vec![];
        for (child_pid, process) in all {
            let mut process = process;
            while let Some(parent) = process.parent() {
                if parent == sysinfo::Pid::from_u32(pid) {
                    children.push(child_pid.as_u32());
                    break;
                }
                match system.process(parent) {
                    Some(p) => process = p,
                    None => break,
                }
            }
        }
        children
    }

    /// Direct children only, for the post-kill orphan re-scan.
    pub fn direct_children(&self, pid: u32) -> Vec<u32> {
        let system = self.lock_system();
        system
            .processes()
            .iter()
            .filter(|(_, p)| p.parent() == Some(sysinfo::Pid::from_u32(pid)))
            .map(|(child_pid, _)| child_pid.as_u32())
            .collect()
    }

    /// Pids whose joined, lowercased command line satisfies `pred`.
    /// The caller's own pid is never returned.
    pub fn matching_cmdline(&self, pred: impl Fn(&str) -> bool) -> Vec<u32> {
        let own_pid = std::process::id();
        let system = self.lock_system();
        system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, p)| {
                let cmdline = p
                    .cmd()
                    .iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                !cmdline.is_empty() && pred(&cmdline)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    /// Pids currently listening on `port`. Enumeration errors read as
    /// "no listeners found" so the stop sweep can keep going.
    pub fn port_listeners(&self, port: u16) -> Vec<u32> {
        match listeners::get_all() {
            Ok(all) => all
                .into_iter()
                .filter(|l| l.socket.port() == port)
                .map(|l| l.process.pid)
                .unique()
                .collect(),
            Err(e) => {
                debug!("failed to enumerate listening sockets: {e}");
                vec![]
            }
        }
    }

    pub async fn kill_async(&self, pid: u32) -> crate::Result<bool> {
        let result = tokio::task::spawn_blocking(move || PROCS.kill(pid))
            .await
            .into_diagnostic()?;
        Ok(result)
    }

    /// Ask `pid` to exit, escalating to a forced kill when the request is
    /// ignored. Bounded: a process that refuses to die never stalls the
    /// caller for longer than the escalation window.
    pub fn kill(&self, pid: u32) -> bool {
        let target = sysinfo::Pid::from_u32(pid);
        {
            let system = self.lock_system();
            let Some(process) = system.process(target) else {
                return false;
            };
            debug!("killing process {}", pid);
            #[cfg(windows)]
            process.kill();
            #[cfg(unix)]
            process.kill_with(Signal::Term);
        }
        for _ in 0..10 {
            std::thread::sleep(TERM_POLL_INTERVAL);
            self.refresh_pids(&[pid]);
            if !self.is_running(pid) {
                return true;
            }
        }
        #[cfg(unix)]
        if let Some(process) = self.lock_system().process(target) {
            warn!("process {pid} did not exit on SIGTERM, sending SIGKILL");
            process.kill_with(Signal::Kill);
        }
        self.refresh_pids(&[pid]);
        true
    }

    /// Kill `pid` and its full descendant tree: deepest processes have no
    /// dependents left behind, so children go first, then the root. After the
    /// pass, directly re-scan for children that escaped and kill stragglers.
    /// Per-candidate failures (already exited, access denied) are swallowed.
    pub fn kill_tree(&self, pid: u32) {
        self.refresh_processes();
        for child_pid in self.all_children(pid) {
            if let Some(name) = self.name(child_pid) {
                info!("killing child pid {child_pid}: {name}");
            }
            if !self.kill(child_pid) {
                debug!("child pid {child_pid} already gone");
            }
        }
        info!("killing parent pid {pid}");
        self.kill(pid);

        // Orphan re-scan: anything still parented to pid gets a direct kill.
        self.refresh_processes();
        for straggler in self.direct_children(pid) {
            warn!("descendant {straggler} still alive after tree kill, killing directly");
            self.kill(straggler);
        }
    }

    pub async fn kill_tree_async(&self, pid: u32) -> crate::Result<()> {
        tokio::task::spawn_blocking(move || PROCS.kill_tree(pid))
            .await
            .into_diagnostic()?;
        Ok(())
    }

    // The default refresh never populates command lines, which the stop
    // sweep matches on, so the refresh kind requests them explicitly.
    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::OnlyIfNotSet)
            .with_exe(UpdateKind::OnlyIfNotSet)
    }

    pub fn refresh_processes(&self) {
        self.lock_system().refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            Self::refresh_kind(),
        );
    }

    pub fn refresh_pids(&self, pids: &[u32]) {
        let pids = pids
            .iter()
            .map(|pid| sysinfo::Pid::from_u32(*pid))
            .collect::<Vec<_>>();
        self.lock_system().refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            Self::refresh_kind(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_visible() {
        let procs = Procs::new();
        let pid = std::process::id();
        assert!(procs.is_running(pid));
        assert!(procs.name(pid).is_some());
    }

    #[test]
    fn test_matching_cmdline_excludes_self() {
        let procs = Procs::new();
        // every cmdline matches, but our own pid must be filtered out
        let own_pid = std::process::id();
        let matches = procs.matching_cmdline(|_| true);
        assert!(!matches.contains(&own_pid));
    }

    #[test]
    fn test_kill_missing_pid_is_false() {
        let procs = Procs::new();
        // pids wrap well below u32::MAX on every supported OS
        assert!(!procs.kill(u32::MAX - 1));
    }

    #[test]
    fn test_port_listeners_finds_own_listener() {
        let procs = Procs::new();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let pids = procs.port_listeners(port);
        assert!(pids.contains(&std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_matching_cmdline_sees_spawned_process() {
        let procs = Procs::new();
        let mut child = std::process::Command::new("sh")
            .arg("-c")
            .arg("sleep 30")
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        procs.refresh_processes();
        let matches = procs.matching_cmdline(|cmd| cmd.contains("sleep 30"));
        assert!(matches.contains(&child.id()), "spawned shell not matched by cmdline");
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_is_bounded_for_term_ignoring_process() {
        let procs = Procs::new();
        let mut child = std::process::Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 8")
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        procs.refresh_pids(&[child.id()]);
        let start = std::time::Instant::now();
        assert!(procs.kill(child.id()));
        assert!(
            start.elapsed() < Duration::from_secs(4),
            "kill stalled on a process that ignores the termination request"
        );
        child.wait().unwrap();
    }
}
