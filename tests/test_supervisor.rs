//! End-to-end supervisor behavior against real spawned processes.

#![cfg(unix)]

use comfy_launcher::config::Build;
use comfy_launcher::launch::{RUN_CPU, StartupMode};
use comfy_launcher::procs::PROCS;
use comfy_launcher::supervisor::Supervisor;
use std::fs;
use std::net::TcpListener;
use std::time::Duration;
use tempfile::TempDir;

/// A fake portable build whose cpu launch script just sleeps, giving the
/// sweep a parent (sh) + child (sleep) tree to converge on.
fn fake_build(with_script: bool) -> (TempDir, Build) {
    let base = TempDir::new().unwrap();
    let comfy = base.path().join("ComfyUI");
    fs::create_dir_all(&comfy).unwrap();
    if with_script {
        fs::write(comfy.join("main.py"), "print('comfy')\n").unwrap();
        fs::write(base.path().join(RUN_CPU), "#!/bin/sh\nsleep 30\n").unwrap();
    }
    let build = Build {
        id: "test".to_string(),
        path: comfy,
        startup_mode: StartupMode::Cpu,
        icon: None,
        has_started: true,
    };
    (base, build)
}

async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..20 {
        PROCS.refresh_pids(&[pid]);
        if !PROCS.is_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_ensure_running_is_idempotent_and_stop_converges() {
    let (_base, build) = fake_build(true);
    // scratch port nothing listens on
    let supervisor = Supervisor::new(48917);

    let outcome = supervisor.ensure_running(&build, false).await;
    let pid = match outcome {
        comfy_launcher::supervisor::StartOutcome::Started { pid, .. } => pid,
        other => panic!("expected a spawn, got {other:?}"),
    };
    PROCS.refresh_pids(&[pid]);
    assert!(PROCS.is_running(pid));

    // second call while the process is alive: exactly one live process
    let outcome = supervisor.ensure_running(&build, false).await;
    assert!(outcome.is_already_running());
    assert_eq!(supervisor.tracked().await.unwrap().pid, pid);

    // the sweep matches the script name in the command line and kills the
    // whole tree (sh plus its sleep child)
    let outcome = supervisor.stop_hard(Duration::from_secs(2)).await;
    assert!(outcome.is_stopped(), "unexpected outcome {outcome:?}");
    assert!(wait_for_exit(pid).await, "script process survived the sweep");
    assert!(supervisor.tracked().await.is_none());
    assert!(supervisor.status().await.is_idle());
}

#[tokio::test]
async fn test_no_spawn_when_port_already_bound() {
    // a server started by other means owns the port
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // deliberately broken build: any spawn attempt would fail loudly
    let (_base, build) = fake_build(false);
    let supervisor = Supervisor::new(port);

    let outcome = supervisor.ensure_running(&build, false).await;
    assert!(outcome.is_already_running());
    assert!(supervisor.tracked().await.is_none());
    assert!(supervisor.status().await.is_running());
}

#[tokio::test]
async fn test_unresolvable_build_reports_start_failed() {
    let (_base, build) = fake_build(false);
    let supervisor = Supervisor::new(48919);

    let outcome = supervisor.ensure_running(&build, false).await;
    match outcome {
        comfy_launcher::supervisor::StartOutcome::StartFailed { error } => {
            assert!(error.contains("entry point"), "unexpected error: {error}");
        }
        other => panic!("expected start_failed, got {other:?}"),
    }
    assert!(supervisor.status().await.is_idle());
}
