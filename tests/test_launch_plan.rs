//! Downgrade-chain behavior of the launch strategy resolver against real
//! on-disk layouts.

use comfy_launcher::launch::{
    self, LaunchCommand, StartupMode, RUN_CPU, RUN_GPU, RUN_GPU_FAST,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Lay out `base/ComfyUI/main.py` plus the given launch scripts in `base`.
fn layout(scripts: &[&str]) -> (TempDir, PathBuf) {
    let base = TempDir::new().unwrap();
    let comfy = base.path().join("ComfyUI");
    fs::create_dir_all(&comfy).unwrap();
    fs::write(comfy.join("main.py"), "print('comfy')\n").unwrap();
    for script in scripts {
        fs::write(base.path().join(script), "echo launch\n").unwrap();
    }
    (base, comfy)
}

fn script_name(plan: &launch::LaunchPlan) -> Option<String> {
    match &plan.command {
        LaunchCommand::Script { path } => {
            Some(path.file_name().unwrap().to_string_lossy().to_string())
        }
        LaunchCommand::Interpreter { .. } => None,
    }
}

fn add_embedded_python(base: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let dir = base.join("python_embeded");
        fs::create_dir_all(&dir).unwrap();
        let exe = dir.join("python.exe");
        fs::write(&exe, "").unwrap();
        exe
    }
    #[cfg(not(windows))]
    {
        let dir = base.join("python_embeded").join("bin");
        fs::create_dir_all(&dir).unwrap();
        let exe = dir.join("python3");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        exe
    }
}

#[test]
fn test_requested_script_present() {
    let (base, comfy) = layout(&[RUN_CPU, RUN_GPU, RUN_GPU_FAST]);
    let _ = &base;

    let plan = launch::resolve_plan(&comfy, StartupMode::Cpu, true).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_CPU));
    assert_eq!(plan.label, "CPU");

    let plan = launch::resolve_plan(&comfy, StartupMode::GpuFast, true).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_GPU_FAST));
    assert_eq!(plan.label, "GPU (fast fp16)");
}

#[test]
fn test_fast_variant_downgrades_to_gpu() {
    let (_base, comfy) = layout(&[RUN_CPU, RUN_GPU]);
    let plan = launch::resolve_plan(&comfy, StartupMode::GpuFast, true).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_GPU));
    assert_eq!(plan.label, "GPU");
}

#[test]
fn test_gpu_missing_downgrades_to_auto() {
    // gpu requested, no gpu script: auto resolution with no GPU lands on cpu
    let (_base, comfy) = layout(&[RUN_CPU]);
    let plan = launch::resolve_plan(&comfy, StartupMode::Gpu, false).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_CPU));
    assert_eq!(plan.label, "CPU");
}

#[test]
fn test_auto_picks_by_gpu_availability() {
    let (_base, comfy) = layout(&[RUN_CPU, RUN_GPU]);
    let plan = launch::resolve_plan(&comfy, StartupMode::Auto, true).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_GPU));
    let plan = launch::resolve_plan(&comfy, StartupMode::Auto, false).unwrap();
    assert_eq!(script_name(&plan).as_deref(), Some(RUN_CPU));
}

#[test]
fn test_cpu_missing_falls_through_to_interpreter_with_cpu_flag() {
    // cpu mode, no cpu launch script, bundled interpreter and entry point
    // present: direct interpreter invocation with --cpu appended
    let (base, comfy) = layout(&[]);
    let embedded = add_embedded_python(base.path());

    let plan = launch::resolve_plan(&comfy, StartupMode::Cpu, false).unwrap();
    match &plan.command {
        LaunchCommand::Interpreter { python, args, env } => {
            assert_eq!(python, &embedded);
            assert!(args.iter().any(|a| a.ends_with("main.py")));
            assert!(args.contains(&"--cpu".to_string()));
            assert!(env.iter().any(|(k, _)| k == "PYTHONHOME"));
            assert!(env.iter().any(|(k, _)| k == "PYTHONPATH"));
        }
        other => panic!("expected interpreter invocation, got {other:?}"),
    }
    assert_eq!(plan.cwd, comfy);
}

#[test]
fn test_downgrade_chain_is_deterministic() {
    let (_base, comfy) = layout(&[RUN_GPU]);
    let first = launch::resolve_plan(&comfy, StartupMode::GpuFast, true).unwrap();
    let second = launch::resolve_plan(&comfy, StartupMode::GpuFast, true).unwrap();
    assert_eq!(first.command, second.command);
    assert_eq!(first.label, second.label);
}

#[test]
fn test_entry_point_missing_is_an_error() {
    let base = TempDir::new().unwrap();
    let comfy = base.path().join("ComfyUI");
    fs::create_dir_all(&comfy).unwrap();

    let err = launch::resolve_plan(&comfy, StartupMode::Cpu, false).unwrap_err();
    assert!(err.to_string().contains("entry point not found"));
    assert!(!launch::comfy_exists(&comfy));
}
