//! Launch strategy resolution.
//!
//! Maps a requested startup mode plus GPU availability onto a concrete launch
//! command, walking a downgrade chain over the artifacts actually present on
//! disk so that some valid launch path is always produced as long as either a
//! vendor script or an interpreter + entry point exists.

use crate::env::find_in_path;
use crate::error::LaunchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// ComfyUI entry point, relative to the build path.
pub const ENTRY_POINT: &str = "main.py";

#[cfg(windows)]
pub const RUN_CPU: &str = "run_cpu.bat";
#[cfg(windows)]
pub const RUN_GPU: &str = "run_nvidia_gpu.bat";
#[cfg(windows)]
pub const RUN_GPU_FAST: &str = "run_nvidia_gpu_fast_fp16_accumulation.bat";

#[cfg(not(windows))]
pub const RUN_CPU: &str = "run_cpu.sh";
#[cfg(not(windows))]
pub const RUN_GPU: &str = "run_nvidia_gpu.sh";
#[cfg(not(windows))]
pub const RUN_GPU_FAST: &str = "run_nvidia_gpu_fast_fp16_accumulation.sh";

/// Command-line markers the stop sweep matches candidate processes against.
pub const SCRIPT_MARKERS: [&str; 3] = [RUN_CPU, RUN_GPU, RUN_GPU_FAST];

/// User-selected startup mode, persisted per build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIs,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    Auto,
    Cpu,
    Gpu,
    // the original launcher persisted this as "fast_fp16"
    #[serde(alias = "fast_fp16")]
    GpuFast,
}

impl Default for StartupMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Concrete way to start the server, after the downgrade chain has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCommand {
    /// Run a vendor launch script from the build's parent directory.
    Script { path: PathBuf },
    /// Invoke the interpreter on the entry point directly.
    Interpreter {
        python: PathBuf,
        args: Vec<String>,
        env: Vec<(String, String)>,
    },
}

/// Resolved launch plan. Never persisted; recomputed on every attempt.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub command: LaunchCommand,
    /// Human-readable mode label for logs and the UI.
    pub label: String,
    pub cwd: PathBuf,
}

/// Bundled interpreter next to the build, if present.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    pub python: PathBuf,
    /// Set when the portable build ships its own interpreter directory.
    pub embedded_dir: Option<PathBuf>,
}

/// True iff `path` looks like a ComfyUI checkout (contains the entry point).
pub fn comfy_exists(path: &Path) -> bool {
    path.join(ENTRY_POINT).exists()
}

/// Pure mapping from (mode, gpu availability) to (artifact, label).
pub fn resolve(mode: StartupMode, gpu_available: bool) -> (&'static str, &'static str) {
    match mode {
        StartupMode::Cpu => (RUN_CPU, "CPU"),
        StartupMode::Gpu => (RUN_GPU, "GPU"),
        StartupMode::GpuFast => (RUN_GPU_FAST, "GPU (fast fp16)"),
        StartupMode::Auto => {
            if gpu_available {
                (RUN_GPU, "GPU")
            } else {
                (RUN_CPU, "CPU")
            }
        }
    }
}

/// Find the interpreter for the direct-invocation fallback.
///
/// Prefers the portable build's bundled interpreter (both historical
/// spellings), then a system interpreter from the search path.
pub fn resolve_python(base_dir: &Path) -> Option<PythonRuntime> {
    for spelling in ["python_embeded", "python_embedded"] {
        let embed_dir = base_dir.join(spelling);
        #[cfg(windows)]
        let candidates = [embed_dir.join("python.exe")];
        #[cfg(not(windows))]
        let candidates = [embed_dir.join("bin").join("python3"), embed_dir.join("bin").join("python")];
        for candidate in candidates {
            if candidate.is_file() {
                return Some(PythonRuntime {
                    python: candidate,
                    embedded_dir: Some(embed_dir),
                });
            }
        }
    }
    find_in_path("python3")
        .or_else(|| find_in_path("python"))
        .map(|python| PythonRuntime {
            python,
            embedded_dir: None,
        })
}

/// Resolve the launch plan for a build, applying the downgrade chain:
/// missing fast-variant script falls back to the plain GPU script, a missing
/// GPU script falls back to auto-resolution, and a missing auto/CPU script
/// falls back to invoking the interpreter on the entry point (with `--cpu`
/// when no GPU is available).
///
/// Pure function of (mode, gpu_available, on-disk artifacts).
pub fn resolve_plan(
    comfy_path: &Path,
    mode: StartupMode,
    gpu_available: bool,
) -> Result<LaunchPlan, LaunchError> {
    let base_dir = comfy_path.parent().unwrap_or(comfy_path).to_path_buf();

    let mut mode = mode;
    if mode.is_gpu_fast() && !base_dir.join(RUN_GPU_FAST).exists() {
        info!("{RUN_GPU_FAST} not found, falling back to {RUN_GPU}");
        mode = StartupMode::Gpu;
    }
    if mode.is_gpu() && !base_dir.join(RUN_GPU).exists() {
        info!("{RUN_GPU} not found, falling back to auto resolution");
        mode = StartupMode::Auto;
    }

    let (artifact, label) = resolve(mode, gpu_available);
    let script = base_dir.join(artifact);
    if script.exists() {
        return Ok(LaunchPlan {
            command: LaunchCommand::Script { path: script },
            label: label.to_string(),
            cwd: base_dir,
        });
    }

    // No script on disk for the resolved mode: invoke the interpreter on the
    // entry point directly.
    let entry = comfy_path.join(ENTRY_POINT);
    if !entry.exists() {
        return Err(LaunchError::EntryPointMissing { path: entry });
    }
    let Some(runtime) = resolve_python(&base_dir) else {
        return Err(LaunchError::NoLaunchPath { dir: base_dir });
    };

    let mut args = vec![entry.to_string_lossy().to_string()];
    #[cfg(windows)]
    args.push("--windows-standalone-build".to_string());
    if !gpu_available {
        args.push("--cpu".to_string());
    }

    let mut env = vec![];
    if let Some(embed_dir) = &runtime.embedded_dir {
        let embed = embed_dir.to_string_lossy().to_string();
        env.push(("PYTHONHOME".to_string(), embed.clone()));
        env.push((
            "PYTHONPATH".to_string(),
            comfy_path.to_string_lossy().to_string(),
        ));
        let path = match &*crate::env::ORIGINAL_PATH {
            Some(orig) => std::env::join_paths([embed_dir.clone()].into_iter().chain(
                std::env::split_paths(orig),
            ))
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(embed.clone()),
            None => embed.clone(),
        };
        env.push(("PATH".to_string(), path));
    }

    info!(
        "no launch script found, using interpreter invocation: {}",
        runtime.python.display()
    );
    Ok(LaunchPlan {
        command: LaunchCommand::Interpreter {
            python: runtime.python,
            args,
            env,
        },
        label: format!("{label} (direct)"),
        cwd: comfy_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_table() {
        assert_eq!(resolve(StartupMode::Cpu, true), (RUN_CPU, "CPU"));
        assert_eq!(resolve(StartupMode::Gpu, false), (RUN_GPU, "GPU"));
        assert_eq!(
            resolve(StartupMode::GpuFast, true),
            (RUN_GPU_FAST, "GPU (fast fp16)")
        );
        assert_eq!(resolve(StartupMode::Auto, true), (RUN_GPU, "GPU"));
        assert_eq!(resolve(StartupMode::Auto, false), (RUN_CPU, "CPU"));
    }

    #[test]
    fn test_startup_mode_serde_aliases() {
        let mode: StartupMode = serde_json::from_str("\"fast_fp16\"").unwrap();
        assert_eq!(mode, StartupMode::GpuFast);
        let mode: StartupMode = serde_json::from_str("\"gpu_fast\"").unwrap();
        assert_eq!(mode, StartupMode::GpuFast);
        assert_eq!(StartupMode::GpuFast.to_string(), "gpu_fast");
    }
}
