use crate::cli::start::wait_for_server;
use crate::config::LauncherConfig;
use crate::error::ConfigError;
use crate::supervisor::{SUPERVISOR, StartOutcome};
use crate::{Result, env};
use miette::bail;
use std::time::Duration;

/// Restart the ComfyUI server (hard stop, then a fresh start)
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "r",
    verbatim_doc_comment,
    long_about = "\
Restart the ComfyUI server (hard stop, then a fresh start)

Runs the full stop sweep first, then starts the build again and waits for the
port to open.

Examples:
  comfy-launcher restart             Restart the active build
  comfy-launcher restart portable    Restart the build named 'portable'"
)]
pub struct Restart {
    /// Build id to restart (defaults to the active build)
    id: Option<String>,
    /// Capture server output instead of opening a visible console
    #[clap(long)]
    hidden: bool,
    /// Seconds to keep re-checking the port during the stop phase
    #[clap(long)]
    grace: Option<u64>,
}

impl Restart {
    pub async fn run(&self) -> Result<()> {
        let mut config = LauncherConfig::load();
        let build = match &self.id {
            Some(id) => config.build(id)?,
            None => config.active_build()?,
        }
        .clone();
        if !build.is_valid() {
            return Err(ConfigError::InvalidBuildPath {
                id: build.id.clone(),
                path: build.path.clone(),
            }
            .into());
        }

        let grace = self
            .grace
            .map(Duration::from_secs)
            .unwrap_or(*env::STOP_GRACE);
        let show_cmd = if self.hidden { false } else { config.show_cmd };
        match SUPERVISOR.restart(&build, show_cmd, grace).await {
            StartOutcome::AlreadyRunning => info!("ComfyUI already launched"),
            StartOutcome::Started { pid, mode_label } => {
                info!("ComfyUI launching (pid {pid}) in {mode_label} mode")
            }
            StartOutcome::StartFailed { error } => bail!("ComfyUI restart failed: {error}"),
        }

        wait_for_server(&mut config, &build.id).await
    }
}
