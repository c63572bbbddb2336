use crate::config::LauncherConfig;
use crate::error::ConfigError;
use crate::readiness::{ReadinessOutcome, ReadinessPoller};
use crate::supervisor::{SUPERVISOR, StartOutcome};
use crate::Result;
use miette::bail;
use std::time::Duration;

/// Start the ComfyUI server for a configured build
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "s",
    verbatim_doc_comment,
    long_about = "\
Start the ComfyUI server for a configured build

If a live tracked process exists or the server port is already bound, nothing
is spawned. Otherwise GPU availability is probed, a launch strategy is
resolved (vendor script, or a direct interpreter invocation as fallback), and
the command waits for the port to open before returning.

The first launch of a build waits without a timeout, since initial model and
asset setup can take arbitrarily long. Later launches give up after the max
wait (default 90s); a timeout does not kill the server, which may still come
up afterwards.

Examples:
  comfy-launcher start              Start the active build
  comfy-launcher start portable     Start the build named 'portable'
  comfy-launcher start --hidden     Capture output instead of showing a console"
)]
pub struct Start {
    /// Build id to start (defaults to the active build)
    id: Option<String>,
    /// Capture server output instead of opening a visible console
    #[clap(long)]
    hidden: bool,
}

impl Start {
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

        let show_cmd = if self.hidden { false } else { config.show_cmd };
        match SUPERVISOR.ensure_running(&build, show_cmd).await {
            StartOutcome::AlreadyRunning => info!("ComfyUI already launched"),
            StartOutcome::Started { pid, mode_label } => {
                info!("ComfyUI launching (pid {pid}) in {mode_label} mode")
            }
            StartOutcome::StartFailed { error } => bail!("ComfyUI start failed: {error}"),
        }

        wait_for_server(&mut config, &build.id).await
    }
}

/// Poll the server port until it opens, reporting progress along the way.
/// On the first confirmed-ready launch of a build, records that fact so
/// later launches use the bounded timeout policy.
pub(crate) async fn wait_for_server(config: &mut LauncherConfig, build_id: &str) -> Result<()> {
    let first_launch = !config.build(build_id)?.has_started;
    if first_launch {
        info!("first launch of this build, waiting for the server without a timeout");
    }
    let mut handle = ReadinessPoller::new(SUPERVISOR.port(), first_launch).spawn();

    let mut last_report = Duration::ZERO;
    while handle.progress_changed().await {
        let elapsed = handle.elapsed();
        if elapsed.saturating_sub(last_report) >= Duration::from_secs(5) {
            info!("waiting for server on port {} ({}s)", SUPERVISOR.port(), elapsed.as_secs());
            last_report = elapsed;
        }
    }

    match handle.outcome().await {
        ReadinessOutcome::Ready => {
            info!("ComfyUI started.");
            config.mark_started(build_id);
            if let Err(e) = config.write() {
                warn!("failed to record first successful launch: {e}");
            }
            Ok(())
        }
        ReadinessOutcome::TimedOut => {
            bail!("failed to connect to the server: port did not open in time")
        }
        ReadinessOutcome::Cancelled => bail!("readiness wait was cancelled"),
    }
}
