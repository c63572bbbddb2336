use crate::supervisor::{SUPERVISOR, StopOutcome};
use crate::{Result, env};
use miette::bail;
use std::time::Duration;

/// Stop the ComfyUI server and every process belonging to it
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Stop the ComfyUI server and every process belonging to it

Sweeps the process table for launch-script processes and kills their whole
descendant trees, falls back to matching the entry point or product name, and
finally kills whatever still listens on the server port. Safe to run when
nothing is up.

Examples:
  comfy-launcher stop            Stop with the default grace period
  comfy-launcher stop --grace 10 Keep re-checking the port for 10 seconds"
)]
pub struct Stop {
    /// Seconds to keep re-checking the port before giving up
    #[clap(long)]
    grace: Option<u64>,
}

impl Stop {
    pub async fn run(&self) -> Result<()> {
        let grace = self
            .grace
            .map(Duration::from_secs)
            .unwrap_or(*env::STOP_GRACE);
        match SUPERVISOR.stop_hard(grace).await {
            StopOutcome::Stopped => {
                info!("ComfyUI stopped completely.");
                Ok(())
            }
            StopOutcome::NothingToStop => {
                warn!("no ComfyUI process found to stop");
                Ok(())
            }
            StopOutcome::StopIncomplete => {
                bail!(
                    "port {} is still busy after the grace period, a residual process may remain",
                    SUPERVISOR.port()
                )
            }
        }
    }
}
