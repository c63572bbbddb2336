use crate::config::LauncherConfig;
use crate::probe;
use crate::supervisor::SUPERVISOR;
use crate::Result;
use miette::IntoDiagnostic;

/// Show the supervisor and server state
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Show the supervisor and server state

Reports the lifecycle state, the tracked process (if any), whether the server
port is accepting connections, and the active build.

Examples:
  comfy-launcher status          Human-readable output
  comfy-launcher status --json   Machine-readable output"
)]
pub struct Status {
    /// Emit JSON instead of the styled summary
    #[clap(long)]
    json: bool,
}

impl Status {
    pub async fn run(&self) -> Result<()> {
        let config = LauncherConfig::load();
        let status = SUPERVISOR.status().await;
        let tracked = SUPERVISOR.tracked().await;
        let port = SUPERVISOR.port();
        let port_open = probe::is_port_open(port);

        if self.json {
            let out = serde_json::json!({
                "status": status.to_string(),
                "port": port,
                "port_open": port_open,
                "pid": tracked.as_ref().map(|h| h.pid),
                "mode": tracked.as_ref().map(|h| h.mode_label.clone()),
                "active_build": config.active,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).into_diagnostic()?
            );
            return Ok(());
        }

        println!("state:  {}", status.style());
        match &tracked {
            Some(h) => println!("pid:    {} ({})", h.pid, h.mode_label),
            None => println!("pid:    {}", console::style("none").dim()),
        }
        let port_state = if port_open {
            console::style("open").green()
        } else {
            console::style("closed").dim()
        };
        println!("port:   {port} ({port_state})");
        match config.active.as_deref() {
            Some(active) => println!("build:  {active}"),
            None => println!("build:  {}", console::style("none configured").dim()),
        }
        Ok(())
    }
}
