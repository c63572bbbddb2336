use crate::{Result, env};
use itertools::Itertools;
use miette::IntoDiagnostic;
use std::fs::File;

/// Show recent launcher log lines
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Show recent launcher log lines

Prints the tail of launcher.log, the timestamped event log the supervisor
writes under the state directory. Captured server output is held in the
in-app console buffer and is only available to embedding applications.

Examples:
  comfy-launcher console           Show the last 100 lines
  comfy-launcher console -n 500    Show the last 500 lines"
)]
pub struct Console {
    /// Number of lines to show
    #[clap(short, long, default_value = "100")]
    n: usize,
}

impl Console {
    pub async fn run(&self) -> Result<()> {
        let path = &*env::LAUNCHER_LOG_FILE;
        if !path.exists() {
            warn!("no launcher log at {}", path.display());
            return Ok(());
        }
        let file = File::open(path).into_diagnostic()?;
        let rev = rev_lines::RevLines::new(file);
        let lines = rev
            .into_iter()
            .filter_map(std::result::Result::ok)
            .take(self.n)
            .collect_vec();
        for line in lines.into_iter().rev() {
            println!("{line}");
        }
        Ok(())
    }
}
