use crate::config::LauncherConfig;
use crate::Result;
use comfy_table::{Table, presets};

/// List configured ComfyUI builds
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "b",
    verbatim_doc_comment,
    long_about = "\
List configured ComfyUI builds

Builds are declared in config.toml under [builds.<id>] with a path and a
startup mode; `active` selects which one start/restart use by default.

Examples:
  comfy-launcher builds          List all builds"
)]
pub struct Builds {}

impl Builds {
    pub async fn run(&self) -> Result<()> {
        let config = LauncherConfig::load();
        if config.builds.is_empty() {
            warn!("no builds configured, add one to config.toml");
            return Ok(());
        }
        let mut table = Table::new();
        table.load_preset(presets::NOTHING);
        table.set_header(vec!["ID", "MODE", "PATH", "VALID", "ACTIVE"]);
        for (id, build) in &config.builds {
            let active = if config.active.as_deref() == Some(id.as_str()) {
                "*"
            } else {
                ""
            };
            let valid = if build.is_valid() { "yes" } else { "no" };
            table.add_row(vec![
                id.clone(),
                build.startup_mode.to_string(),
                build.path.display().to_string(),
                valid.to_string(),
                active.to_string(),
            ]);
        }
        println!("{table}");
        Ok(())
    }
}
