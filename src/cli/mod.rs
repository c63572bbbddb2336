use crate::Result;
use clap::Parser;

mod builds;
mod console;
mod restart;
mod start;
mod status;
mod stop;

#[derive(Debug, clap::Parser)]
#[clap(name = "comfy-launcher", version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Start(start::Start),
    Stop(stop::Stop),
    Restart(restart::Restart),
    Status(status::Status),
    Console(console::Console),
    Builds(builds::Builds),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Start(start) => start.run().await,
        Command::Stop(stop) => stop.run().await,
        Command::Restart(restart) => restart.run().await,
        Command::Status(status) => status.run().await,
        Command::Console(console) => console.run().await,
        Command::Builds(builds) => builds.run().await,
    }
}
