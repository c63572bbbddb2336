#[macro_use]
extern crate log;

mod cli;
mod config;
mod console_buffer;
mod env;
mod error;
mod gpu;
mod launch;
mod logger;
mod probe;
mod procs;
mod readiness;
mod supervisor;

pub use miette::Result;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    #[cfg(unix)]
    handle_epipe();
    cli::run().await
}

#[cfg(unix)]
fn handle_epipe() {
    match signal::unix::signal(SignalKind::pipe()) {
        Ok(mut pipe_stream) => {
            tokio::spawn(async move {
                pipe_stream.recv().await;
                debug!("received SIGPIPE");
            });
        }
        Err(e) => {
            warn!("Could not set up SIGPIPE handler: {e}");
        }
    }
}
