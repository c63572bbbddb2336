#[macro_use]
extern crate log;

pub mod cli;
pub mod config;
pub mod console_buffer;
pub mod env;
pub mod error;
pub mod gpu;
pub mod launch;
pub mod logger;
pub mod probe;
pub mod procs;
pub mod readiness;
pub mod supervisor;

pub use miette::Result;
