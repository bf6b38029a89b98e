pub mod config;
pub mod report;
pub mod tracing_setup;

pub use config::CliConfig;
pub use report::{run, DeleteOutcome, Report, RunOptions};
pub use tracing_setup::init_tracing;
