//! CLI command implementations

pub mod error;
pub mod ingest;
pub mod sources;
pub mod status;

pub use error::CliError;
pub use ingest::{Cli, Commands, IngestArgs, OutputFormat};
pub use sources::SourcesCommand;
pub use status::StatusCommand;
