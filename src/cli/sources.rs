//! CLI command for listing built-in datasets

use clap::Args;
use serde_json::json;

use super::{CliError, OutputFormat};
use crate::registry::DatasetRegistry;
use crate::sources::RefreshMode;

/// Sources subcommand
#[derive(Debug, Args)]
pub struct SourcesCommand {
    /// Optional dataset pattern (supports wildcards)
    pattern: Option<String>,
}

impl SourcesCommand {
    /// Print the datasets matching the pattern
    pub fn execute(&self, format: OutputFormat) -> Result<(), CliError> {
        let registry = DatasetRegistry::builtin();
        let sources = match &self.pattern {
            Some(p) => registry.resolve(&[p.as_str()])?,
            None => registry.all(),
        };

        match format {
            OutputFormat::Json => {
                let entries: Vec<_> = sources
                    .iter()
                    .map(|s| {
                        let descriptor = s.descriptor();
                        json!({
                            "name": descriptor.name(),
                            "api": s.api_name(),
                            "table": descriptor.table().as_str(),
                            "date_column": descriptor.date_column().as_str(),
                            "refresh": descriptor.refresh(),
                            "mode": descriptor.refresh().write_mode(),
                        })
                    })
                    .collect();
                println!("{}", json!({ "count": entries.len(), "datasets": entries }));
            }
            OutputFormat::Human => {
                println!(
                    "{:<14} {:<14} {:<12} {:<12}",
                    "DATASET", "TABLE", "DATE COLUMN", "REFRESH"
                );
                for source in &sources {
                    let descriptor = source.descriptor();
                    let refresh = match descriptor.refresh() {
                        RefreshMode::Incremental => "incremental",
                        RefreshMode::FullRefresh => "full",
                    };
                    println!(
                        "{:<14} {:<14} {:<12} {:<12}",
                        descriptor.name(),
                        descriptor.table(),
                        descriptor.date_column(),
                        refresh
                    );
                }
                println!("\nTotal: {} datasets", sources.len());
            }
        }

        Ok(())
    }
}
