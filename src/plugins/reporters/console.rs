use std::fmt::Write as _;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::models::{CycleReport, QueryOutcome};
use crate::plugins::traits::Reporter;
use crate::utils::error::ReportError;

/// Prints each cycle to stdout in the format the watcher has always used.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, report: &CycleReport) -> String {
        let mut out = String::new();

        for (name, result) in &report.results {
            match result {
                Ok(QueryOutcome::Baseline { recovered_from, .. }) => {
                    if let Some(reason) = recovered_from {
                        let _ = writeln!(out, "{}: stored snapshot was unreadable ({}), starting over", name, reason);
                    }
                    let _ = writeln!(out, "{}: Looking for items...", capitalize(name));
                }
                Ok(QueryOutcome::NewItems { .. }) => {}
                Err(failure) => {
                    let _ = writeln!(out, "{}: poll failed: {}", capitalize(name), failure);
                }
            }
        }

        if report.has_new_items() {
            out.push_str("\nNew items:\n");
            for (name, delta) in report.new_items() {
                let _ = writeln!(out, "\nBrand: {}", capitalize(name));
                for record in delta {
                    let _ = writeln!(
                        out,
                        "{}: {}, {}, {}",
                        record.id,
                        record.title,
                        record.formatted_price(),
                        record.url
                    );
                }
            }
        } else {
            out.push_str("\nNo new items found\n");
        }

        out
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    fn name(&self) -> &str {
        "Console Reporter"
    }

    fn plugin_type(&self) -> &str {
        "console"
    }

    async fn report(&self, report: &CycleReport) -> Result<(), ReportError> {
        let rendered = self.render(report);
        let mut stdout = tokio::io::stdout();
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}
