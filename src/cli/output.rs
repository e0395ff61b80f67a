//! Output formatting for CLI commands

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::batch::BatchReport;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
    /// Emit `::error::` workflow commands (set when running under Actions)
    annotations: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self {
            format,
            verbose,
            annotations: false,
        }
    }

    pub fn with_annotations(mut self, annotations: bool) -> Self {
        self.annotations = annotations;
        self
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Marks the step failed under Actions (no-op elsewhere)
    pub fn annotate_error(&self, message: &str) {
        if self.annotations {
            println!("::error::{}", escape_command_data(message));
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        let json = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        if let Ok(json) = json {
            println!("{}", json);
        }
    }

    /// Prints a table row (text only, ignored in JSON mode)
    pub fn row(&self, columns: &[&str]) {
        if self.format == OutputFormat::Text {
            println!("{}", columns.join("\t"));
        }
    }

    /// Prints a blank line (text only)
    pub fn blank(&self) {
        if self.format == OutputFormat::Text {
            println!();
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

/// Escapes a workflow command message
fn escape_command_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// The `key=value` lines written to the step outputs file
pub fn step_outputs(report: &BatchReport) -> Vec<(String, String)> {
    let mut outputs = Vec::with_capacity(3);
    if let Some(last) = report.last() {
        outputs.push(("number".to_string(), last.number.to_string()));
        outputs.push(("url".to_string(), last.html_url.clone()));
    }

    let issues = serde_json::to_string(&report.numbers()).unwrap_or_else(|_| "{}".to_string());
    outputs.push(("issues".to_string(), issues));
    outputs
}

/// Appends the run's step outputs to the `GITHUB_OUTPUT` file
pub fn write_step_outputs(path: &Path, report: &BatchReport) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for (key, value) in step_outputs(report) {
        writeln!(file, "{key}={value}")?;
    }
    Ok(())
}
