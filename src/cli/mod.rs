//! # Command-Line Interface
//!
//! ## Commands
//!
//! | Command | Tracker | Effect |
//! |---------|---------|--------|
//! | `run` | GitHub REST API | Creates labels, milestones and issues |
//! | `plan` | In-memory | Prints the creation order and rendered issues |
//!
//! Both take the same inputs, as flags or as the `INPUT_*` / `GITHUB_*`
//! variables the Actions runner sets (see [`crate::config`]).
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Logs are written to stderr; `--verbose` lowers the default level to
//! `debug`, `RUST_LOG` overrides it.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;

pub use app::{run, Cli, Commands};
pub use output::{step_outputs, write_step_outputs, Output, OutputFormat};
