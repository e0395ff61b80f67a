//! # Template Rendering
//!
//! Issue titles and bodies are Jinja-style templates. Every template sees
//! the same [`TemplateContext`]:
//!
//! | Variable | Contents |
//! |----------|----------|
//! | `repo.owner`, `repo.repo` | Target repository |
//! | `env.NAME` | Environment snapshot taken at start-up |
//! | `date` | Run timestamp (ms since epoch), use with the `date` filter |
//! | `eventName`, `sha`, `ref`, `workflow`, `action`, `actor`, `job`, `runNumber`, `runId` | Actions run context |
//! | `payload` | Triggering event payload |
//!
//! ```text
//! Generated on {{ date | date("%Y-%m-%d") }} for {{ repo.owner }}/{{ repo.repo }}
//! ```

mod context;
mod template;

pub use context::{RunContext, TemplateContext};
pub use template::{RenderError, TemplateRenderer, DEFAULT_DATE_FORMAT};
