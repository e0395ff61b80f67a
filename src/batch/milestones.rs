//! Milestone resolution
//!
//! Maps each milestone title in the document to a milestone number,
//! reusing milestones the repository already has (open or closed) and
//! creating the rest. Running it again with the same titles creates nothing.

use crate::domain::{MilestoneMap, MilestoneSpec};
use crate::github::{ApiError, IssueTracker};

/// Resolves every milestone, returning title → number
pub async fn resolve_milestones<T>(
    tracker: &T,
    specs: &[MilestoneSpec],
) -> Result<MilestoneMap, ApiError>
where
    T: IssueTracker + ?Sized,
{
    let mut resolved = MilestoneMap::new();
    if specs.is_empty() {
        return Ok(resolved);
    }

    let existing = tracker.list_milestones().await?;

    for spec in specs {
        if resolved.contains_key(&spec.title) {
            continue;
        }

        let number = match existing.iter().find(|m| m.title == spec.title) {
            Some(found) => {
                tracing::info!(milestone = %spec.title, number = found.number, "Reusing existing milestone");
                found.number
            }
            None => {
                let created = tracker
                    .create_milestone(&spec.title, &spec.description)
                    .await?;
                tracing::info!(milestone = %spec.title, number = created.number, "Created milestone");
                created.number
            }
        };

        resolved.insert(spec.title.clone(), number);
    }

    Ok(resolved)
}
