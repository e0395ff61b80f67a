//! Label bootstrap
//!
//! A label that already exists is fine. A token without permission to
//! create labels only logs a warning, so a run can still use the labels
//! the repository has. Any other failure ends the run.

use crate::github::{IssueTracker, NewLabel};

use super::BatchError;

/// Creates each label unless the repository already has it
pub async fn bootstrap_labels<T>(tracker: &T, labels: &[NewLabel]) -> Result<(), BatchError>
where
    T: IssueTracker + ?Sized,
{
    for label in labels {
        match tracker.create_label(label).await {
            Ok(()) => tracing::info!(label = %label.name, "Created label"),
            Err(e) if e.is_already_exists() => {
                tracing::debug!(label = %label.name, "Label already exists")
            }
            Err(e) if e.is_forbidden() => {
                tracing::warn!(label = %label.name, error = %e, "Not allowed to create label, skipping")
            }
            Err(source) => {
                return Err(BatchError::Label {
                    label: label.name.clone(),
                    source,
                })
            }
        }
    }

    Ok(())
}
