//! Diagnostics sink.

use lexisync_store::{DiagnosticIssue, Store};
use tracing::error;

/// Records integrity problems for operator follow-up.
///
/// Recording must survive the rollback of the push that detected the
/// problem, so implementations write outside the push transaction.
pub trait DiagnosticsSink: Send + Sync {
    /// Records one issue.
    fn record(&self, issue: DiagnosticIssue);
}

impl DiagnosticsSink for Store {
    fn record(&self, issue: DiagnosticIssue) {
        error!(
            user_id = %issue.user_id,
            issue_type = %issue.issue_type,
            details = %issue.details,
            "data integrity issue"
        );
        self.record_issue(issue);
    }
}
