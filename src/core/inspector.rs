//! Serializable view of a form instance for debugging panels.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::history::SubmissionHistory;
use crate::domain::{ActionFormState, SubmissionRecord};

/// Point-in-time copy of the submission state and history
#[derive(Debug, Clone, Serialize)]
pub struct InspectorSnapshot<R> {
    pub taken_at: DateTime<Utc>,
    pub state: ActionFormState<R>,
    pub history: Vec<SubmissionRecord<R>>,
    pub success_count: usize,
    pub failure_count: usize,

    /// Key of the optimistic slot, when one is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimistic_key: Option<String>,
}

impl<R: Clone> InspectorSnapshot<R> {
    pub fn capture(
        state: &ActionFormState<R>,
        history: &SubmissionHistory<R>,
        optimistic_key: Option<String>,
    ) -> Self {
        Self {
            taken_at: Utc::now(),
            state: state.clone(),
            history: history.to_vec(),
            success_count: history.successes(),
            failure_count: history.failures(),
            optimistic_key,
        }
    }

    /// Most recent attempt, if any
    pub fn last(&self) -> Option<&SubmissionRecord<R>> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueBundle;
    use uuid::Uuid;

    #[test]
    fn test_counts_match_history() {
        let mut history = SubmissionHistory::new();
        history.append(SubmissionRecord::resolved(Uuid::new_v4(), ValueBundle::new(), 1u8, true));
        history.append(SubmissionRecord::resolved(Uuid::new_v4(), ValueBundle::new(), 2u8, false));
        history.append(SubmissionRecord::failed(
            Uuid::new_v4(),
            ValueBundle::new(),
            &anyhow::anyhow!("Network error"),
        ));

        let snapshot = InspectorSnapshot::capture(&ActionFormState::succeeded(1u8), &history, None);

        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.failure_count, 2);
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.last().and_then(|r| r.error.as_deref()), Some("Network error"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"]["is_submit_successful"], true);
        assert!(json.get("optimistic_key").is_none());
    }
}
