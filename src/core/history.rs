//! Bounded log of submission attempts.

use std::collections::VecDeque;

use crate::domain::SubmissionRecord;

/// Number of records kept before the oldest is evicted
pub const HISTORY_CAPACITY: usize = 50;

/// Append-only record sequence, oldest first
#[derive(Debug, Clone)]
pub struct SubmissionHistory<R> {
    records: VecDeque<SubmissionRecord<R>>,
}

impl<R> Default for SubmissionHistory<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SubmissionHistory<R> {
    pub fn new() -> Self {
        Self {
            records: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append a record, evicting from the front past capacity
    pub fn append(&mut self, record: SubmissionRecord<R>) {
        self.records.push_back(record);
        while self.records.len() > HISTORY_CAPACITY {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubmissionRecord<R>> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&SubmissionRecord<R>> {
        self.records.back()
    }

    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.success).count()
    }

    pub fn failures(&self) -> usize {
        self.records.len() - self.successes()
    }

    /// Host-initiated reset
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<R: Clone> SubmissionHistory<R> {
    /// Owned copy of the records, oldest first
    pub fn to_vec(&self) -> Vec<SubmissionRecord<R>> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueBundle;
    use uuid::Uuid;

    fn record(n: u32, success: bool) -> SubmissionRecord<u32> {
        SubmissionRecord::resolved(Uuid::new_v4(), ValueBundle::new(), n, success)
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = SubmissionHistory::new();
        for n in 0..HISTORY_CAPACITY as u32 {
            history.append(record(n, true));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().response, Some(0));

        history.append(record(50, false));
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().response, Some(1));
        assert_eq!(history.last().unwrap().response, Some(50));
    }

    #[test]
    fn test_success_failure_counts() {
        let mut history = SubmissionHistory::new();
        history.append(record(1, true));
        history.append(record(2, false));
        history.append(record(3, false));

        assert_eq!(history.successes(), 1);
        assert_eq!(history.failures(), 2);

        history.clear();
        assert!(history.is_empty());
    }
}
