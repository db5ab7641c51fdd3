use super::JobId;
use crate::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Rejects repeated submissions of the same file within a short window.
/// The state is in-memory only, a restart forgets everything.
pub(crate) struct DuplicateSuppressor {
    window: Duration,
    marks: parking_lot::Mutex<HashMap<String, Mark>>,
}

struct Mark {
    owner: JobId,
    since: Instant,
}

impl Mark {
    fn is_fresh(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.since) < window
    }
}

impl DuplicateSuppressor {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            marks: Default::default(),
        }
    }

    /// A file is rejected if another job marked it less than the window ago
    pub(crate) fn should_reject(&self, file_id: &str, job: &JobId, now: Instant) -> bool {
        self.marks
            .lock()
            .get(file_id)
            .is_some_and(|mark| mark.owner != *job && mark.is_fresh(self.window, now))
    }

    pub(crate) fn mark_active(&self, file_id: &str, job: &JobId, now: Instant) {
        let mut marks = self.marks.lock();
        let window = self.window;
        marks.retain(|_, mark| mark.is_fresh(window, now));
        marks.insert(
            file_id.to_owned(),
            Mark {
                owner: job.clone(),
                since: now,
            },
        );
    }

    /// Atomic combination of [`Self::should_reject`] and [`Self::mark_active`].
    /// Returns `false` if the file is rejected.
    pub(crate) fn try_acquire(&self, file_id: &str, job: &JobId, now: Instant) -> bool {
        let mut marks = self.marks.lock();
        let window = self.window;

        // Stale marks of jobs that are still running are dropped too. They
        // no longer suppress anything, and this keeps the map bounded.
        marks.retain(|_, mark| mark.is_fresh(window, now));

        if marks.get(file_id).is_some_and(|mark| mark.owner != *job) {
            debug!(file_id, %job, "Rejecting duplicate file submission");
            return false;
        }

        marks.insert(
            file_id.to_owned(),
            Mark {
                owner: job.clone(),
                since: now,
            },
        );

        true
    }

    /// Removes the mark only if it belongs to the given job. A newer job may
    /// have taken over the mark after the window of this one expired.
    pub(crate) fn clear(&self, file_id: &str, job: &JobId) {
        let mut marks = self.marks.lock();
        if marks.get(file_id).is_some_and(|mark| mark.owner == *job) {
            marks.remove(file_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.marks.lock().len()
    }
}
