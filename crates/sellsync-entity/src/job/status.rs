//! Job lifecycle states and the legal transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`super::Job`].
///
/// `Completed`, `Failed`, `Cancelled`, and `Expired` are terminal. A job in
/// a terminal state never changes status again; every store operation that
/// moves a job guards on the current status so a stale writer cannot revive
/// a settled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting to be claimed.
    Pending,
    /// Claimed by a worker, currently executing.
    Running,
    /// Held back by an operator, not claimable.
    Paused,
    /// Finished successfully.
    Completed,
    /// Failed with no retries left.
    Failed,
    /// Stopped on request before it finished.
    Cancelled,
    /// Sat in the queue past its deadline.
    Expired,
}

impl JobStatus {
    /// True for states a job can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// A failed execution with retries left moves `Running -> Pending`;
    /// `Running -> Failed` is the exhausted-retries terminal move.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Paused)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Paused, Pending)
                | (Paused, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Pending)
                | (Running, Cancelled)
        )
    }

    /// Lowercase name as stored in Postgres.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
        JobStatus::Expired,
    ];

    #[test]
    fn test_allowed_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Paused));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Expired));
        assert!(Paused.can_transition_to(Pending));
        assert!(Paused.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Pending));
        assert!(Running.can_transition_to(Cancelled));
    }

    #[test]
    fn test_rejected_transitions() {
        use JobStatus::*;
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Paused));
        assert!(!Running.can_transition_to(Expired));
        assert!(!Paused.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Expired.can_transition_to(Running));
    }

    #[test]
    fn test_terminal_set() {
        use JobStatus::*;
        for status in ALL {
            let expected = matches!(status, Completed | Failed | Cancelled | Expired);
            assert_eq!(status.is_terminal(), expected, "{status}");
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_status() -> impl Strategy<Value = JobStatus> {
            proptest::sample::select(ALL.to_vec())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn terminal_states_absorb(from in any_status(), to in any_status()) {
                if from.is_terminal() {
                    prop_assert!(!from.can_transition_to(to));
                }
            }

            #[test]
            fn no_self_transitions(status in any_status()) {
                prop_assert!(!status.can_transition_to(status));
            }

            #[test]
            fn only_running_completes(from in any_status()) {
                if from.can_transition_to(JobStatus::Completed) {
                    prop_assert_eq!(from, JobStatus::Running);
                }
            }
        }
    }
}
