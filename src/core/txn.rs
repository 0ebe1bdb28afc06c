//! Transactional grouping of jobs: fail one, cancel all.
//!
//! A `JobTxn` is a reference-counted group of jobs. The creator holds one
//! handle; every in-flight member holds another, so dropping the creator's
//! handle while members are still running never frees the group early.
//! When a member concludes with a non-success outcome, every member that
//! has not yet concluded is cancelled before the concluding member's
//! completion callback runs.

use std::sync::{Arc, Mutex, Weak};

use crate::core::job::{Job, JobError, JobInner};
use crate::core::types::JobOutcome;

struct TxnInner {
    /// Weak references: the transaction does not own its members. A member
    /// that can no longer be upgraded has already been torn down and needs
    /// no cancellation.
    members: Mutex<Vec<Weak<JobInner>>>,
}

/// A reference-counted group of jobs with all-or-nothing semantics.
///
/// `Clone` takes a reference, `Drop` releases one; the group is freed when
/// the last handle (creator's or a member's) goes away.
#[derive(Clone)]
pub struct JobTxn {
    inner: Arc<TxnInner>,
}

impl JobTxn {
    /// Create an empty transaction owned by the caller.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TxnInner {
                members: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach a not-yet-started job to this transaction.
    ///
    /// Fails if the job has already been started (membership is fixed at
    /// start) or is already attached to a transaction. The error affects
    /// no other job or transaction.
    pub fn add(&self, job: &Job) -> Result<(), JobError> {
        job.attach(self.clone())?;
        self.inner.members.lock().unwrap().push(job.member_ref());
        tracing::debug!(job_id = %job.id(), "job attached to transaction");
        Ok(())
    }

    /// Number of members that have not yet been finalized.
    pub fn len(&self) -> usize {
        self.inner.members.lock().unwrap().len()
    }

    /// Whether the transaction currently has no unfinalized members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a member whose completion is being finalized and, if its
    /// outcome is not success, cancel every remaining member.
    ///
    /// Called exactly once per member, from completion dispatch, before
    /// the member's completion callback fires. Iteration order over the
    /// remaining members is unspecified; cancellation is commutative.
    pub(crate) fn conclude_member(&self, job: &Job, outcome: JobOutcome) {
        let target = job.member_ref();
        let siblings: Vec<Job> = {
            let mut members = self.inner.members.lock().unwrap();
            members.retain(|member| !member.ptr_eq(&target));
            if outcome.is_success() {
                return;
            }
            members.iter().filter_map(Job::from_member_ref).collect()
        };
        if !siblings.is_empty() {
            tracing::debug!(
                job_id = %job.id(),
                %outcome,
                siblings = siblings.len(),
                "cancelling remaining transaction members"
            );
        }
        for sibling in siblings {
            sibling.cancel(false);
        }
    }
}

impl Default for JobTxn {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTxn")
            .field("members", &self.len())
            .finish()
    }
}
