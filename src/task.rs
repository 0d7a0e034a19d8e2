//! Tasks: a unit of work that owns a root scope.
//!
//! A [`Task`] opens its root scope when it begins and is finished once that
//! scope has been popped and every record submitted under it has settled.
//! Work is submitted to the innermost open scope, so a task may open nested
//! scopes of its own between `begin` and `finish`.

use crate::error::{Error, Result};
use crate::op::{Completion, OpCode, OpFlags};
use crate::port::CompletionPort;
use crate::tracing_compat::debug;
use crate::types::{OpId, ScopeId, TaskId};
use std::time::Duration;

/// A task bound to one port.
#[derive(Debug)]
#[must_use = "a task must be finished to release its root scope"]
pub struct Task {
    id: TaskId,
    root: ScopeId,
}

impl Task {
    /// Opens the task's root scope on `port`.
    pub fn begin(
        port: &mut CompletionPort,
        sequential: bool,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let root = port.push_scope(sequential, timeout)?;
        let id = TaskId::next();
        debug!(task = %id, scope = %root, "task started");
        Ok(Self { id, root })
    }

    /// The task's identity.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The root scope.
    #[must_use]
    pub const fn root(&self) -> ScopeId {
        self.root
    }

    /// Submits to the innermost scope, which must be the root or nested in it.
    pub fn submit(
        &self,
        port: &mut CompletionPort,
        opcode: OpCode,
        flags: OpFlags,
        token: u64,
    ) -> Result<OpId> {
        self.check_open(port)?;
        port.submit(opcode, flags, token)
    }

    /// True once nothing submitted directly under the root is outstanding and
    /// no nested scope remains open.
    pub fn is_settled(&self, port: &CompletionPort) -> Result<bool> {
        let outstanding = port.outstanding(self.root)?;
        Ok(outstanding == 0 && port.top_scope() == Some(self.root))
    }

    /// Drains `port` once on behalf of the task.
    pub fn drive(&self, port: &mut CompletionPort, max_wait: Option<Duration>) -> Vec<Completion> {
        port.drain(max_wait)
    }

    /// Waits up to `max_wait` for the root's records to settle, then pops the
    /// root, cancelling whatever is still in flight.
    ///
    /// Returns every completion drained along the way, including those of
    /// other scopes on the port. Fails with `InvalidArgument` while a nested
    /// scope is still open.
    pub fn finish(
        self,
        port: &mut CompletionPort,
        max_wait: Option<Duration>,
    ) -> Result<Vec<Completion>> {
        if port.top_scope() != Some(self.root) {
            return Err(Error::invalid("task has nested scopes still open").with_scope(self.root));
        }
        let limit = max_wait.map(|wait| port.now().saturating_add(wait));
        let mut delivered = Vec::new();
        while port.outstanding(self.root)? > 0 {
            let remaining = match limit {
                Some(limit) => {
                    let now = port.now();
                    if now >= limit {
                        break;
                    }
                    Some(Duration::from_nanos(limit.duration_since(now)))
                }
                None => None,
            };
            delivered.extend(port.drain(remaining));
        }

        port.pop_scope(self.root)?;
        loop {
            let batch = port.drain(Some(Duration::ZERO));
            if batch.is_empty() {
                break;
            }
            delivered.extend(batch);
        }
        debug!(
            task = %self.id,
            scope = %self.root,
            delivered = delivered.len(),
            at = %port.now(),
            "task finished"
        );
        Ok(delivered)
    }

    fn check_open(&self, port: &CompletionPort) -> Result<()> {
        port.outstanding(self.root)
            .map(|_| ())
            .map_err(|_| Error::invalid("task root scope is closed").with_scope(self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{lab_port, LabPort};
    use crate::types::Status;
    use crate::{assert_status, test_complete, test_phase};

    #[test]
    fn finish_waits_for_outstanding_work() {
        test_phase!("finish_waits_for_outstanding_work");
        let LabPort {
            mut port, reactor, ..
        } = lab_port(8);
        reactor.script(1, Duration::from_millis(5), Status::from_raw(10));
        reactor.script(2, Duration::from_millis(15), Status::from_raw(20));

        let task = Task::begin(&mut port, false, Some(Duration::from_millis(100))).expect("begin");
        task.submit(&mut port, OpCode::Recv, OpFlags::NONE, 1)
            .expect("submit");
        task.submit(&mut port, OpCode::Recv, OpFlags::NONE, 2)
            .expect("submit");

        let done = task.finish(&mut port, None).expect("finish");
        let tokens: Vec<u64> = done.iter().map(|c| c.token).collect();
        assert_eq!(tokens, vec![1, 2]);
        assert!(done.iter().all(|c| c.status.is_success()));
        assert_eq!(port.scope_depth(), 0);
        test_complete!("finish_waits_for_outstanding_work");
    }

    #[test]
    fn finish_with_bound_cancels_stragglers() {
        let LabPort { mut port, .. } = lab_port(4);
        let task = Task::begin(&mut port, false, None).expect("begin");
        task.submit(&mut port, OpCode::Poll, OpFlags::NONE, 7)
            .expect("submit");

        let done = task
            .finish(&mut port, Some(Duration::from_millis(10)))
            .expect("finish");
        assert_eq!(done.len(), 1);
        assert_status!(done[0], cancelled);
        assert_eq!(port.now(), crate::types::Time::from_millis(10));
    }

    #[test]
    fn finish_rejects_open_nested_scope() {
        let LabPort { mut port, .. } = lab_port(4);
        let task = Task::begin(&mut port, true, None).expect("begin");
        let nested = port.push_scope(false, None).expect("nested");
        assert!(!task.is_settled(&port).expect("live"));

        let root = task.root();
        let err = task.finish(&mut port, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        port.pop_scope(nested).expect("pop nested");
        port.pop_scope(root).expect("pop root");
    }

    #[test]
    fn submit_after_root_popped_is_rejected() {
        let LabPort { mut port, .. } = lab_port(4);
        let task = Task::begin(&mut port, false, None).expect("begin");
        port.pop_scope(task.root()).expect("pop");
        let err = task
            .submit(&mut port, OpCode::Nop, OpFlags::NONE, 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
