//! Tasks and channels (`spec.md` §4.6, §5).
//!
//! Scheduling is single-threaded and cooperative, mirroring `ouros::asyncio`
//! (whose coroutines/futures are driven by a host-owned event loop rather
//! than an OS thread pool). There is no bytecode VM here to suspend
//! mid-instruction, so a "suspended" task is not a paused continuation but a
//! queued one: `task` enqueues a `PendingTask` instead of running it, and a
//! suspension point (`sleep`, channel `send`/`receive` on an empty channel,
//! or a loop's auto-yield) drains the queue, running each pending task's
//! body to completion before resuming. That gives genuine interleaving
//! *between* tasks at a suspension point, though not a true mid-body pause
//! within one.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::CodeData;
use crate::scope::ScopeRef;
use crate::value::Value;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(u64);

/// Shared state for a spawned task: whether it has finished, its result,
/// and whether it has been asked to cancel (`spec.md` §4.6 Cancellation).
#[derive(Debug)]
pub(crate) struct TaskState {
    pub id: TaskId,
    pub done: bool,
    pub cancelled: bool,
    pub result: Option<Result<Value, crate::error::SlipError>>,
}

pub(crate) type TaskHandleRef = Rc<RefCell<TaskState>>;

pub(crate) fn new_task_handle() -> TaskHandleRef {
    let id = TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed));
    Rc::new(RefCell::new(TaskState {
        id,
        done: false,
        cancelled: false,
        result: None,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChannelId(u64);

/// An unbounded FIFO channel. `send` never blocks; `receive` suspends (at
/// the scheduler level) until a value is available (`spec.md` §4.6
/// Channels).
#[derive(Debug)]
pub(crate) struct ChannelState {
    pub id: ChannelId,
    pub queue: VecDeque<Value>,
    pub closed: bool,
}

pub(crate) type ChannelRef = Rc<RefCell<ChannelState>>;

pub(crate) fn new_channel() -> ChannelRef {
    let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
    Rc::new(RefCell::new(ChannelState {
        id,
        queue: VecDeque::new(),
        closed: false,
    }))
}

pub(crate) fn channel_send(channel: &ChannelRef, value: Value) {
    channel.borrow_mut().queue.push_back(value);
}

pub(crate) fn channel_try_receive(channel: &ChannelRef) -> Option<Value> {
    channel.borrow_mut().queue.pop_front()
}

/// A `task` call that hasn't run yet: its body and the child scope it
/// closes over, queued until a suspension point drains it.
#[derive(Debug)]
pub(crate) struct PendingTask {
    pub handle: TaskHandleRef,
    pub code: Rc<CodeData>,
    pub scope: ScopeRef,
}

/// Registry the host drains to observe/cancel spawned tasks
/// (`spec.md` §4.6 Cancellation: "`cancel-tasks` on a host cancels all
/// registered tasks"), and that suspension points drain to run queued task
/// bodies.
#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    tasks: RefCell<Vec<TaskHandleRef>>,
    pending: RefCell<VecDeque<PendingTask>>,
}

impl TaskRegistry {
    pub fn register(&self, handle: TaskHandleRef) {
        self.tasks.borrow_mut().push(handle);
    }

    /// Queues a task's body for later execution, registering its handle so
    /// `cancel-tasks`/`active_count` see it immediately even before it runs.
    pub fn enqueue(&self, task: PendingTask) {
        self.register(Rc::clone(&task.handle));
        self.pending.borrow_mut().push_back(task);
    }

    /// Pops the next queued task, if any, for a suspension point to drive.
    pub fn pop_ready(&self) -> Option<PendingTask> {
        self.pending.borrow_mut().pop_front()
    }

    pub fn cancel_all(&self) {
        for task in self.tasks.borrow().iter() {
            task.borrow_mut().cancelled = true;
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.borrow().iter().filter(|t| !t.borrow().done).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_preserves_fifo_order() {
        let ch = new_channel();
        for i in 0..5 {
            channel_send(&ch, Value::Int(i));
        }
        let mut out = vec![];
        while let Some(v) = channel_try_receive(&ch) {
            out.push(v);
        }
        assert_eq!(out.len(), 5);
        let Value::Int(first) = out[0] else { panic!() };
        assert_eq!(first, 0);
    }
}
