//! Ambient resource accounting (`spec.md` §9 ambient stack).
//!
//! Grounded on `ouros::resource`'s `ResourceTracker`/`ResourceError`, scaled
//! down to the limits a tree-walking evaluator actually needs: call-stack
//! depth (in place of the VM's recursion-depth check) and wall-clock time.
//! There is no allocation counter here since there is no bytecode
//! allocation instruction to hook — `Rc`-based values make "allocation" a
//! much fuzzier concept than in an arena-backed heap.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_call_depth: usize,
    pub max_duration: Option<Duration>,
}

impl ResourceLimits {
    pub const fn unlimited() -> Self {
        Self {
            max_call_depth: usize::MAX,
            max_duration: None,
        }
    }

    pub const fn sandboxed() -> Self {
        Self {
            max_call_depth: 512,
            max_duration: Some(Duration::from_secs(10)),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::sandboxed()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ResourceError {
    CallDepth { limit: usize },
    Time { limit: Duration, elapsed: Duration },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallDepth { limit } => write!(f, "maximum call depth of {limit} exceeded"),
            Self::Time { limit, elapsed } => write!(f, "time limit exceeded: {elapsed:?} > {limit:?}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Tracks resource usage for one evaluation session.
#[derive(Debug)]
pub(crate) struct ResourceTracker {
    limits: ResourceLimits,
    started: Instant,
}

impl ResourceTracker {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            started: Instant::now(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(ResourceLimits::unlimited())
    }

    pub fn max_call_depth(&self) -> usize {
        self.limits.max_call_depth
    }

    pub fn check_time(&self) -> Result<(), ResourceError> {
        if let Some(limit) = self.limits.max_duration {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(ResourceError::Time { limit, elapsed });
            }
        }
        Ok(())
    }
}
