use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-invocation state handed to the channel and on to the method implementation.
///
/// A context may carry a deadline and always carries a cancellation token. Clones share the
/// token, so cancelling any clone cancels them all; [`Context::child`] derives a token that is
/// cancelled with its parent but can also be cancelled on its own.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    trace_id: i32,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
            trace_id: 0,
        }
    }
}

impl Context {
    /// A context without deadline; the channel's default timeout applies.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::default().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::default().deadline_at(deadline)
    }

    /// Sets the deadline to `timeout` from now. A timeout too large to represent leaves the
    /// context as is.
    pub fn timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline_at(deadline),
            None => self,
        }
    }

    /// Sets the deadline, keeping an earlier one if already present.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(cur) if cur < deadline => cur,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn trace_id(&self) -> i32 {
        self.trace_id
    }

    pub fn set_trace_id(&mut self, trace_id: i32) {
        self.trace_id = trace_id;
    }

    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
            trace_id: self.trace_id,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context has been cancelled. Deadlines do not trigger it, the
    /// channel races the deadline separately.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
