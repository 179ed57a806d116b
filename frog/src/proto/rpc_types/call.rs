//! One-shot completion handle shared between the invoking stub and the channel.
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::error::{Error, Result};

struct CallState<Resp> {
    response: Resp,
    error: Option<Error>,
    has_done: bool,
}

struct CallInner<Req, Resp> {
    request: Req,
    state: Mutex<CallState<Resp>>,
    done: watch::Sender<bool>,
}

/// An RPC call: request, response buffer, terminal error and a completion signal.
///
/// A call is pending until the first [`close`](Call::close) or [`complete`](Call::complete);
/// that first completion fixes the outcome and wakes every waiter, later completions are
/// ignored. Clones share the same call.
pub struct Call<Req, Resp> {
    inner: Arc<CallInner<Req, Resp>>,
}

impl<Req, Resp> Clone for Call<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Req, Resp> Call<Req, Resp> {
    pub fn new(request: Req, response: Resp) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            inner: Arc::new(CallInner {
                request,
                state: Mutex::new(CallState {
                    response,
                    error: None,
                    has_done: false,
                }),
                done,
            }),
        }
    }

    /// A call that is already completed with `err`.
    pub fn failed(request: Req, response: Resp, err: Error) -> Self {
        let call = Self::new(request, response);
        call.close(Some(err));
        call
    }

    /// The request of the call.
    pub fn request(&self) -> &Req {
        &self.inner.request
    }

    /// After completion, the error status. `None` while pending or on success.
    pub fn error(&self) -> Option<Error> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_done(&self) -> bool {
        *self.inner.done.borrow()
    }

    /// Completes the call with `err` (`None` meaning success). Only the first completion has
    /// an effect; returns whether this one did.
    pub fn close(&self, err: Option<Error>) -> bool {
        self.finish(|state| state.error = err)
    }

    /// Completes the call successfully, installing `response` as the response buffer.
    pub fn complete(&self, response: Resp) -> bool {
        self.finish(|state| {
            state.response = response;
            state.error = None;
        })
    }

    fn finish(&self, apply: impl FnOnce(&mut CallState<Resp>)) -> bool {
        let mut state = self.inner.state.lock();
        if state.has_done {
            return false;
        }
        apply(&mut state);
        state.has_done = true;
        // raised under the lock, waiters never see a half applied completion
        self.inner.done.send_replace(true);
        true
    }

    /// Strobes when the call is complete. The future does not borrow the call, so it can be
    /// moved into `select!` arms or other tasks.
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.done.subscribe();
        async move {
            // the sender lives as long as the call, an error means nobody can complete it
            let _ = rx.wait_for(|done| *done).await;
        }
    }

    /// Waits for completion and returns the terminal status.
    pub async fn wait(&self) -> Result<()> {
        self.done().await;
        self.status()
    }

    /// Blocking flavour of [`wait`](Call::wait) for synchronous callers. Must not be called
    /// from inside an async task.
    pub fn wait_blocking(&self) -> Result<()> {
        futures::executor::block_on(self.done());
        self.status()
    }

    fn status(&self) -> Result<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<Req, Resp: Clone> Call<Req, Resp> {
    /// A copy of the response buffer. Only meaningful once the call is done.
    pub fn response(&self) -> Resp {
        self.inner.state.lock().response.clone()
    }
}

impl<Req, Resp: Default> Call<Req, Resp> {
    /// Moves the response out, leaving a default value behind.
    pub fn take_response(&self) -> Resp {
        std::mem::take(&mut self.inner.state.lock().response)
    }
}

impl<Req: fmt::Debug, Resp: fmt::Debug> fmt::Debug for Call<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Call")
            .field("request", &self.inner.request)
            .field("response", &state.response)
            .field("error", &state.error)
            .field("done", &state.has_done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn first_close_wins() {
        let call = Call::new(1u32, 0u32);
        assert!(!call.is_done());
        assert!(call.error().is_none());

        assert!(call.close(Some(Error::Cancelled)));
        assert!(!call.close(Some(Error::Timeout(Duration::from_secs(1)))));
        assert!(!call.close(None));
        assert!(!call.complete(7));

        assert!(call.is_done());
        assert!(matches!(call.error(), Some(Error::Cancelled)));
        assert_eq!(call.response(), 0);
    }

    #[test]
    fn complete_installs_response() {
        let call = Call::new("ping", String::new());
        assert!(call.complete("pong".to_string()));
        assert!(!call.close(Some(Error::Cancelled)));
        assert!(call.wait_blocking().is_ok());
        assert_eq!(call.take_response(), "pong");
        assert_eq!(call.response(), "");
        assert_eq!(*call.request(), "ping");
    }

    #[test]
    fn response_and_error_in_one_expression() {
        let call = Call::new((), String::new());
        call.complete("pong".to_string());
        let (resp, err) = (call.response(), call.error());
        assert_eq!(resp, "pong");
        assert!(err.is_none());

        let failed = Call::failed((), String::new(), Error::Cancelled);
        let (resp, err, done) = (failed.response(), failed.error(), failed.is_done());
        assert!(resp.is_empty() && done);
        assert!(matches!(err, Some(Error::Cancelled)));
    }

    #[test]
    fn failed_call_is_done() {
        let call = Call::failed((), (), Error::MethodNotFound("a.B.C".to_string()));
        assert!(call.is_done());
        assert!(matches!(
            call.wait_blocking(),
            Err(Error::MethodNotFound(m)) if m == "a.B.C"
        ));
    }

    #[tokio::test]
    async fn all_waiters_wake_once() {
        let call = Call::new((), ());
        let mut waiters = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let call = call.clone();
            waiters.spawn(async move { call.wait().await });
        }
        tokio::task::yield_now().await;
        assert!(waiters.try_join_next().is_none());

        call.close(Some(Error::Shutdown));
        while let Some(ret) = waiters.join_next().await {
            assert!(matches!(ret.unwrap(), Err(Error::Shutdown)));
        }

        // late waiters do not block
        call.done().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_completers_agree() {
        for round in 0..200 {
            let call = Call::new((), 0u32);
            let a = call.clone();
            let b = call.clone();
            let winner_a = tokio::spawn(async move { a.complete(round) });
            let winner_b =
                tokio::spawn(async move { b.close(Some(Error::Timeout(Duration::ZERO))) });
            let (won_a, won_b) = (winner_a.await.unwrap(), winner_b.await.unwrap());
            assert!(won_a ^ won_b, "exactly one completer must win");

            let observed = call.wait().await;
            if won_a {
                assert!(observed.is_ok());
                assert_eq!(call.response(), round);
            } else {
                assert!(matches!(observed, Err(Error::Timeout(_))));
                assert_eq!(call.response(), 0);
            }
        }
    }
}
