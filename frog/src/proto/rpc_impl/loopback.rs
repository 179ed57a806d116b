use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::common::config::RuntimeConfig;
use crate::proto::rpc_types::call::Call;
use crate::proto::rpc_types::channel::Channel;
use crate::proto::rpc_types::context::Context;
use crate::proto::rpc_types::descriptor::MethodDescriptor;
use crate::proto::rpc_types::error::Error;

use super::dispatcher::Dispatcher;

struct InflightGuard(Arc<AtomicUsize>);

impl InflightGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A channel that dispatches calls to methods bound in the local [`Dispatcher`].
///
/// Each call runs on its own task. A second task races the call against its deadline and
/// the context's cancellation; whichever finishes first completes the call. A dispatch that
/// loses the race is not aborted, it is asked to stop through its context and its result is
/// dropped.
///
/// Tasks are spawned on the runtime the channel was created in, or the one given to
/// [`with_handle`](LoopbackChannel::with_handle), so `go` also works from threads outside
/// any runtime.
#[derive(Clone)]
pub struct LoopbackChannel {
    dispatcher: Arc<Dispatcher>,
    default_timeout: Duration,
    latency: Option<Duration>,
    inflight: Arc<AtomicUsize>,
    handle: Option<Handle>,
}

impl std::fmt::Debug for LoopbackChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackChannel")
            .field("methods", &self.dispatcher.len())
            .field("default_timeout", &self.default_timeout)
            .field("latency", &self.latency)
            .field("inflight", &self.inflight_count())
            .finish()
    }
}

impl LoopbackChannel {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &RuntimeConfig) -> Self {
        Self {
            dispatcher,
            default_timeout: config.default_timeout(),
            latency: config.simulated_latency(),
            inflight: Arc::new(AtomicUsize::new(0)),
            handle: Handle::try_current().ok(),
        }
    }

    /// Spawns dispatch and supervisory tasks on `handle`.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of dispatch tasks that have not finished yet, including ones whose call already
    /// timed out.
    pub fn inflight_count(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }
}

impl Channel for LoopbackChannel {
    fn go<Req, Resp>(
        &self,
        method: &Arc<MethodDescriptor>,
        ctx: Context,
        request: Req,
        response: Resp,
    ) -> Call<Req, Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let Some(bound) = self.dispatcher.lookup(method) else {
            tracing::debug!(method = %method.full_name(), "no bound method");
            return Call::failed(
                request,
                response,
                Error::MethodNotFound(method.full_name()),
            );
        };

        let Some(handle) = self.handle.clone().or_else(|| Handle::try_current().ok()) else {
            tracing::error!(method = %method.full_name(), "no tokio runtime to dispatch on");
            return Call::failed(request, response, Error::Shutdown);
        };

        let start = Instant::now();
        // a default timeout too large to represent means no deadline
        let deadline = ctx
            .deadline()
            .or_else(|| start.checked_add(self.default_timeout));
        let call = Call::new(request, response);
        let dispatch_ctx = ctx.child();

        let guard = InflightGuard::new(self.inflight.clone());
        let latency = self.latency;
        let dispatch_call = call.clone();
        let task_ctx = dispatch_ctx.clone();
        handle.spawn(async move {
            let _guard = guard;
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
                if dispatch_call.is_done() {
                    tracing::debug!(method = %bound.name(), "call finished before dispatch, skipped");
                    return;
                }
            }

            let mut resp = Resp::default();
            let ret = Dispatcher::invoke_typed(
                &bound,
                task_ctx.clone(),
                dispatch_call.request(),
                &mut resp,
            )
            .await;
            let won = match ret {
                // a caller cancellation wins over whatever the method returned
                _ if task_ctx.is_cancelled() => dispatch_call.close(Some(Error::Cancelled)),
                Ok(()) => dispatch_call.complete(resp),
                Err(err) => {
                    tracing::debug!(method = %bound.name(), ?err, "method returned error");
                    dispatch_call.close(Some(err))
                }
            };
            if !won {
                tracing::debug!(
                    method = %bound.name(),
                    elapsed = ?start.elapsed(),
                    "late completion discarded"
                );
            }
        });

        let done = call.done();
        let watched = call.clone();
        let method_name = method.full_name();
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = done => {}
                _ = expired => {
                    let budget = deadline
                        .map(|d| d.saturating_duration_since(start))
                        .unwrap_or_default();
                    if watched.close(Some(Error::Timeout(budget))) {
                        tracing::info!(method = %method_name, ?budget, "call timed out");
                        dispatch_ctx.cancel();
                    }
                }
                _ = ctx.cancelled() => {
                    if watched.close(Some(Error::Cancelled)) {
                        tracing::debug!(method = %method_name, "call cancelled");
                        dispatch_ctx.cancel();
                    }
                }
            }
        });

        call
    }
}
