use std::sync::Arc;

use super::call::Call;
use super::context::Context;
use super::descriptor::MethodDescriptor;

/// A communication line to a service which can be used to call that service's methods. The
/// service may be running in this process or on another machine.
///
/// Normally a channel is not called directly but wrapped in a generated stub:
///
/// ```ignore
/// let client = EchoClient::from_registry(channel, runtime.registry()).unwrap();
/// let resp = client.echo(ctx.clone(), request.clone()).await?;
/// let call = client.async_echo(ctx, request);
/// call.done().await;
/// ```
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Channel: Send + Sync {
    /// Invokes `method` asynchronously and returns the call representing the invocation
    /// without waiting for it. The call is completed by the channel, successfully with the
    /// response installed or with an error.
    ///
    /// This is called by many tasks concurrently.
    fn go<Req, Resp>(
        &self,
        method: &Arc<MethodDescriptor>,
        ctx: Context,
        request: Req,
        response: Resp,
    ) -> Call<Req, Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static;
}
