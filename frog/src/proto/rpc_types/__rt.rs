//! Utility functions used by generated code; this is *not* part of the crate's public API!
use std::sync::Arc;

use bytes;
use prost;

use super::call::Call;
use super::channel::Channel;
use super::context::Context;
use super::descriptor::ServiceDescriptor;
use super::error;

/// Efficiently decode a particular message type from a byte buffer.
pub fn decode<M>(buf: bytes::Bytes) -> error::Result<M>
where
    M: prost::Message + Default,
{
    let message = prost::Message::decode(buf)?;
    Ok(message)
}

/// Efficiently encode a particular message into a byte buffer.
pub fn encode<M>(message: M) -> error::Result<bytes::Bytes>
where
    M: prost::Message,
{
    encode_ref(&message)
}

/// Same as [`encode`] without taking ownership of the message.
pub fn encode_ref<M>(message: &M) -> error::Result<bytes::Bytes>
where
    M: prost::Message,
{
    let len = prost::Message::encoded_len(message);
    let mut buf = ::bytes::BytesMut::with_capacity(len);
    prost::Message::encode(message, &mut buf)?;
    Ok(buf.freeze())
}

/// The client half every generated stub wraps: a channel plus the descriptor of the service it
/// talks to. Methods are addressed by declaration index.
#[derive(Debug, Clone)]
pub struct Stub<C> {
    channel: C,
    service: Arc<ServiceDescriptor>,
}

impl<C: Channel> Stub<C> {
    pub fn new(channel: C, service: Arc<ServiceDescriptor>) -> Self {
        Self { channel, service }
    }

    pub fn service(&self) -> &Arc<ServiceDescriptor> {
        &self.service
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Synchronous flavour: starts the call and waits for it, returning the response.
    pub async fn call<Req, Resp>(
        &self,
        method_index: usize,
        ctx: Context,
        request: Req,
    ) -> error::Result<Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let call = self.go::<Req, Resp>(method_index, ctx, request);
        call.wait().await?;
        Ok(call.take_response())
    }

    /// Asynchronous flavour: returns the call immediately.
    pub fn go<Req, Resp>(&self, method_index: usize, ctx: Context, request: Req) -> Call<Req, Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        match self.service.method(method_index) {
            Some(method) => self.channel.go(method, ctx, request, Resp::default()),
            None => Call::failed(
                request,
                Resp::default(),
                error::Error::MethodNotFound(format!(
                    "{}[{}]",
                    self.service.full_name(),
                    method_index
                )),
            ),
        }
    }
}
