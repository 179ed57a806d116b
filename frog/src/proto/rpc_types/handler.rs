//! Traits for exposing a service implementation to the binder.
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;

use super::__rt;
use super::context::Context;
use super::error::Result;

/// A service implementation that can be bound to a service descriptor.
///
/// Generated server glue implements this by listing one [`MethodHandler`] per method of the
/// service trait; binding then checks the list against the descriptor.
pub trait ServiceImpl: Send + Sync + 'static {
    fn exposed_methods(self: Arc<Self>) -> Vec<MethodHandler>;
}

/// Type erased form of one method: decode the request, run the implementation, encode the
/// response.
#[async_trait::async_trait]
pub(crate) trait RawMethod: Send + Sync + 'static {
    async fn call(&self, ctx: Context, input: Bytes) -> Result<Bytes>;
}

struct TypedMethod<S, Req, Resp, F> {
    service: Arc<S>,
    f: F,
    _phan: PhantomData<fn(Req) -> Resp>,
}

#[async_trait::async_trait]
impl<S, Req, Resp, F, Fut> RawMethod for TypedMethod<S, Req, Resp, F>
where
    S: Send + Sync + 'static,
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + 'static,
    F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    async fn call(&self, ctx: Context, input: Bytes) -> Result<Bytes> {
        let request: Req = __rt::decode(input)?;
        let response = (self.f)(self.service.clone(), ctx, request).await?;
        __rt::encode(response)
    }
}

/// One method exposed by a service implementation: its name, the full protobuf names of its
/// message types and an invocable handle bound to the implementation instance.
#[derive(Clone)]
pub struct MethodHandler {
    name: String,
    request_type: String,
    response_type: String,
    method: Arc<dyn RawMethod>,
}

impl MethodHandler {
    pub fn new<S, Req, Resp, F, Fut>(name: impl Into<String>, service: Arc<S>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        Req: prost::Message + prost::Name + Default + 'static,
        Resp: prost::Message + prost::Name + 'static,
        F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
    {
        Self {
            name: name.into(),
            request_type: Req::full_name(),
            response_type: Resp::full_name(),
            method: Arc::new(TypedMethod {
                service,
                f,
                _phan: PhantomData,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    pub(crate) async fn call(&self, ctx: Context, input: Bytes) -> Result<Bytes> {
        self.method.call(ctx, input).await
    }
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandler")
            .field("name", &self.name)
            .field("request_type", &self.request_type)
            .field("response_type", &self.response_type)
            .finish()
    }
}
