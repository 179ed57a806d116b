use bytes::Bytes;
use dashmap::DashMap;

use crate::proto::rpc_types;
use crate::proto::rpc_types::context::Context;
use crate::proto::rpc_types::descriptor::MethodDescriptor;

use super::binder::{BoundMethod, MethodTable};

/// The per-process method table, keyed by method full name.
pub struct Dispatcher {
    table: DashMap<String, BoundMethod>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Adds every method of `table`. Methods bound earlier under the same name are replaced.
    pub fn register_methods(&self, table: MethodTable) -> rpc_types::error::Result<()> {
        let service = table.service().to_string();
        for method in table {
            let key = method.name();
            if self.table.insert(key.clone(), method).is_some() {
                tracing::warn!(%service, method = %key, "method registered twice, replacing");
            }
        }
        Ok(())
    }

    /// A methods register callback that fills this dispatcher.
    pub fn methods_register(
        &self,
    ) -> impl FnOnce(MethodTable) -> rpc_types::error::Result<()> + '_ {
        move |table| self.register_methods(table)
    }

    pub fn lookup(&self, method: &MethodDescriptor) -> Option<BoundMethod> {
        self.table.get(&method.full_name()).map(|m| m.clone())
    }

    /// Invokes a bound method with an encoded request. The implementation's error is
    /// returned as is.
    pub async fn invoke(
        bound: &BoundMethod,
        ctx: Context,
        input: Bytes,
    ) -> rpc_types::error::Result<Bytes> {
        bound.handler().call(ctx, input).await
    }

    /// Invokes a bound method against typed request and response messages. On success the
    /// response buffer holds the implementation's response.
    pub async fn invoke_typed<Req, Resp>(
        bound: &BoundMethod,
        ctx: Context,
        request: &Req,
        response: &mut Resp,
    ) -> rpc_types::error::Result<()>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let input = rpc_types::__rt::encode_ref(request)?;
        let output = Self::invoke(bound, ctx, input).await?;
        *response = rpc_types::__rt::decode(output)?;
        Ok(())
    }

    /// Looks `method` up and invokes it.
    pub async fn call_method(
        &self,
        method: &MethodDescriptor,
        ctx: Context,
        input: Bytes,
    ) -> rpc_types::error::Result<Bytes> {
        let bound = self
            .lookup(method)
            .ok_or_else(|| rpc_types::error::Error::MethodNotFound(method.full_name()))?;
        Self::invoke(&bound, ctx, input).await
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
