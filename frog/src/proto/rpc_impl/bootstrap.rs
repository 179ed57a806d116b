//! Process startup: load descriptors, bind implementations, then freeze both tables.
use std::sync::Arc;

use crate::common::config::RuntimeConfig;
use crate::proto::rpc_types::error::ConfigError;
use crate::proto::rpc_types::handler::ServiceImpl;

use super::binder;
use super::descriptor_registry::DescriptorRegistry;
use super::dispatcher::Dispatcher;
use super::loopback::LoopbackChannel;

/// Unwraps a startup result. A configuration error means the schema and the code disagree,
/// there is nothing sensible to run, so it is logged and the process halts.
pub fn expect_startup<T>(ret: Result<T, ConfigError>) -> T {
    match ret {
        Ok(v) => v,
        Err(err) => {
            tracing::error!(%err, "fatal configuration error");
            panic!("fatal configuration error: {}", err);
        }
    }
}

/// Mutable startup phase. Descriptors are loaded and services registered here; [`finish`]
/// turns the result into a shareable [`Runtime`].
///
/// [`finish`]: Bootstrap::finish
#[derive(Default)]
pub struct Bootstrap {
    registry: DescriptorRegistry,
    dispatcher: Dispatcher,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a gzip-compressed file descriptor.
    pub fn load_descriptor(&mut self, blob: &[u8]) -> Result<Vec<String>, ConfigError> {
        self.registry.load(blob)
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    /// Binds `service` against the descriptor registered as `desc_name` and adds its methods
    /// to the dispatcher.
    pub fn register_service<S: ServiceImpl>(
        &mut self,
        desc_name: &str,
        service: Arc<S>,
    ) -> Result<(), ConfigError> {
        let desc = self
            .registry
            .lookup(desc_name)
            .ok_or_else(|| ConfigError::UnknownService(desc_name.to_string()))?;
        binder::register_service(&desc, service, self.dispatcher.methods_register())
    }

    pub fn finish(self) -> Runtime {
        tracing::info!(
            services = self.registry.len(),
            methods = self.dispatcher.len(),
            "rpc runtime ready"
        );
        Runtime {
            registry: Arc::new(self.registry),
            dispatcher: Arc::new(self.dispatcher),
        }
    }
}

/// The frozen descriptor registry and dispatcher, shared by every channel of the process.
#[derive(Clone)]
pub struct Runtime {
    registry: Arc<DescriptorRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl Runtime {
    pub fn registry(&self) -> &Arc<DescriptorRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn loopback_channel(&self, config: &RuntimeConfig) -> LoopbackChannel {
        LoopbackChannel::new(self.dispatcher.clone(), config)
    }
}
