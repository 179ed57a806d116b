use std::collections::HashMap;
use std::sync::Arc;

use crate::proto::rpc_types::descriptor::{normalize_type_name, MethodDescriptor, ServiceDescriptor};
use crate::proto::rpc_types::error::{ConfigError, Result};
use crate::proto::rpc_types::handler::{MethodHandler, ServiceImpl};

/// A method descriptor paired with the implementation handler validated against it.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    desc: Arc<MethodDescriptor>,
    handler: MethodHandler,
}

impl BoundMethod {
    pub fn descriptor(&self) -> &Arc<MethodDescriptor> {
        &self.desc
    }

    pub fn handler(&self) -> &MethodHandler {
        &self.handler
    }

    /// Returns method name which format is "package.Service.Method".
    pub fn name(&self) -> String {
        self.desc.full_name()
    }
}

/// The bound methods of one service, by method name.
#[derive(Debug, Default)]
pub struct MethodTable {
    service: String,
    methods: HashMap<String, BoundMethod>,
}

impl MethodTable {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn get(&self, method: &str) -> Option<&BoundMethod> {
        self.methods.get(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundMethod> {
        self.methods.values()
    }
}

impl IntoIterator for MethodTable {
    type Item = BoundMethod;
    type IntoIter = std::collections::hash_map::IntoValues<String, BoundMethod>;

    fn into_iter(self) -> Self::IntoIter {
        self.methods.into_values()
    }
}

/// Validates the methods `service` exposes against `descriptor`.
///
/// Every exposed method whose name matches a declared one must use exactly the declared
/// request and response types. Exposed methods the service does not declare are skipped.
/// Every declared method must end up bound.
pub fn bind<S: ServiceImpl>(
    descriptor: &Arc<ServiceDescriptor>,
    service: Arc<S>,
) -> std::result::Result<MethodTable, ConfigError> {
    let service_name = descriptor.full_name();
    let mut methods = HashMap::with_capacity(descriptor.num_methods());

    for handler in service.exposed_methods() {
        let Some(desc) = descriptor.method_by_name(handler.name()) else {
            tracing::debug!(
                service = %service_name,
                method = handler.name(),
                "exposed method not declared by service, ignored"
            );
            continue;
        };

        check_type(&service_name, desc, "request", handler.request_type(), desc.input_type())?;
        check_type(
            &service_name,
            desc,
            "response",
            handler.response_type(),
            desc.output_type(),
        )?;

        if methods.contains_key(desc.name()) {
            return Err(ConfigError::DuplicateHandler {
                service: service_name,
                method: desc.name().to_string(),
            });
        }
        methods.insert(
            desc.name().to_string(),
            BoundMethod {
                desc: desc.clone(),
                handler,
            },
        );
    }

    // method's number must equal the declared number
    if methods.len() != descriptor.num_methods() {
        let missing = descriptor
            .methods()
            .iter()
            .filter(|m| !methods.contains_key(m.name()))
            .map(|m| m.name().to_string())
            .collect();
        return Err(ConfigError::MethodCountMismatch {
            service: service_name,
            declared: descriptor.num_methods(),
            bound: methods.len(),
            missing,
        });
    }

    tracing::debug!(service = %service_name, methods = methods.len(), "service bound");
    Ok(MethodTable {
        service: service_name,
        methods,
    })
}

fn check_type(
    service: &str,
    desc: &MethodDescriptor,
    what: &str,
    exposed: &str,
    declared: &str,
) -> std::result::Result<(), ConfigError> {
    if normalize_type_name(exposed) == normalize_type_name(declared) {
        return Ok(());
    }
    Err(ConfigError::SignatureMismatch {
        service: service.to_string(),
        method: desc.name().to_string(),
        reason: format!(
            "{} type is {}, descriptor declares {}",
            what,
            exposed,
            normalize_type_name(declared)
        ),
    })
}

/// Binds `service` and hands the resulting table to `register`, the methods register callback.
/// Called from generated registration glue, usually with
/// [`Dispatcher::methods_register`](super::Dispatcher::methods_register).
pub fn register_service<S: ServiceImpl>(
    descriptor: &Arc<ServiceDescriptor>,
    service: Arc<S>,
    register: impl FnOnce(MethodTable) -> Result<()>,
) -> std::result::Result<(), ConfigError> {
    let table = bind(descriptor, service)?;
    let service_name = table.service().to_string();
    register(table).map_err(|source| ConfigError::RegisterRejected {
        service: service_name,
        source,
    })
}
