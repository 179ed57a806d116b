//! Service and method descriptors.
//!
//! Descriptors are built once from a parsed schema file and never mutated afterwards. A
//! [`ServiceDescriptor`] owns its methods in declaration order; every [`MethodDescriptor`]
//! carries its qualified name and points back at its service through a weak reference.
use std::fmt;
use std::sync::{Arc, Weak};

/// A descriptor for an available RPC service.
pub struct ServiceDescriptor {
    name: String,
    package: String,
    file_name: String,
    methods: Vec<Arc<MethodDescriptor>>,
}

/// Fields of a method as read from the schema, before it is attached to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
}

impl ServiceDescriptor {
    /// Builds the service and its methods in one step so the back references are valid as
    /// soon as the descriptor is observable.
    pub fn new(
        name: impl Into<String>,
        package: impl Into<String>,
        file_name: impl Into<String>,
        methods: Vec<MethodSpec>,
    ) -> Arc<Self> {
        let name = name.into();
        let package = package.into();
        let file_name = file_name.into();
        let service_full_name = qualify(&package, &name);
        Arc::new_cyclic(|me: &Weak<ServiceDescriptor>| ServiceDescriptor {
            name,
            package,
            file_name,
            methods: methods
                .into_iter()
                .enumerate()
                .map(|(index, spec)| {
                    Arc::new(MethodDescriptor {
                        full_name: format!("{}.{}", service_full_name, spec.name),
                        name: spec.name,
                        input_type: spec.input_type,
                        output_type: spec.output_type,
                        index,
                        service: me.clone(),
                    })
                })
                .collect(),
        })
    }

    /// The name of the service as declared in the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package name of the service.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The schema file this service was declared in.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `package.Name`, or just `Name` when the schema has no package.
    pub fn full_name(&self) -> String {
        qualify(&self.package, &self.name)
    }

    /// The name this service is registered under.
    pub fn desc_name(&self) -> String {
        crate::proto::rpc_impl::service_desc_name(&self.name)
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    /// The i-th method in declaration order.
    pub fn method(&self, index: usize) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(index)
    }

    pub fn method_by_name(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// All of the available methods on the service.
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("file_name", &self.file_name)
            .field("methods", &self.methods)
            .finish()
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

/// A descriptor for a method available on an RPC service.
pub struct MethodDescriptor {
    name: String,
    full_name: String,
    input_type: String,
    output_type: String,
    index: usize,
    service: Weak<ServiceDescriptor>,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The protobuf name for the input type, as written in the schema (`.pkg.Request`).
    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    /// The protobuf name for the output type, as written in the schema (`.pkg.Response`).
    pub fn output_type(&self) -> &str {
        &self.output_type
    }

    /// The index of the method in the service descriptor.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The owning service, if it is still alive.
    pub fn service(&self) -> Option<Arc<ServiceDescriptor>> {
        self.service.upgrade()
    }

    /// `<service full name>.<method>`, the key methods are dispatched by. Fixed when the
    /// service is built, it does not depend on the service staying alive.
    pub fn full_name(&self) -> String {
        self.full_name.clone()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .field("index", &self.index)
            .finish()
    }
}

/// Strips the leading dot protobuf uses for fully qualified type references.
pub(crate) fn normalize_type_name(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}
