pub mod binder;
pub mod bootstrap;
pub mod descriptor_registry;
pub mod dispatcher;
pub mod loopback;

pub use binder::{bind, register_service, BoundMethod, MethodTable};
pub use descriptor_registry::{service_desc_name, DescriptorRegistry};
pub use dispatcher::Dispatcher;
pub use loopback::LoopbackChannel;
