pub mod common;
pub mod proto;

pub use proto::rpc_impl::bootstrap::{expect_startup, Bootstrap, Runtime};
pub use proto::rpc_types::call::Call;
pub use proto::rpc_types::channel::Channel;
pub use proto::rpc_types::context::Context;
pub use proto::rpc_types::error::{ConfigError, Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
