pub mod __rt;
pub mod call;
pub mod channel;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod handler;

pub use __rt::Stub;
