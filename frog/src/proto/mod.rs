pub mod echo;
pub mod rpc_impl;
pub mod rpc_types;

#[cfg(test)]
pub mod tests;
