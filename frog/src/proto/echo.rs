//! The `frog.echo` demo service. Messages and service glue are what `prost-build` with
//! `frog_rpc_build::ServiceGenerator::new().with_runtime_path("crate")` emits for
//! `echo.proto`; the descriptor is assembled in code so no `protoc` is needed at build time.
use prost_types::{FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto};

use crate::proto::rpc_impl::descriptor_registry::compress_file_descriptor;

pub const PACKAGE: &str = "frog.echo";
pub const FILE_NAME: &str = "echo.proto";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

impl ::prost::Name for EchoRequest {
    const NAME: &'static str = "EchoRequest";
    const PACKAGE: &'static str = "frog.echo";
    fn full_name() -> ::prost::alloc::string::String {
        "frog.echo.EchoRequest".into()
    }
    fn type_url() -> ::prost::alloc::string::String {
        "/frog.echo.EchoRequest".into()
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

impl ::prost::Name for EchoResponse {
    const NAME: &'static str = "EchoResponse";
    const PACKAGE: &'static str = "frog.echo";
    fn full_name() -> ::prost::alloc::string::String {
        "frog.echo.EchoResponse".into()
    }
    fn type_url() -> ::prost::alloc::string::String {
        "/frog.echo.EchoResponse".into()
    }
}

/// Echoes text back.
#[async_trait::async_trait]
pub trait Echo: Send + Sync + 'static {
    async fn echo(
        &self,
        ctx: crate::proto::rpc_types::context::Context,
        input: EchoRequest,
    ) -> crate::proto::rpc_types::error::Result<EchoResponse>;
}

/// Lookup name of the `Echo` service descriptor.
pub const ECHO_SERVICE_DESC: &str = "Echo_ServiceDesc";

/// Exposes a `Echo` implementation to the binder.
pub struct EchoServer<A>(pub ::std::sync::Arc<A>)
where
    A: Echo;

impl<A> crate::proto::rpc_types::handler::ServiceImpl for EchoServer<A>
where
    A: Echo,
{
    fn exposed_methods(
        self: ::std::sync::Arc<Self>,
    ) -> ::std::vec::Vec<crate::proto::rpc_types::handler::MethodHandler> {
        vec![crate::proto::rpc_types::handler::MethodHandler::new(
            "Echo",
            self.clone(),
            |s: ::std::sync::Arc<Self>, ctx, input: EchoRequest| async move {
                s.0.echo(ctx, input).await
            },
        )]
    }
}

/// Binds `service` to the `Echo` descriptor and adds its methods to the dispatcher.
pub fn register_echo_server<A>(
    bootstrap: &mut crate::Bootstrap,
    service: A,
) -> ::std::result::Result<(), crate::proto::rpc_types::error::ConfigError>
where
    A: Echo,
{
    bootstrap.register_service(
        ECHO_SERVICE_DESC,
        ::std::sync::Arc::new(EchoServer(::std::sync::Arc::new(service))),
    )
}

/// A client for a `Echo`, sending every call through a channel.
#[derive(Clone, Debug)]
pub struct EchoClient<C>(crate::proto::rpc_types::Stub<C>);

impl<C> EchoClient<C>
where
    C: crate::proto::rpc_types::channel::Channel,
{
    pub fn new(
        channel: C,
        service: ::std::sync::Arc<crate::proto::rpc_types::descriptor::ServiceDescriptor>,
    ) -> Self {
        EchoClient(crate::proto::rpc_types::Stub::new(channel, service))
    }

    /// Looks the `Echo` descriptor up in `registry`.
    pub fn from_registry(
        channel: C,
        registry: &crate::proto::rpc_impl::DescriptorRegistry,
    ) -> ::std::option::Option<Self> {
        registry
            .lookup(ECHO_SERVICE_DESC)
            .map(|service| Self::new(channel, service))
    }

    pub async fn echo(
        &self,
        ctx: crate::proto::rpc_types::context::Context,
        input: EchoRequest,
    ) -> crate::proto::rpc_types::error::Result<EchoResponse> {
        self.0.call(0, ctx, input).await
    }

    pub fn async_echo(
        &self,
        ctx: crate::proto::rpc_types::context::Context,
        input: EchoRequest,
    ) -> crate::proto::rpc_types::call::Call<EchoRequest, EchoResponse> {
        self.0.go(0, ctx, input)
    }
}

/// `echo.proto` as a file descriptor.
pub fn file_descriptor() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(FILE_NAME.to_string()),
        package: Some(PACKAGE.to_string()),
        service: vec![ServiceDescriptorProto {
            name: Some("Echo".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Echo".to_string()),
                input_type: Some(".frog.echo.EchoRequest".to_string()),
                output_type: Some(".frog.echo.EchoResponse".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// The gzip blob [`crate::Bootstrap::load_descriptor`] expects for `echo.proto`.
pub fn descriptor_blob() -> std::io::Result<Vec<u8>> {
    compress_file_descriptor(&file_descriptor())
}
