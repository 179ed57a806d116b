extern crate heck;
extern crate prost_build;

use std::fmt;

use heck::{ToShoutySnakeCase, ToSnakeCase};

/// The service generator to be used with `prost-build` to emit server glue and client stubs
/// for the frog runtime.
///
/// For every service it writes:
/// * a service trait with one async method per RPC,
/// * `<Name>Server`, exposing an implementation of the trait to the binder,
/// * `register_<name>_server`, binding an implementation during bootstrap,
/// * a `<NAME>_SERVICE_DESC` constant holding the descriptor lookup name,
/// * `<Name>Client`, with a waiting `<method>` and a non-blocking `async_<method>` per RPC.
///
/// Streaming methods are rejected.
#[derive(Clone, Debug)]
pub struct ServiceGenerator {
    runtime: String,
}

impl Default for ServiceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceGenerator {
    /// Create a new `ServiceGenerator` referring to the runtime as `::frog`.
    pub fn new() -> ServiceGenerator {
        ServiceGenerator {
            runtime: "::frog".to_string(),
        }
    }

    /// Path the generated code uses to reach the runtime crate, `crate` when generating into
    /// the runtime itself.
    pub fn with_runtime_path(mut self, path: impl Into<String>) -> ServiceGenerator {
        self.runtime = path.into();
        self
    }
}

impl prost_build::ServiceGenerator for ServiceGenerator {
    fn generate(&mut self, service: prost_build::Service, mut buf: &mut String) {
        use std::fmt::Write;

        let rt = self.runtime.as_str();
        let namespace = format!("{}::proto::rpc_types", rt);
        let server_name = format!("{}Server", service.name);
        let client_name = format!("{}Client", service.name);
        let desc_const = format!("{}_SERVICE_DESC", service.name.to_shouty_snake_case());
        let register_fn = format!("register_{}_server", service.name.to_snake_case());

        let mut trait_methods = String::new();
        let mut handler_methods = String::new();
        let mut client_methods = String::new();

        for (idx, method) in service.methods.iter().enumerate() {
            assert!(
                !method.client_streaming,
                "Client streaming not supported for method {}",
                method.proto_name
            );
            assert!(
                !method.server_streaming,
                "Server streaming not supported for method {}",
                method.proto_name
            );

            ServiceGenerator::write_comments(&mut trait_methods, 4, &method.comments).unwrap();
            writeln!(
                trait_methods,
                r#"    async fn {name}(&self, ctx: {namespace}::context::Context, input: {input_type}) -> {namespace}::error::Result<{output_type}>;"#,
                name = method.name,
                input_type = method.input_type,
                output_type = method.output_type,
                namespace = namespace,
            )
            .unwrap();

            writeln!(
                handler_methods,
                r#"            {namespace}::handler::MethodHandler::new(
                {proto_name:?},
                self.clone(),
                |s: ::std::sync::Arc<Self>, ctx, input: {input_type}| async move {{ s.0.{name}(ctx, input).await }},
            ),"#,
                proto_name = method.proto_name,
                name = method.name,
                input_type = method.input_type,
                namespace = namespace,
            )
            .unwrap();

            ServiceGenerator::write_comments(&mut client_methods, 4, &method.comments).unwrap();
            writeln!(
                client_methods,
                r#"    pub async fn {name}(&self, ctx: {namespace}::context::Context, input: {input_type}) -> {namespace}::error::Result<{output_type}> {{
        self.0.call({index}, ctx, input).await
    }}

    pub fn async_{name}(&self, ctx: {namespace}::context::Context, input: {input_type}) -> {namespace}::call::Call<{input_type}, {output_type}> {{
        self.0.go({index}, ctx, input)
    }}
"#,
                name = method.name,
                index = idx,
                input_type = method.input_type,
                output_type = method.output_type,
                namespace = namespace,
            )
            .unwrap();
        }

        ServiceGenerator::write_comments(&mut buf, 0, &service.comments).unwrap();
        write!(
            buf,
            r#"
#[async_trait::async_trait]
pub trait {name}: Send + Sync + 'static {{
{trait_methods}}}

/// Lookup name of the `{name}` service descriptor.
pub const {desc_const}: &str = "{proto_name}_ServiceDesc";

/// Exposes a `{name}` implementation to the binder.
pub struct {server_name}<A>(pub ::std::sync::Arc<A>) where A: {name};

impl<A> {namespace}::handler::ServiceImpl for {server_name}<A> where A: {name} {{
    fn exposed_methods(self: ::std::sync::Arc<Self>) -> ::std::vec::Vec<{namespace}::handler::MethodHandler> {{
        vec![
{handler_methods}        ]
    }}
}}

/// Binds `service` to the `{name}` descriptor and adds its methods to the dispatcher.
pub fn {register_fn}<A>(bootstrap: &mut {rt}::Bootstrap, service: A) -> ::std::result::Result<(), {namespace}::error::ConfigError> where A: {name} {{
    bootstrap.register_service({desc_const}, ::std::sync::Arc::new({server_name}(::std::sync::Arc::new(service))))
}}

/// A client for a `{name}`, sending every call through a channel.
#[derive(Clone, Debug)]
pub struct {client_name}<C>({namespace}::Stub<C>);

impl<C> {client_name}<C> where C: {namespace}::channel::Channel {{
    pub fn new(channel: C, service: ::std::sync::Arc<{namespace}::descriptor::ServiceDescriptor>) -> Self {{
        {client_name}({namespace}::Stub::new(channel, service))
    }}

    /// Looks the `{name}` descriptor up in `registry`.
    pub fn from_registry(channel: C, registry: &{rt}::proto::rpc_impl::DescriptorRegistry) -> ::std::option::Option<Self> {{
        registry.lookup({desc_const}).map(|service| Self::new(channel, service))
    }}

{client_methods}}}
"#,
            name = service.name,
            proto_name = service.proto_name,
            desc_const = desc_const,
            server_name = server_name,
            client_name = client_name,
            register_fn = register_fn,
            trait_methods = trait_methods,
            handler_methods = handler_methods,
            client_methods = client_methods,
            namespace = namespace,
            rt = rt,
        )
        .unwrap();
    }
}

impl ServiceGenerator {
    fn write_comments<W>(
        mut write: W,
        indent: usize,
        comments: &prost_build::Comments,
    ) -> fmt::Result
    where
        W: fmt::Write,
    {
        for comment in &comments.leading {
            for line in comment.lines().filter(|s| !s.is_empty()) {
                writeln!(write, "{}///{}", " ".repeat(indent), line)?;
            }
        }
        Ok(())
    }
}
