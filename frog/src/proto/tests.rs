use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::echo::*;
use super::rpc_impl::LoopbackChannel;
use super::rpc_types::context::Context;
use super::rpc_types::error::{ConfigError, Error};
use crate::common::config::RuntimeConfig;
use crate::{expect_startup, Bootstrap, Runtime};

#[derive(Clone)]
pub struct EchoService {
    pub delay_ms: u64,
    pub prefix: String,
    pub calls: Arc<AtomicU32>,
}

impl EchoService {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            prefix: String::new(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl Echo for EchoService {
    async fn echo(
        &self,
        _ctx: Context,
        input: EchoRequest,
    ) -> crate::proto::rpc_types::error::Result<EchoResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        if input.text == "boom" {
            return Err(anyhow::anyhow!("cannot echo {}", input.text).into());
        }
        Ok(EchoResponse {
            text: format!("{}{}", self.prefix, input.text),
        })
    }
}

struct TestContext {
    runtime: Runtime,
    service: EchoService,
}

impl TestContext {
    fn new(service: EchoService) -> Self {
        let mut boot = Bootstrap::new();
        let blob = descriptor_blob().unwrap();
        expect_startup(boot.load_descriptor(&blob));
        expect_startup(register_echo_server(&mut boot, service.clone()));
        Self {
            runtime: boot.finish(),
            service,
        }
    }

    fn channel(&self, default_timeout_ms: u64, latency_ms: Option<u64>) -> LoopbackChannel {
        self.runtime.loopback_channel(&RuntimeConfig {
            default_timeout_ms,
            simulated_latency_ms: latency_ms,
            ..Default::default()
        })
    }

    fn client(&self, channel: LoopbackChannel) -> EchoClient<LoopbackChannel> {
        EchoClient::from_registry(channel, self.runtime.registry()).unwrap()
    }
}

fn req(text: &str) -> EchoRequest {
    EchoRequest {
        text: text.to_string(),
    }
}

#[tokio::test]
async fn echo_sync() {
    let ctx = TestContext::new(EchoService::new(0));
    let client = ctx.client(ctx.channel(1000, None));

    let resp = client.echo(Context::background(), req("hello")).await.unwrap();
    assert_eq!(resp.text, "hello");
    assert_eq!(ctx.service.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn echo_async_then_wait() {
    let service = EchoService {
        prefix: "re: ".to_string(),
        ..EchoService::new(10)
    };
    let ctx = TestContext::new(service);
    let client = ctx.client(ctx.channel(1000, None));

    let call = client.async_echo(Context::background(), req("world"));
    assert!(!call.is_done());
    call.wait().await.unwrap();
    assert_eq!(call.response().text, "re: world");
    assert_eq!(call.request().text, "world");
}

#[tokio::test]
async fn echo_async_times_out() {
    let ctx = TestContext::new(EchoService::new(0));
    let client = ctx.client(ctx.channel(50, Some(300)));

    let call = client.async_echo(Context::background(), req("too late"));
    let ret = call.wait().await;
    assert!(matches!(ret, Err(Error::Timeout(d)) if d == Duration::from_millis(50)));
    assert!(call.response().text.is_empty());
}

#[tokio::test]
async fn implementation_error_reaches_caller() {
    let ctx = TestContext::new(EchoService::new(0));
    let client = ctx.client(ctx.channel(1000, None));

    let err = client.echo(Context::background(), req("boom")).await.unwrap_err();
    assert_eq!(err.to_string(), "execution error: cannot echo boom");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_dispatch_and_timeout() {
    let ctx = TestContext::new(EchoService::new(20));
    let client = ctx.client(ctx.channel(20, None));

    let mut tasks = JoinSet::new();
    for i in 0..50 {
        let call = client.async_echo(Context::background(), req(&i.to_string()));
        tasks.spawn(async move {
            let mut observed = Vec::new();
            for _ in 0..3 {
                let ret = call.wait().await;
                observed.push((ret.is_ok(), call.response().text));
            }
            (i, observed)
        });
    }

    let (mut ok, mut timed_out) = (0, 0);
    while let Some(ret) = tasks.join_next().await {
        let (i, observed) = ret.unwrap();
        // every waiter of a call sees the same outcome
        assert!(observed.windows(2).all(|w| w[0] == w[1]));
        let (success, text) = &observed[0];
        if *success {
            assert_eq!(*text, i.to_string());
            ok += 1;
        } else {
            assert!(text.is_empty());
            timed_out += 1;
        }
    }
    assert_eq!(ok + timed_out, 50);
}

#[test]
fn stub_without_descriptor() {
    let mut boot = Bootstrap::new();
    let err = register_echo_server(&mut boot, EchoService::new(0)).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownService(ref n) if n == ECHO_SERVICE_DESC));

    let runtime = boot.finish();
    let channel = runtime.loopback_channel(&RuntimeConfig::default());
    assert!(EchoClient::from_registry(channel, runtime.registry()).is_none());
}

#[tokio::test]
async fn generated_lookup_name_matches_registry() {
    let ctx = TestContext::new(EchoService::new(0));
    let names: Vec<_> = ctx.runtime.registry().names().collect();
    assert_eq!(names, [ECHO_SERVICE_DESC]);
    assert_eq!(
        crate::proto::rpc_impl::service_desc_name("Echo"),
        ECHO_SERVICE_DESC
    );
}
