use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;

use frog::common::config::RuntimeConfig;
use frog::proto::echo::{self, EchoClient, EchoRequest, EchoResponse};
use frog::{expect_startup, Bootstrap, Context};

#[derive(Parser, Debug)]
#[command(name = "frog-echo", author, version = frog::VERSION, about = "Echo text through the loopback RPC runtime", long_about = None)]
struct Cli {
    #[arg(short, long, help = "path to a toml runtime config")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "text to echo", default_value = "hello")]
    text: String,

    #[arg(long, help = "per call timeout in milliseconds, overrides default_timeout_ms")]
    timeout_ms: Option<u64>,

    #[arg(long, help = "delay before dispatch in milliseconds, overrides simulated_latency_ms")]
    latency_ms: Option<u64>,

    #[arg(long, help = "server side delay in milliseconds", default_value = "0")]
    work_ms: u64,

    #[arg(long, help = "console log level, e.g. info, debug, frog=trace")]
    log_level: Option<String>,

    #[arg(long = "async", help = "start the call without waiting and poll the call handle until it is done")]
    use_async: bool,
}

struct EchoService {
    work: Duration,
}

#[async_trait::async_trait]
impl echo::Echo for EchoService {
    async fn echo(&self, _ctx: Context, input: EchoRequest) -> frog::Result<EchoResponse> {
        tokio::time::sleep(self.work).await;
        Ok(EchoResponse { text: input.text })
    }
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig, anyhow::Error> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(ms) = cli.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be greater than zero");
        config.default_timeout_ms = ms;
    }
    if cli.latency_ms.is_some() {
        config.simulated_latency_ms = cli.latency_ms;
    }
    if cli.log_level.is_some() {
        config.logging.level = cli.log_level.clone();
    }
    Ok(config)
}

async fn run_main(cli: Cli) -> Result<(), anyhow::Error> {
    let config = load_config(&cli)?;
    frog::common::log::init(&config.logging)?;
    tracing::debug!(config = %config.dump(), "loaded config");

    let mut boot = Bootstrap::new();
    let blob = echo::descriptor_blob().with_context(|| "failed to compress echo descriptor")?;
    expect_startup(boot.load_descriptor(&blob));
    expect_startup(echo::register_echo_server(
        &mut boot,
        EchoService {
            work: Duration::from_millis(cli.work_ms),
        },
    ));
    let runtime = boot.finish();

    let channel = runtime.loopback_channel(&config);
    let client = EchoClient::from_registry(channel, runtime.registry())
        .with_context(|| format!("{} not registered", echo::ECHO_SERVICE_DESC))?;

    let request = EchoRequest {
        text: cli.text.clone(),
    };
    let text = if cli.use_async {
        let call = client.async_echo(Context::background(), request);
        let mut polls = 0u32;
        while !call.is_done() {
            polls += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tracing::info!(polls, "call finished");
        call.wait().await?;
        call.take_response().text
    } else {
        client.echo(Context::background(), request).await?.text
    };

    println!("{}", text);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_main(cli).await {
        eprintln!("error: {:?}", e);
        std::process::exit(1);
    }
}
