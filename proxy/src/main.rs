//! Binary entry point: parses CLI arguments, loads configuration, and runs
//! the proxy until Ctrl-C (spec §6 "process lifecycle").

use std::path::PathBuf;

use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "vertex-proxy", version, about = "OpenAI-compatible proxy in front of Vertex AI's generative models")]
struct Args {
    /// Path to the TOML configuration file. When omitted, configuration comes
    /// entirely from the environment (spec §6 "Environment variables").
    #[arg(long, env = "VERTEX_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured listen port.
    #[arg(long, env = "VERTEX_PROXY_PORT")]
    port: Option<u16>,

    /// `EnvFilter`-style log filter, e.g. "info" or "server=debug,llm=debug".
    #[arg(long, env = "VERTEX_PROXY_LOG", default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }),
        None => Config::load_from_env(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }

    let shutdown_signal = CancellationToken::new();
    let shutdown_signal_for_serve = shutdown_signal.clone();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.cancel();
    });

    server::serve(ServeConfig {
        listen_address: config.listen_address(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        log_filter: args.log_filter,
        shutdown_signal: shutdown_signal_for_serve,
        config,
        bound_addr_sender: None,
    })
    .await
}
