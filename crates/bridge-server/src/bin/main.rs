//! wallet-bridge CLI - connect to a wallet and sign from the terminal
//!
//! Outbound deep links are printed to stderr. Wallet callbacks come back
//! either as lines on stdin (`--stdio`) or as HTTP redirects (`--http`).
//! The operation result is printed to stdout as one JSON object.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;

use bridge_server::{CallbackServer, PrintOpener, ServerMode};
use wallet_bridge::{
    BridgeConfig, Collaborators, ConnectionRegistry, ConnectionRouter, Progress,
    ResponseDispatcher, WalletCatalog, WalletInfo, WalletRequest,
};

/// Connect to crypto wallets over encrypted deep links
#[derive(Parser, Debug)]
#[command(name = "wallet-bridge")]
#[command(version)]
#[command(about = "Connect to crypto wallets over deep links, relays and wallet SDKs")]
struct Args {
    /// Bridge configuration file (JSON)
    #[arg(long, env = "WALLET_BRIDGE_CONFIG", default_value = "wallet-bridge.json")]
    config: PathBuf,

    /// Wallet catalog: a JSON/YAML file or an http(s) URL
    #[arg(long, env = "WALLET_BRIDGE_CATALOG")]
    catalog: Option<String>,

    /// Wallet id or name from the catalog; omit for a debug pairing link
    #[arg(long)]
    wallet: Option<String>,

    /// Chain reference, e.g. 1
    #[arg(long)]
    chain_id: Option<String>,

    /// Read callback URIs from stdin
    #[arg(long, conflicts_with = "http")]
    stdio: bool,

    /// Receive callbacks as HTTP redirects
    #[arg(long)]
    http: bool,

    /// Port for the HTTP callback endpoint
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Base URL wallets redirect to (default: http://localhost:<port>)
    #[arg(long)]
    public_url: Option<String>,

    /// Log to stderr even in stdio mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print the wallet account
    Connect,
    /// Connect and sign a plain-text message
    SignMessage {
        message: String,
    },
}

async fn load_catalog(source: Option<&str>) -> anyhow::Result<WalletCatalog> {
    let catalog = match source {
        None => WalletCatalog::default(),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            WalletCatalog::fetch_and_parse(url).await?
        }
        Some(path) => WalletCatalog::load(Path::new(path))
            .with_context(|| format!("Failed to load wallet catalog {}", path))?,
    };
    Ok(catalog)
}

fn build_request(
    catalog: &WalletCatalog,
    wallet: Option<&str>,
    chain_id: Option<&str>,
) -> anyhow::Result<WalletRequest> {
    let wallet = match wallet {
        Some(key) => match catalog.find(key).or_else(|| catalog.find_by_name(key)) {
            Some(wallet) => Some(wallet.clone()),
            None => bail!("Wallet {} is not in the catalog", key),
        },
        None => None,
    };

    let mut request = WalletRequest::new(wallet);
    request.chain_id = chain_id.map(String::from);
    Ok(request)
}

fn describe(info: &WalletInfo) -> Value {
    json!({
        "address": info.address,
        "chainId": info.chain_id,
        "wallet": info.wallet_id(),
        "peerName": info.peer_name,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries acks and the result in stdio mode
    if !args.stdio || args.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into()),
            )
            .init();
    }

    let config = BridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {:?}", args.config))?;
    let catalog = load_catalog(args.catalog.as_deref()).await?;
    let request = build_request(&catalog, args.wallet.as_deref(), args.chain_id.as_deref())?;

    let collaborators = Collaborators::new(Arc::new(PrintOpener));
    let registry = ConnectionRegistry::from_config(&config, catalog, collaborators);
    let router = Arc::new(ConnectionRouter::new(Arc::new(registry)));

    let mode = if args.http {
        ServerMode::Http { port: args.port }
    } else {
        ServerMode::Stdio
    };
    let mut server = CallbackServer::new(ResponseDispatcher::new(Arc::clone(&router))).with_mode(mode);
    if let Some(public_url) = &args.public_url {
        server = server.with_public_url(public_url.as_str());
    }

    let operation = async {
        match &args.command {
            Command::Connect => router.connect(&request).await.map(|info| describe(&info)),
            Command::SignMessage { message } => router
                .sign_message(&request, message, &Progress::silent())
                .await
                .map(|signature| json!({ "signature": signature })),
        }
    };

    let outcome = tokio::select! {
        outcome = operation => outcome,
        served = server.run() => {
            served?;
            bail!("Callback input closed before the wallet responded");
        }
    };

    match outcome {
        Ok(result) => {
            info!("Wallet operation completed");
            println!("{}", json!({ "result": result }));
            Ok(())
        }
        Err(e) => {
            println!(
                "{}",
                json!({ "error": { "code": e.code(), "message": e.to_string() } })
            );
            Err(e.into())
        }
    }
}
