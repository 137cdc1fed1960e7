//! device-pop: manage the device-bound proof-of-possession key
//!
//! Generates and inspects the device key, and mints signed HTTP requests that
//! bind an access token to it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tracing::{info, warn};

use device_pop::{
    AsyncTaskGateway, DevicePop, MintRequest, PopConfig, PublicKeyFormat, StoreKind,
};

#[derive(Parser)]
#[command(name = "device-pop")]
#[command(about = "Device-bound proof-of-possession keys and signed HTTP requests")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/device-pop/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key store backend: memory, file or keyring
    #[arg(long, global = true, env = "DEVICE_POP_STORE")]
    store: Option<StoreKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the device key, replacing any existing one
    Generate {
        /// Never ask the store for isolated key material
        #[arg(long)]
        no_isolation: bool,
    },

    /// Show the current device key
    Status,

    /// Print the RFC 7638 thumbprint of the device key
    Thumbprint,

    /// Print the request confirmation (req_cnf) for token requests
    ReqCnf,

    /// Export the public key
    Export {
        /// der (base64 SubjectPublicKeyInfo) or jwk
        #[arg(long, default_value = "jwk")]
        format: PublicKeyFormat,
    },

    /// Mint a signed HTTP request for an access token
    Mint {
        /// Target URL of the request
        #[arg(long)]
        url: String,

        /// Access token to bind
        #[arg(long, env = "DEVICE_POP_ACCESS_TOKEN")]
        token: String,

        /// HTTP method
        #[arg(long)]
        method: Option<String>,

        /// Server-provided nonce
        #[arg(long)]
        nonce: Option<String>,

        /// Seconds since Unix epoch (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Sign a payload with the device key
    Sign {
        /// Signature scheme, e.g. SHA256withRSA or PS256
        #[arg(long, default_value = "SHA256withRSA")]
        alg: String,

        /// Payload to sign
        #[arg(long)]
        input: String,
    },

    /// Verify a base64 signature over a payload
    Verify {
        #[arg(long, default_value = "SHA256withRSA")]
        alg: String,

        #[arg(long)]
        input: String,

        #[arg(long)]
        signature: String,
    },

    /// Delete the device key
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("device_pop=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.store)?;

    if config.store == StoreKind::Memory {
        warn!("Memory store selected; the key is lost when this process exits");
    }

    let pop = Arc::new(DevicePop::from_config(&config)?);
    let gateway = AsyncTaskGateway::with_handle(pop, Handle::current())
        .with_timeout(config.signing.blocking_timeout());

    match cli.command {
        Commands::Generate { no_isolation } => run_generate(&gateway, no_isolation).await,
        Commands::Status => run_status(&gateway, &config).await,
        Commands::Thumbprint => {
            println!("{}", gateway.thumbprint().await?);
            Ok(())
        }
        Commands::ReqCnf => {
            println!("{}", gateway.request_confirmation().await?);
            Ok(())
        }
        Commands::Export { format } => {
            let key = gateway
                .spawn(move |pop| pop.minter().public_key(format))
                .await?;
            println!("{}", key);
            Ok(())
        }
        Commands::Mint {
            url,
            token,
            method,
            nonce,
            timestamp,
        } => {
            let request = MintRequest {
                url,
                access_token: token,
                timestamp,
                method,
                nonce,
            };
            println!("{}", gateway.mint(request).await?);
            Ok(())
        }
        Commands::Sign { alg, input } => {
            println!("{}", gateway.sign(&alg, &input).await?);
            Ok(())
        }
        Commands::Verify {
            alg,
            input,
            signature,
        } => run_verify(&gateway, &alg, &input, &signature).await,
        Commands::Clear { force } => run_clear(&gateway, force).await,
    }
}

/// Explicit file, else default locations; `--store` wins over both
fn load_config(
    path: Option<&std::path::Path>,
    store: Option<StoreKind>,
) -> anyhow::Result<PopConfig> {
    let mut config = match path {
        Some(path) => PopConfig::from_file(path)?,
        None => PopConfig::load()?,
    };
    if let Some(store) = store {
        config.store = store;
    }
    config.validate()?;
    Ok(config)
}

async fn run_generate(gateway: &AsyncTaskGateway, no_isolation: bool) -> anyhow::Result<()> {
    let identity = gateway
        .spawn(move |pop| {
            let mut policy = pop.keys().policy().clone();
            if no_isolation {
                policy.prefer_hardware_isolation = false;
            }
            pop.keys().generate_with(&policy)
        })
        .await?;

    info!(thumbprint = %identity.thumbprint, "Device key generated");
    println!("Generated device key: {}", identity.alias);
    println!("  Thumbprint: {}", identity.thumbprint);
    println!("  Created: {}", identity.created_at.to_rfc3339());
    println!(
        "  Hardware backed: {}",
        if identity.hardware_backed { "yes" } else { "no" }
    );
    Ok(())
}

async fn run_status(gateway: &AsyncTaskGateway, config: &PopConfig) -> anyhow::Result<()> {
    let capabilities = gateway.spawn(|pop| Ok(pop.keys().capabilities())).await?;
    println!("Store: {} ({:?})", config.store, capabilities.backing);
    println!(
        "  Isolated module: {}",
        if capabilities.isolation_available { "available" } else { "unavailable" }
    );
    println!("Signing algorithm: {}", config.signing.algorithm);

    let exists = gateway.spawn(|pop| Ok(pop.keys().exists())).await?;
    if !exists {
        println!("Device key: none");
        println!("  Create one with: device-pop generate");
        return Ok(());
    }

    let identity = gateway.spawn(|pop| pop.keys().identity()).await?;
    println!("Device key: {}", identity.alias);
    println!("  Thumbprint: {}", identity.thumbprint);
    println!("  Created: {}", identity.created_at.to_rfc3339());
    println!(
        "  Hardware backed: {}",
        if identity.hardware_backed { "yes" } else { "no" }
    );
    Ok(())
}

async fn run_verify(
    gateway: &AsyncTaskGateway,
    alg: &str,
    input: &str,
    signature: &str,
) -> anyhow::Result<()> {
    if gateway.verify(alg, input, signature).await? {
        println!("Signature valid");
        Ok(())
    } else {
        Err(anyhow::anyhow!("Signature invalid"))
    }
}

async fn run_clear(gateway: &AsyncTaskGateway, force: bool) -> anyhow::Result<()> {
    if !force {
        println!("This will delete the device key.");
        println!("Tokens bound to it will no longer be usable.");
        println!();
        println!("Use --force to confirm.");
        return Ok(());
    }

    if gateway.spawn(|pop| Ok(pop.keys().clear())).await? {
        println!("Device key deleted.");
        Ok(())
    } else {
        Err(anyhow::anyhow!("Failed to delete the device key"))
    }
}
