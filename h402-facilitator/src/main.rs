//! x402 facilitator service entry point.
//!
//! ```bash
//! EVM_PRIVATE_KEY=0x... SVM_PRIVATE_KEY=... cargo run -p h402-facilitator
//! ```
//!
//! Configuration comes from flags or environment (see
//! [`FacilitatorConfig`]); `RUST_LOG` controls log filtering.

use std::net::SocketAddr;
use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::ProviderBuilder;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_keypair::Keypair;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use h402::X402Facilitator;
use h402::bazaar::{BAZAAR, extract_discovery_info};
use h402::scheme::{SchemeFacilitator, SchemeFacilitatorV1};
use h402_evm::exact::{ExactEvmConfig, ExactEvmFacilitator};
use h402_evm::signer::ProviderFacilitatorSigner;
use h402_facilitator::{AppState, BazaarCatalog, FacilitatorConfig, facilitator_router};
use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequirementsEnum};
use h402_svm::exact::ExactSvmFacilitator;
use h402_svm::signer::{KeypairRpcSigner, SvmFacilitatorSigner};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(FacilitatorConfig::parse()).await {
        tracing::error!("facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: FacilitatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(BazaarCatalog::new());
    let mut facilitator = X402Facilitator::new();
    facilitator.register_extension(BAZAAR);

    if let Some(key) = config.evm_private_key.as_deref() {
        register_evm(&mut facilitator, &config, key)?;
    } else {
        tracing::warn!("EVM_PRIVATE_KEY not set; EVM settlement disabled");
    }

    if let Some(key) = config.svm_private_key.as_deref() {
        register_svm(&mut facilitator, &config, key)?;
    } else {
        tracing::warn!("SVM_PRIVATE_KEY not set; Solana settlement disabled");
    }

    if facilitator.get_supported().kinds.is_empty() {
        tracing::warn!("no mechanisms registered; facilitator will reject every payment");
    }

    // Feed verified bazaar declarations into the discovery catalog.
    let discovery_catalog = Arc::clone(&catalog);
    facilitator.on_after_verify(Box::new(move |ctx| {
        let catalog = Arc::clone(&discovery_catalog);
        let payload = match &ctx.payment_payload {
            PaymentPayloadEnum::V2(p) => serde_json::to_value(p),
            PaymentPayloadEnum::V1(p) => serde_json::to_value(p),
        };
        let requirements = match &ctx.requirements {
            PaymentRequirementsEnum::V2(r) => serde_json::to_value(r),
            PaymentRequirementsEnum::V1(r) => serde_json::to_value(r),
        };
        Box::pin(async move {
            if let (Ok(payload), Ok(requirements)) = (payload, requirements) {
                if let Some(discovered) = extract_discovery_info(&payload, &requirements) {
                    tracing::info!(resource = %discovered.resource_url, "discovered resource");
                    catalog.record(&discovered);
                }
            }
            Ok(())
        })
    }));

    let state = Arc::new(AppState {
        facilitator,
        catalog,
    });

    let app = facilitator_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facilitator shut down");
    Ok(())
}

fn register_evm(
    facilitator: &mut X402Facilitator,
    config: &FacilitatorConfig,
    key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let signer: PrivateKeySigner = key
        .trim()
        .parse()
        .map_err(|e| format!("invalid EVM_PRIVATE_KEY: {e}"))?;
    let address = signer.address();
    let rpc_url: url::Url = config
        .evm_rpc_url
        .parse()
        .map_err(|e| format!("invalid EVM_RPC_URL: {e}"))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url);

    let networks = FacilitatorConfig::split_networks(&config.evm_networks);
    let evm = Arc::new(ExactEvmFacilitator::with_config(
        ProviderFacilitatorSigner::new(provider, address),
        ExactEvmConfig {
            deploy_erc4337_with_eip6492: config.deploy_erc4337_with_eip6492,
        },
    ));
    let evm_v2: Arc<dyn SchemeFacilitator> = evm.clone();
    let evm_v1: Arc<dyn SchemeFacilitatorV1> = evm;

    let aliases: Vec<&str> = networks
        .iter()
        .filter_map(|n| h402_evm::networks::alias_by_caip2(n))
        .collect();
    facilitator.register(&networks, evm_v2);
    if !aliases.is_empty() {
        facilitator.register_v1(&aliases, evm_v1);
    }

    tracing::info!(signer = %address, networks = ?networks, "registered EVM exact scheme");
    Ok(())
}

fn register_svm(
    facilitator: &mut X402Facilitator,
    config: &FacilitatorConfig,
    key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let keypair = Keypair::from_base58_string(key.trim());
    let rpc = Arc::new(RpcClient::new(config.svm_rpc_url.clone()));
    let signer = KeypairRpcSigner::new(keypair, rpc);
    let fee_payer = signer
        .get_addresses()
        .first()
        .cloned()
        .unwrap_or_default();

    let networks = FacilitatorConfig::split_networks(&config.svm_networks);
    let svm = Arc::new(ExactSvmFacilitator::new(signer));
    let svm_v2: Arc<dyn SchemeFacilitator> = svm.clone();
    let svm_v1: Arc<dyn SchemeFacilitatorV1> = svm;

    let aliases: Vec<&str> = networks
        .iter()
        .filter_map(|n| {
            h402_svm::networks::NETWORK_ALIASES
                .iter()
                .find(|(_, caip2)| caip2 == n)
                .map(|(alias, _)| *alias)
        })
        .collect();
    facilitator.register(&networks, svm_v2);
    if !aliases.is_empty() {
        facilitator.register_v1(&aliases, svm_v1);
    }

    tracing::info!(%fee_payer, networks = ?networks, "registered Solana exact scheme");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down");
    }
}
