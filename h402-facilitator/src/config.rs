//! Service configuration from CLI flags and environment variables.
//!
//! Every flag falls back to an environment variable, so container
//! deployments configure the service entirely through the environment.
//! A `.env` file in the working directory is honored via `dotenvy`.

use std::net::IpAddr;

use clap::Parser;

use h402_svm::networks::SOLANA_DEVNET;

/// x402 facilitator service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "h402-facilitator", version, about)]
pub struct FacilitatorConfig {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = 4022)]
    pub port: u16,

    /// EVM JSON-RPC endpoint.
    #[arg(long, env = "EVM_RPC_URL", default_value = "https://sepolia.base.org")]
    pub evm_rpc_url: String,

    /// EVM settlement key (hex). EVM support is disabled when absent.
    #[arg(long, env = "EVM_PRIVATE_KEY")]
    pub evm_private_key: Option<String>,

    /// Comma-separated CAIP-2 networks the EVM signer serves.
    #[arg(long, env = "EVM_NETWORKS", default_value = "eip155:84532")]
    pub evm_networks: String,

    /// Solana RPC endpoint.
    #[arg(long, env = "SVM_RPC_URL", default_value = "https://api.devnet.solana.com")]
    pub svm_rpc_url: String,

    /// Solana fee-payer key (base58). Solana support is disabled when
    /// absent.
    #[arg(long, env = "SVM_PRIVATE_KEY")]
    pub svm_private_key: Option<String>,

    /// Comma-separated CAIP-2 clusters the Solana signer serves.
    #[arg(long, env = "SVM_NETWORKS", default_value = SOLANA_DEVNET)]
    pub svm_networks: String,

    /// Deploy undeployed EIP-6492 smart wallets before settling.
    #[arg(long, env = "DEPLOY_ERC4337_WITH_EIP6492", default_value_t = false)]
    pub deploy_erc4337_with_eip6492: bool,
}

impl FacilitatorConfig {
    /// Splits a comma-separated network list.
    #[must_use]
    pub fn split_networks(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_list_splitting() {
        assert_eq!(
            FacilitatorConfig::split_networks("eip155:8453, eip155:84532 ,"),
            vec!["eip155:8453".to_owned(), "eip155:84532".to_owned()]
        );
        assert!(FacilitatorConfig::split_networks(" ").is_empty());
    }

    #[test]
    fn parses_defaults() {
        let config = FacilitatorConfig::parse_from(["h402-facilitator"]);
        assert_eq!(config.port, 4022);
        assert_eq!(config.evm_networks, "eip155:84532");
        assert!(!config.deploy_erc4337_with_eip6492);
    }
}
