//! Known EVM networks and their default stablecoin deployments.
//!
//! These tables back `parse_price` (default asset and decimals) and
//! `enhance_payment_requirements` (EIP-712 domain parameters), and map
//! legacy V1 network aliases onto CAIP-2 identifiers.

use alloy_primitives::{Address, address};

/// A token deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Token contract address.
    pub address: Address,

    /// EIP-712 domain name (e.g., `"USD Coin"`).
    pub name: String,

    /// Number of decimals in the smallest unit.
    pub decimals: u8,

    /// EIP-712 domain version.
    pub version: String,
}

/// Configuration of one supported EVM network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// CAIP-2 identifier (`eip155:<chain id>`).
    pub network: String,

    /// Numeric EIP-155 chain id.
    pub chain_id: u64,

    /// The asset `parse_price` falls back to.
    pub default_asset: AssetInfo,

    /// All assets accepted on this network.
    pub supported_assets: Vec<AssetInfo>,
}

/// Default EIP-712 domain name for USDC deployments.
pub const DEFAULT_USDC_NAME: &str = "USD Coin";

/// Default EIP-712 domain version for USDC deployments.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// USDC decimals.
pub const USDC_DECIMALS: u8 = 6;

fn usdc(contract: Address, name: &str) -> AssetInfo {
    AssetInfo {
        address: contract,
        name: name.to_owned(),
        decimals: USDC_DECIMALS,
        version: DEFAULT_USDC_VERSION.to_owned(),
    }
}

fn network(chain_id: u64, asset: AssetInfo) -> NetworkConfig {
    NetworkConfig {
        network: format!("eip155:{chain_id}"),
        chain_id,
        supported_assets: vec![asset.clone()],
        default_asset: asset,
    }
}

/// Returns the configurations of all known EVM networks.
#[must_use]
pub fn known_networks() -> Vec<NetworkConfig> {
    vec![
        network(
            8453,
            usdc(
                address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                DEFAULT_USDC_NAME,
            ),
        ),
        network(
            84532,
            // The Base Sepolia USDC contract reports name() = "USDC".
            usdc(address!("036CbD53842c5426634e7929541eC2318f3dCF7e"), "USDC"),
        ),
        network(
            1,
            usdc(
                address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                DEFAULT_USDC_NAME,
            ),
        ),
        network(
            137,
            usdc(
                address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
                DEFAULT_USDC_NAME,
            ),
        ),
        network(
            80002,
            // Polygon Amoy runs FiatTokenV2_2 with name() = "USDC".
            usdc(address!("41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"), "USDC"),
        ),
        network(
            43114,
            usdc(
                address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
                DEFAULT_USDC_NAME,
            ),
        ),
        network(
            43113,
            usdc(
                address!("5425890298aed601595a70AB815c96711a31Bc65"),
                DEFAULT_USDC_NAME,
            ),
        ),
    ]
}

/// Legacy V1 network aliases and their CAIP-2 equivalents.
pub const NETWORK_ALIASES: &[(&str, &str)] = &[
    ("base", "eip155:8453"),
    ("base-sepolia", "eip155:84532"),
    ("ethereum", "eip155:1"),
    ("polygon", "eip155:137"),
    ("polygon-amoy", "eip155:80002"),
    ("avalanche", "eip155:43114"),
    ("avalanche-fuji", "eip155:43113"),
];

/// Looks up the configuration for a CAIP-2 network identifier.
#[must_use]
pub fn network_config(network: &str) -> Option<NetworkConfig> {
    known_networks().into_iter().find(|n| n.network == network)
}

/// Parses the numeric chain id out of an `eip155:<id>` identifier.
#[must_use]
pub fn parse_eip155(network: &str) -> Option<u64> {
    let (namespace, reference) = network.split_once(':')?;
    (namespace == "eip155")
        .then(|| reference.parse().ok())
        .flatten()
}

/// Resolves a V1 network alias to its CAIP-2 identifier.
#[must_use]
pub fn caip2_by_alias(alias: &str) -> Option<&'static str> {
    NETWORK_ALIASES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, caip2)| *caip2)
}

/// Resolves a CAIP-2 identifier back to its V1 alias.
#[must_use]
pub fn alias_by_caip2(network: &str) -> Option<&'static str> {
    NETWORK_ALIASES
        .iter()
        .find(|(_, caip2)| *caip2 == network)
        .map(|(name, _)| *name)
}
