//! Known Solana clusters and their USDC mints.

/// CAIP-2 identifier of Solana mainnet-beta (genesis hash fragment).
pub const SOLANA_MAINNET: &str = "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

/// CAIP-2 identifier of Solana devnet.
pub const SOLANA_DEVNET: &str = "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// USDC mint on mainnet-beta.
pub const USDC_MAINNET: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDC mint on devnet.
pub const USDC_DEVNET: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

/// USDC decimals on Solana.
pub const USDC_DECIMALS: u8 = 6;

/// A token mint on one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    /// Base58 mint address.
    pub address: &'static str,

    /// Human-readable token name.
    pub name: &'static str,

    /// Number of decimals in the smallest unit.
    pub decimals: u8,
}

/// Configuration of one supported Solana cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// CAIP-2 identifier.
    pub network: &'static str,

    /// The mint `parse_price` falls back to.
    pub default_asset: MintInfo,
}

/// Returns the configurations of all known clusters.
#[must_use]
pub fn known_clusters() -> Vec<ClusterConfig> {
    vec![
        ClusterConfig {
            network: SOLANA_MAINNET,
            default_asset: MintInfo {
                address: USDC_MAINNET,
                name: "USD Coin",
                decimals: USDC_DECIMALS,
            },
        },
        ClusterConfig {
            network: SOLANA_DEVNET,
            default_asset: MintInfo {
                address: USDC_DEVNET,
                name: "USD Coin",
                decimals: USDC_DECIMALS,
            },
        },
    ]
}

/// Legacy V1 network aliases and their CAIP-2 equivalents.
pub const NETWORK_ALIASES: &[(&str, &str)] = &[
    ("solana", SOLANA_MAINNET),
    ("solana-devnet", SOLANA_DEVNET),
];

/// Looks up the configuration for a CAIP-2 cluster identifier.
#[must_use]
pub fn cluster_config(network: &str) -> Option<ClusterConfig> {
    known_clusters().into_iter().find(|c| c.network == network)
}

/// Returns whether the identifier names a Solana cluster.
#[must_use]
pub fn is_solana_network(network: &str) -> bool {
    network
        .split_once(':')
        .is_some_and(|(namespace, _)| namespace == "solana")
}

/// Resolves a V1 network alias to its CAIP-2 identifier.
#[must_use]
pub fn caip2_by_alias(alias: &str) -> Option<&'static str> {
    NETWORK_ALIASES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, caip2)| *caip2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_lookup() {
        assert_eq!(
            cluster_config(SOLANA_DEVNET).unwrap().default_asset.address,
            USDC_DEVNET
        );
        assert!(cluster_config("solana:unknown").is_none());
    }

    #[test]
    fn family_check() {
        assert!(is_solana_network(SOLANA_MAINNET));
        assert!(!is_solana_network("eip155:8453"));
        assert!(!is_solana_network("base"));
    }

    #[test]
    fn aliases() {
        assert_eq!(caip2_by_alias("solana-devnet"), Some(SOLANA_DEVNET));
        assert_eq!(caip2_by_alias("nope"), None);
    }
}
