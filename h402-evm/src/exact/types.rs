//! Wire and ABI types for the EVM `exact` scheme.

use alloy_primitives::{Address, B256, Bytes, hex};
use alloy_sol_types::{SolValue, sol};
use serde::{Deserialize, Serialize};

/// The scheme identifier.
pub const SCHEME_EXACT: &str = "exact";

/// Grace window applied to authorization validity bounds, and the
/// amount `validAfter` is backdated by at signing time.
pub const CLOCK_SKEW_SECS: u64 = 60;

/// Inner payload of an `exact` EVM payment: the signed EIP-3009
/// authorization plus its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// Hex signature: 65-byte ECDSA for EOAs, or an EIP-1271 /
    /// EIP-6492 blob for contract accounts.
    pub signature: String,

    /// The authorization that was signed.
    pub authorization: ExactEvmAuthorization,
}

/// An EIP-3009 `transferWithAuthorization` message, all numerics as
/// decimal strings and the nonce as 0x-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    /// Token owner authorizing the transfer.
    pub from: String,

    /// Transfer recipient.
    pub to: String,

    /// Transfer value in the token's smallest unit.
    pub value: String,

    /// Authorization is not valid before this Unix timestamp.
    pub valid_after: String,

    /// Authorization expires at this Unix timestamp.
    pub valid_before: String,

    /// Unique 32-byte nonce, 0x-prefixed hex (66 characters).
    pub nonce: String,
}

/// EIP-712 domain parameters carried in requirements `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactRequirementsExtra {
    /// Token name as used in the EIP-712 domain.
    pub name: String,

    /// Token version as used in the EIP-712 domain.
    pub version: String,
}

sol! {
    /// EIP-712 struct for ERC-3009 transfer authorization.
    ///
    /// Field order follows the USDC contract definition; the facilitator
    /// rebuilds this struct byte-for-byte to check the signature.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

sol! {
    /// ERC-3009 nonce state query.
    function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);

    /// ERC-20 balance query.
    function balanceOf(address account) external view returns (uint256);

    /// ERC-1271 signature check.
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);

    /// ERC-3009 transfer with a packed bytes signature (contract wallets).
    function transferWithAuthorization(
        address from,
        address to,
        uint256 value,
        uint256 validAfter,
        uint256 validBefore,
        bytes32 nonce,
        bytes signature
    ) external;

    /// ERC-3009 transfer with split v/r/s (EOAs).
    function transferWithAuthorizationVRS(
        address from,
        address to,
        uint256 value,
        uint256 validAfter,
        uint256 validBefore,
        bytes32 nonce,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;

    /// Universal EIP-6492/EIP-1271/EOA validator.
    function isValidSig(address signer, bytes32 hash, bytes signature) external returns (bool);
}

/// The fixed 32-byte suffix marking an
/// [EIP-6492](https://eips.ethereum.org/EIPS/eip-6492) wrapped signature.
pub const EIP6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// A decoded EIP-6492 signature wrapper.
#[derive(Debug, Clone)]
pub struct Erc6492Signature {
    /// Wallet factory to call when the account is undeployed.
    pub factory: Address,

    /// Calldata for the factory deployment call.
    pub factory_calldata: Bytes,

    /// The inner signature the deployed wallet validates.
    pub inner: Bytes,
}

/// Decodes an EIP-6492 wrapper, or returns `None` for plain signatures.
#[must_use]
pub fn parse_erc6492(signature: &[u8]) -> Option<Erc6492Signature> {
    if signature.len() < 32 || signature[signature.len() - 32..] != EIP6492_MAGIC_SUFFIX {
        return None;
    }
    let body = &signature[..signature.len() - 32];
    let (factory, factory_calldata, inner) =
        <(Address, Bytes, Bytes)>::abi_decode_params(body).ok()?;
    Some(Erc6492Signature {
        factory,
        factory_calldata,
        inner,
    })
}

/// Parses a 0x-prefixed hex string into raw bytes.
pub fn parse_hex(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(data.trim_start_matches("0x"))
}

/// Parses a 0x-prefixed hex string into a 32-byte word.
#[must_use]
pub fn parse_hex_b256(data: &str) -> Option<B256> {
    let bytes = parse_hex(data).ok()?;
    (bytes.len() == 32).then(|| B256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address};
    use alloy_sol_types::SolStruct;

    #[test]
    fn payload_wire_shape() {
        let payload = ExactEvmPayload {
            signature: format!("0x{}", "00".repeat(65)),
            authorization: ExactEvmAuthorization {
                from: "0x1234567890123456789012345678901234567890".into(),
                to: "0x0987654321098765432109876543210987654321".into(),
                value: "100000".into(),
                valid_after: "1000000000".into(),
                valid_before: "1000003600".into(),
                nonce: format!("0x{}", "00".repeat(32)),
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["authorization"]["validAfter"], "1000000000");
        assert_eq!(value["authorization"]["validBefore"], "1000003600");
        let back: ExactEvmPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn eip712_struct_hash_is_stable() {
        let message = TransferWithAuthorization {
            from: address!("1111111111111111111111111111111111111111"),
            to: address!("2222222222222222222222222222222222222222"),
            value: U256::from(100_000u64),
            validAfter: U256::from(1_000_000_000u64),
            validBefore: U256::from(1_000_003_600u64),
            nonce: B256::ZERO,
        };
        // Same message, same struct hash.
        assert_eq!(message.eip712_hash_struct(), message.eip712_hash_struct());
    }

    #[test]
    fn erc6492_parse_rejects_plain_signatures() {
        assert!(parse_erc6492(&[0u8; 65]).is_none());
        assert!(parse_erc6492(&[]).is_none());
    }

    #[test]
    fn erc6492_roundtrip() {
        let factory = address!("3333333333333333333333333333333333333333");
        let calldata = Bytes::from(vec![1, 2, 3]);
        let inner = Bytes::from(vec![9; 65]);
        let mut wrapped =
            (factory, calldata.clone(), inner.clone()).abi_encode_params();
        wrapped.extend_from_slice(&EIP6492_MAGIC_SUFFIX);

        let parsed = parse_erc6492(&wrapped).unwrap();
        assert_eq!(parsed.factory, factory);
        assert_eq!(parsed.factory_calldata, calldata);
        assert_eq!(parsed.inner, inner);
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(parse_hex("0x0102").unwrap(), vec![1, 2]);
        assert!(parse_hex_b256(&format!("0x{}", "ab".repeat(32))).is_some());
        assert!(parse_hex_b256("0x0102").is_none());
    }
}
