//! Wire types and transaction helpers for the Solana `exact` scheme.

use serde::{Deserialize, Serialize};
use solana_pubkey::{Pubkey, pubkey};
use solana_transaction::versioned::VersionedTransaction;

/// The scheme identifier.
pub const SCHEME_EXACT: &str = "exact";

/// Associated Token Account program id.
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Inner payload of an `exact` Solana payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSvmPayload {
    /// Base64-encoded serialized transaction, partially signed by the
    /// buyer.
    pub transaction: String,
}

/// Extra requirements data for the Solana `exact` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSvmExtra {
    /// The facilitator-managed fee payer the buyer must name.
    pub fee_payer: String,
}

/// Derives the associated token account for `(owner, mint)` under the
/// given token program.
#[must_use]
pub fn derive_ata(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .0
}

/// A decoded SPL `TransferChecked` instruction with resolved accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferChecked {
    /// Transfer amount in token base units.
    pub amount: u64,
    /// Declared mint decimals.
    pub decimals: u8,
    /// Source token account.
    pub source: Pubkey,
    /// Token mint.
    pub mint: Pubkey,
    /// Destination token account.
    pub destination: Pubkey,
    /// Transfer authority (the payer).
    pub authority: Pubkey,
    /// Owning token program (Token or Token-2022).
    pub token_program: Pubkey,
}

/// Extracts the transaction's single `TransferChecked` instruction.
///
/// The wire format admits exactly one instruction; anything else — extra
/// instructions, a different program, a different token instruction —
/// is rejected.
pub fn extract_single_transfer_checked(
    transaction: &VersionedTransaction,
) -> Result<TransferChecked, String> {
    let instructions = transaction.message.instructions();
    if instructions.len() != 1 {
        return Err(format!(
            "expected exactly one instruction, found {}",
            instructions.len()
        ));
    }
    let instruction = &instructions[0];
    let keys = transaction.message.static_account_keys();

    let program_id = *instruction.program_id(keys);
    let token_program = if program_id == spl_token::id() {
        spl_token::id()
    } else if program_id == spl_token_2022::id() {
        spl_token_2022::id()
    } else {
        return Err(format!("instruction program {program_id} is not an SPL token program"));
    };

    // Token and Token-2022 share the instruction layout; unpack with the
    // base codec and keep the program id for ATA derivation.
    let decoded = spl_token::instruction::TokenInstruction::unpack(&instruction.data)
        .map_err(|e| format!("cannot decode token instruction: {e}"))?;
    let spl_token::instruction::TokenInstruction::TransferChecked { amount, decimals } = decoded
    else {
        return Err("instruction is not TransferChecked".to_owned());
    };

    let account = |position: usize| -> Result<Pubkey, String> {
        let index = instruction
            .accounts
            .get(position)
            .copied()
            .ok_or_else(|| format!("missing account at position {position}"))?;
        keys.get(usize::from(index))
            .copied()
            .ok_or_else(|| format!("account index {index} out of bounds"))
    };

    Ok(TransferChecked {
        amount,
        decimals,
        source: account(0)?,
        mint: account(1)?,
        destination: account(2)?,
        authority: account(3)?,
        token_program,
    })
}
