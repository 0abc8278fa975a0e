//! Wallet signer boundary
//!
//! Signing is human-in-the-loop and lives outside this crate: a wallet
//! implementation signs a resolved transaction and submits it, returning
//! the transaction digest. The pipeline never retries a rejected
//! signature; rejection aborts the whole orchestration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UploadError};
use crate::ledger::{Address, UnsignedTransaction};

/// Proof of a signed and submitted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransactionResult {
    /// Digest of the submitted transaction
    pub digest: String,
}

/// Wallet boundary, injected into the orchestrator
#[async_trait::async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign a resolved transaction with the given account and submit it
    ///
    /// Fails with `UserRejected` when the user declines and
    /// `SignerUnavailable` when no wallet is connected.
    async fn sign_and_execute(
        &self,
        tx: &UnsignedTransaction,
        account: &Address,
        chain_id: &str,
    ) -> Result<SignedTransactionResult>;
}

/// Guard shared by signer implementations: an unresolved transaction
/// must never be signed, its fee structure is not yet bound to chain
/// state.
pub fn ensure_resolved(tx: &UnsignedTransaction) -> Result<()> {
    if !tx.is_resolved() {
        return Err(UploadError::NotReady(
            "transaction not resolved against chain state".to_string(),
        ));
    }
    Ok(())
}
