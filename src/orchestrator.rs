//! User-paid upload orchestration
//!
//! Sequences one batch through the full protocol:
//! encode → register → sign → upload → certify → sign → resolve.
//!
//! Phases are strictly sequential; no phase begins before the prior
//! phase's side effect is confirmed. The two signature phases suspend
//! the pipeline on the wallet boundary; a declined or unavailable
//! signature moves the machine to `Failed` rather than leaving it stuck
//! mid-flight. No phase is retried automatically: the first failure
//! short-circuits with the originating error preserved, and the
//! register digest is carried along once registration has been signed
//! so the caller can retry the remaining phases manually.
//!
//! Observers subscribe to phase transitions over a broadcast channel;
//! the orchestrator knows nothing about presentation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NetworkConfig;
use crate::encoder::{filter_valid, EncodedBundle, UploadEncoder, UploadItem};
use crate::error::UploadError;
use crate::ledger::{Address, LedgerRpc, RegistrationTicket, TransactionBuilder};
use crate::resolver::{ResultResolver, UploadResult};
use crate::signer::{ensure_resolved, WalletSigner};
use crate::storage::StorageNetwork;
use crate::uploader::StorageUploader;

/// Pipeline state, one-directional with a terminal `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Idle,
    Encoding,
    Registering,
    AwaitingRegisterSignature,
    Uploading,
    Certifying,
    AwaitingCertifySignature,
    Resolving,
    Completed,
    Failed { reason: String },
}

impl std::fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadPhase::Idle => "idle",
            UploadPhase::Encoding => "encoding",
            UploadPhase::Registering => "registering",
            UploadPhase::AwaitingRegisterSignature => "awaiting-register-signature",
            UploadPhase::Uploading => "uploading",
            UploadPhase::Certifying => "certifying",
            UploadPhase::AwaitingCertifySignature => "awaiting-certify-signature",
            UploadPhase::Resolving => "resolving",
            UploadPhase::Completed => "completed",
            UploadPhase::Failed { .. } => "failed",
        };
        f.write_str(name)
    }
}

/// Aggregate of a fully completed orchestration run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The single externally addressable handle for the batch
    pub bundle_id: String,
    /// One result per valid input item
    pub results: Vec<UploadResult>,
    /// Digest of the register-storage transaction
    pub register_digest: String,
    /// Digest of the certify-upload transaction
    pub certify_digest: String,
}

/// Terminal error of an orchestration run
///
/// `register_digest` is populated for every failure at or after a
/// signed registration, so a caller holding an orphaned on-chain
/// reservation can retry the remaining phases against it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("upload failed during {phase} phase: {source}")]
pub struct UploadFailure {
    pub phase: UploadPhase,
    pub register_digest: Option<String>,
    #[source]
    pub source: UploadError,
}

/// Sequences one upload batch through the full user-paid protocol
///
/// One instance drives one pipeline at a time (`run` takes `&mut self`);
/// independent batches run on independent instances sharing only the
/// injected collaborator handles.
pub struct UploadOrchestrator {
    encoder: UploadEncoder,
    builder: TransactionBuilder,
    uploader: StorageUploader,
    resolver: ResultResolver,
    signer: Arc<dyn WalletSigner>,
    config: NetworkConfig,
    phase: UploadPhase,
    phase_tx: broadcast::Sender<UploadPhase>,
}

impl UploadOrchestrator {
    pub fn new(
        network: Arc<dyn StorageNetwork>,
        ledger: Arc<dyn LedgerRpc>,
        signer: Arc<dyn WalletSigner>,
        config: NetworkConfig,
    ) -> Self {
        let (phase_tx, _) = broadcast::channel(32);
        Self {
            encoder: UploadEncoder::new(Arc::clone(&network)),
            builder: TransactionBuilder::new(ledger, config.clone()),
            uploader: StorageUploader::new(config.clone()),
            resolver: ResultResolver::new(network, config.clone()),
            signer,
            config,
            phase: UploadPhase::Idle,
            phase_tx,
        }
    }

    /// Current pipeline state
    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    /// Subscribe to phase transitions
    pub fn subscribe_phases(&self) -> broadcast::Receiver<UploadPhase> {
        self.phase_tx.subscribe()
    }

    /// Run one batch to completion
    ///
    /// Invalid items (empty identifier, empty payload, duplicate
    /// identifier) are filtered out before orchestration begins; if
    /// nothing valid remains the run fails with `InvalidInput` without
    /// touching the network or the wallet.
    pub async fn run(
        &mut self,
        items: Vec<UploadItem>,
        ticket: RegistrationTicket,
    ) -> std::result::Result<BatchOutcome, UploadFailure> {
        self.phase = UploadPhase::Idle;

        match self.execute(items, &ticket).await {
            Ok(outcome) => {
                self.transition(UploadPhase::Completed);
                info!(
                    bundle_id = %outcome.bundle_id,
                    results = outcome.results.len(),
                    "Upload completed"
                );
                Ok(outcome)
            }
            Err(failure) => {
                warn!(
                    phase = %failure.phase,
                    error = %failure.source,
                    "Upload failed"
                );
                self.transition(UploadPhase::Failed {
                    reason: failure.source.to_string(),
                });
                Err(failure)
            }
        }
    }

    async fn execute(
        &mut self,
        items: Vec<UploadItem>,
        ticket: &RegistrationTicket,
    ) -> std::result::Result<BatchOutcome, UploadFailure> {
        let run_id = Uuid::new_v4();
        let items = filter_valid(items);
        info!(run_id = %run_id, items = items.len(), "Starting user-paid upload");

        self.transition(UploadPhase::Encoding);
        let mut bundle = self
            .encoder
            .encode(&items)
            .await
            .map_err(|e| self.failure(None, e))?;

        self.transition(UploadPhase::Registering);
        let register_tx = self
            .builder
            .build_register(&mut bundle, ticket)
            .await
            .map_err(|e| self.failure(None, e))?;
        let account = register_tx.sender.clone();

        self.transition(UploadPhase::AwaitingRegisterSignature);
        let register_digest = self
            .sign(&register_tx, &account)
            .await
            .map_err(|e| self.failure(None, e))?;
        info!(run_id = %run_id, digest = %register_digest, "Storage registered");

        self.transition(UploadPhase::Uploading);
        self.uploader
            .upload(&mut bundle, &register_digest)
            .await
            .map_err(|e| self.failure(Some(register_digest.clone()), e))?;

        self.transition(UploadPhase::Certifying);
        let certify_tx = self
            .builder
            .build_certify(&mut bundle, &account)
            .await
            .map_err(|e| self.failure(Some(register_digest.clone()), e))?;

        self.transition(UploadPhase::AwaitingCertifySignature);
        let certify_digest = self
            .sign(&certify_tx, &account)
            .await
            .map_err(|e| self.failure(Some(register_digest.clone()), e))?;
        info!(run_id = %run_id, digest = %certify_digest, "Upload certified");

        self.transition(UploadPhase::Resolving);
        let outcome = self
            .resolve_outcome(&bundle, register_digest, certify_digest)
            .await
            .map_err(|(digest, e)| self.failure(Some(digest), e))?;

        Ok(outcome)
    }

    async fn sign(
        &self,
        tx: &crate::ledger::UnsignedTransaction,
        account: &Address,
    ) -> crate::error::Result<String> {
        ensure_resolved(tx)?;
        let signed = self
            .signer
            .sign_and_execute(tx, account, self.config.network.chain_id())
            .await?;
        Ok(signed.digest)
    }

    async fn resolve_outcome(
        &self,
        bundle: &EncodedBundle,
        register_digest: String,
        certify_digest: String,
    ) -> std::result::Result<BatchOutcome, (String, UploadError)> {
        let files = bundle
            .list_files()
            .await
            .map_err(|e| (register_digest.clone(), e))?;

        let bundle_id = files
            .first()
            .map(|f| f.bundle_id.clone())
            .ok_or_else(|| {
                (
                    register_digest.clone(),
                    UploadError::UnexpectedResponseFormat(
                        "flow reported no stored files".to_string(),
                    ),
                )
            })?;

        let results = self
            .resolver
            .resolve(&bundle_id)
            .await
            .map_err(|e| (register_digest.clone(), e))?;

        if results.len() != bundle.item_count() {
            return Err((
                register_digest,
                UploadError::UnexpectedResponseFormat(format!(
                    "bundle holds {} files but {} items were uploaded",
                    results.len(),
                    bundle.item_count()
                )),
            ));
        }

        Ok(BatchOutcome {
            bundle_id,
            results,
            register_digest,
            certify_digest,
        })
    }

    fn failure(&self, register_digest: Option<String>, source: UploadError) -> UploadFailure {
        UploadFailure {
            phase: self.phase.clone(),
            register_digest,
            source,
        }
    }

    fn transition(&mut self, phase: UploadPhase) {
        self.phase = phase.clone();
        let _ = self.phase_tx.send(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_type::ContentType;
    use crate::testing::{ApprovingSigner, InMemoryStorageNetwork, StaticLedger};

    fn owner() -> String {
        format!("0x{}", "cd".repeat(32))
    }

    fn orchestrator(
        network: Arc<InMemoryStorageNetwork>,
        signer: Arc<dyn WalletSigner>,
    ) -> UploadOrchestrator {
        UploadOrchestrator::new(
            network,
            Arc::new(StaticLedger::new()),
            signer,
            NetworkConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_phase_sequence_on_success() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        let mut orch = orchestrator(Arc::clone(&network), Arc::new(ApprovingSigner::new()));
        let mut phases = orch.subscribe_phases();

        let items = vec![UploadItem::new("a.txt", ContentType::Text, "hello".as_bytes())];
        let ticket = RegistrationTicket {
            epochs: 3,
            owner: owner(),
            deletable: true,
        };
        orch.run(items, ticket).await.unwrap();

        let mut observed = Vec::new();
        while let Ok(phase) = phases.try_recv() {
            observed.push(phase);
        }
        assert_eq!(
            observed,
            vec![
                UploadPhase::Encoding,
                UploadPhase::Registering,
                UploadPhase::AwaitingRegisterSignature,
                UploadPhase::Uploading,
                UploadPhase::Certifying,
                UploadPhase::AwaitingCertifySignature,
                UploadPhase::Resolving,
                UploadPhase::Completed,
            ]
        );
        assert_eq!(orch.phase(), &UploadPhase::Completed);
    }

    #[tokio::test]
    async fn test_certify_requires_upload() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        network.fail_uploads("node refused digest");
        let mut orch = orchestrator(Arc::clone(&network), Arc::new(ApprovingSigner::new()));

        let items = vec![UploadItem::new("a.txt", ContentType::Text, "hello".as_bytes())];
        let ticket = RegistrationTicket {
            epochs: 1,
            owner: owner(),
            deletable: true,
        };
        let failure = orch.run(items, ticket).await.unwrap_err();

        assert_eq!(failure.phase, UploadPhase::Uploading);
        assert!(failure.register_digest.is_some());
        assert!(matches!(failure.source, UploadError::UploadRejected(_)));
        assert_eq!(network.certify_calls(), 0);
    }
}
