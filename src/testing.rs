//! In-memory collaborators for tests and local development
//!
//! A complete fake of the storage network plus static ledger and
//! scripted signer implementations. The network fake is content
//! addressed the same way a real client would be, supports failure
//! injection for the upload step, and counts boundary calls so tests
//! can assert causal ordering (e.g. no upload after a rejected
//! signature).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::{Result, UploadError};
use crate::ledger::{Address, ChainContext, LedgerRpc, RegistrationTicket, TokenBalance, UnsignedTransaction};
use crate::signer::{ensure_resolved, SignedTransactionResult, WalletSigner};
use crate::storage::{
    BundleReader, FlowFile, StorageNetwork, StoredFile, StoredFileInfo, TransactionPayload,
    WriteFlow,
};

/// One file seeded into (or committed to) the in-memory network
#[derive(Debug, Clone)]
pub struct SeedFile {
    pub identifier: Option<String>,
    pub tags: HashMap<String, String>,
    pub bytes: Bytes,
}

#[derive(Default)]
struct NetworkState {
    bundles: HashMap<String, Vec<SeedFile>>,
    fail_upload: Option<String>,
    flow_starts: usize,
    upload_calls: usize,
    certify_calls: usize,
}

/// In-memory storage network
pub struct InMemoryStorageNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl InMemoryStorageNetwork {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState::default())),
        }
    }

    /// Insert a bundle directly, bypassing the write flow
    pub fn seed_bundle(&self, bundle_id: &str, files: Vec<SeedFile>) {
        self.state
            .lock()
            .unwrap()
            .bundles
            .insert(bundle_id.to_string(), files);
    }

    /// Make every subsequent shard upload fail with `UploadRejected`
    pub fn fail_uploads(&self, reason: &str) {
        self.state.lock().unwrap().fail_upload = Some(reason.to_string());
    }

    /// Number of write flows started
    pub fn flow_starts(&self) -> usize {
        self.state.lock().unwrap().flow_starts
    }

    /// Number of shard upload attempts
    pub fn upload_calls(&self) -> usize {
        self.state.lock().unwrap().upload_calls
    }

    /// Number of certify transaction builds
    pub fn certify_calls(&self) -> usize {
        self.state.lock().unwrap().certify_calls
    }
}

impl Default for InMemoryStorageNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageNetwork for InMemoryStorageNetwork {
    async fn start_write_flow(&self, files: Vec<FlowFile>) -> Result<Box<dyn WriteFlow>> {
        self.state.lock().unwrap().flow_starts += 1;
        Ok(Box::new(InMemoryWriteFlow {
            state: Arc::clone(&self.state),
            files,
            bundle_id: None,
            uploaded: false,
            certified: false,
        }))
    }

    async fn get_bundle(&self, bundle_id: &str) -> Result<Box<dyn BundleReader>> {
        let state = self.state.lock().unwrap();
        match state.bundles.get(bundle_id) {
            Some(files) => Ok(Box::new(InMemoryBundle {
                files: files.clone(),
            })),
            None => Err(UploadError::NetworkError(format!(
                "bundle not found: {}",
                bundle_id
            ))),
        }
    }
}

struct InMemoryWriteFlow {
    state: Arc<Mutex<NetworkState>>,
    files: Vec<FlowFile>,
    bundle_id: Option<String>,
    uploaded: bool,
    certified: bool,
}

#[async_trait::async_trait]
impl WriteFlow for InMemoryWriteFlow {
    async fn encode(&mut self) -> Result<()> {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.identifier.as_bytes());
            hasher.update(&file.contents);
        }
        self.bundle_id = Some(format!("quilt-{}", hex::encode(hasher.finalize())));
        Ok(())
    }

    fn register(&mut self, ticket: &RegistrationTicket) -> Result<TransactionPayload> {
        let bundle_id = self
            .bundle_id
            .as_ref()
            .ok_or_else(|| UploadError::NotReady("register before encode".to_string()))?;

        Ok(TransactionPayload {
            operation: "register_storage".to_string(),
            body: serde_json::json!({
                "bundle_id": bundle_id,
                "epochs": ticket.epochs,
                "owner": ticket.owner,
                "deletable": ticket.deletable,
            }),
        })
    }

    async fn upload(&mut self, register_digest: &str) -> Result<()> {
        if self.bundle_id.is_none() {
            return Err(UploadError::NotReady("upload before encode".to_string()));
        }
        if register_digest.is_empty() {
            return Err(UploadError::UploadRejected(
                "register digest not visible on-chain".to_string(),
            ));
        }

        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        if let Some(reason) = &state.fail_upload {
            return Err(UploadError::UploadRejected(reason.clone()));
        }

        self.uploaded = true;
        Ok(())
    }

    fn certify(&mut self) -> Result<TransactionPayload> {
        if !self.uploaded {
            return Err(UploadError::NotReady("certify before upload".to_string()));
        }
        let bundle_id = self
            .bundle_id
            .clone()
            .ok_or_else(|| UploadError::NotReady("certify before encode".to_string()))?;

        let files = self
            .files
            .iter()
            .map(|f| SeedFile {
                identifier: Some(f.identifier.clone()),
                tags: f.tags.clone(),
                bytes: f.contents.clone(),
            })
            .collect();

        let mut state = self.state.lock().unwrap();
        state.certify_calls += 1;
        state.bundles.insert(bundle_id.clone(), files);
        self.certified = true;

        Ok(TransactionPayload {
            operation: "certify_upload".to_string(),
            body: serde_json::json!({ "bundle_id": bundle_id }),
        })
    }

    async fn list_files(&self) -> Result<Vec<StoredFileInfo>> {
        if !self.certified {
            return Err(UploadError::NotReady("list_files before certify".to_string()));
        }
        let bundle_id = self
            .bundle_id
            .clone()
            .ok_or_else(|| UploadError::NotReady("list_files before encode".to_string()))?;

        Ok(self
            .files
            .iter()
            .map(|f| StoredFileInfo {
                bundle_id: bundle_id.clone(),
                identifier: f.identifier.clone(),
            })
            .collect())
    }
}

struct InMemoryBundle {
    files: Vec<SeedFile>,
}

#[async_trait::async_trait]
impl BundleReader for InMemoryBundle {
    async fn files(&self) -> Result<Vec<Box<dyn StoredFile>>> {
        Ok(self
            .files
            .iter()
            .cloned()
            .map(|f| Box::new(InMemoryStoredFile(f)) as Box<dyn StoredFile>)
            .collect())
    }
}

struct InMemoryStoredFile(SeedFile);

#[async_trait::async_trait]
impl StoredFile for InMemoryStoredFile {
    async fn identifier(&self) -> Result<Option<String>> {
        Ok(self.0.identifier.clone())
    }

    async fn tags(&self) -> Result<HashMap<String, String>> {
        Ok(self.0.tags.clone())
    }

    async fn bytes(&self) -> Result<Bytes> {
        Ok(self.0.bytes.clone())
    }
}

/// Ledger fake answering with fixed chain parameters and balance
pub struct StaticLedger {
    context: ChainContext,
    balance: u128,
    context_calls: AtomicUsize,
}

impl StaticLedger {
    pub fn new() -> Self {
        Self {
            context: ChainContext {
                epoch: 42,
                reference_gas_price: 1000,
            },
            balance: 0,
            context_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(balance: u128) -> Self {
        Self {
            balance,
            ..Self::new()
        }
    }

    /// Number of chain context fetches
    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerRpc for StaticLedger {
    async fn chain_context(&self) -> Result<ChainContext> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.context)
    }

    async fn get_balance(&self, _owner: &Address, coin_type: &str) -> Result<TokenBalance> {
        Ok(TokenBalance {
            coin_type: coin_type.to_string(),
            total_balance: self.balance,
        })
    }
}

fn fake_digest(tx: &UnsignedTransaction, sequence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tx.payload.operation.as_bytes());
    hasher.update(sequence.to_le_bytes());
    format!("tx-{}", &hex::encode(hasher.finalize())[..16])
}

/// Signer that approves every request
pub struct ApprovingSigner {
    calls: AtomicUsize,
}

impl ApprovingSigner {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of signature requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ApprovingSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WalletSigner for ApprovingSigner {
    async fn sign_and_execute(
        &self,
        tx: &UnsignedTransaction,
        _account: &Address,
        _chain_id: &str,
    ) -> Result<SignedTransactionResult> {
        ensure_resolved(tx)?;
        let sequence = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SignedTransactionResult {
            digest: fake_digest(tx, sequence),
        })
    }
}

/// Signer that approves the first `approve` requests, then rejects
pub struct RejectingSigner {
    approve: usize,
    calls: AtomicUsize,
}

impl RejectingSigner {
    /// Reject every request
    pub fn new() -> Self {
        Self::after(0)
    }

    /// Approve the first `approve` requests, reject the rest
    pub fn after(approve: usize) -> Self {
        Self {
            approve,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of signature requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for RejectingSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WalletSigner for RejectingSigner {
    async fn sign_and_execute(
        &self,
        tx: &UnsignedTransaction,
        _account: &Address,
        _chain_id: &str,
    ) -> Result<SignedTransactionResult> {
        ensure_resolved(tx)?;
        let sequence = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if sequence <= self.approve {
            Ok(SignedTransactionResult {
                digest: fake_digest(tx, sequence),
            })
        } else {
            Err(UploadError::UserRejected)
        }
    }
}

/// Signer standing in for "no wallet connected"
pub struct DisconnectedSigner;

#[async_trait::async_trait]
impl WalletSigner for DisconnectedSigner {
    async fn sign_and_execute(
        &self,
        _tx: &UnsignedTransaction,
        _account: &Address,
        _chain_id: &str,
    ) -> Result<SignedTransactionResult> {
        Err(UploadError::SignerUnavailable(
            "no wallet connected".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flow_enforces_ordering() {
        let network = InMemoryStorageNetwork::new();
        let mut flow = network.start_write_flow(vec![]).await.unwrap();

        let ticket = RegistrationTicket {
            epochs: 1,
            owner: format!("0x{}", "00".repeat(32)),
            deletable: true,
        };
        assert!(matches!(
            flow.register(&ticket),
            Err(UploadError::NotReady(_))
        ));
        assert!(matches!(flow.certify(), Err(UploadError::NotReady(_))));

        flow.encode().await.unwrap();
        assert!(flow.register(&ticket).is_ok());
        assert!(matches!(flow.certify(), Err(UploadError::NotReady(_))));

        flow.upload("tx-abc").await.unwrap();
        assert!(flow.certify().is_ok());
        assert_eq!(flow.list_files().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_bundle_ids_are_content_addressed() {
        let network = InMemoryStorageNetwork::new();

        let files = vec![FlowFile {
            identifier: "a.txt".to_string(),
            tags: HashMap::new(),
            contents: Bytes::from_static(b"hello"),
        }];

        let mut one = network.start_write_flow(files.clone()).await.unwrap();
        let mut two = network.start_write_flow(files).await.unwrap();
        one.encode().await.unwrap();
        two.encode().await.unwrap();

        let ticket = RegistrationTicket {
            epochs: 1,
            owner: format!("0x{}", "00".repeat(32)),
            deletable: true,
        };
        let body_one = one.register(&ticket).unwrap().body;
        let body_two = two.register(&ticket).unwrap().body;
        assert_eq!(body_one["bundle_id"], body_two["bundle_id"]);
    }
}
