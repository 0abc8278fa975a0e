//! Storage network boundary
//!
//! Traits the upload pipeline depends on, implemented by a concrete
//! network client (or by the in-memory fakes in [`crate::testing`]).
//! The wire format of shards and transactions is owned by the network's
//! own protocol; this crate only sequences the calls.
//!
//! ## Write flow
//!
//! 1. `start_write_flow(files)` opens a flow over a fixed file list
//! 2. `encode()` performs client-side encoding (erasure coding/sharding)
//! 3. `register(ticket)` yields the register-storage transaction payload
//! 4. `upload(digest)` pushes shard data, proving payment with the digest
//! 5. `certify()` yields the certify-upload transaction payload
//! 6. `list_files()` reports the stored files and their bundle id

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::RegistrationTicket;

/// One file handed to the write flow: identifier, tags, raw contents
#[derive(Debug, Clone)]
pub struct FlowFile {
    pub identifier: String,
    pub tags: HashMap<String, String>,
    pub contents: Bytes,
}

/// Opaque transaction payload produced by the flow
///
/// The network client owns the encoding; the ledger layer wraps this
/// into an [`crate::ledger::UnsignedTransaction`] and binds it to live
/// chain state before signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Operation name as the network protocol spells it
    pub operation: String,
    /// Protocol-owned transaction body
    pub body: serde_json::Value,
}

/// A stored file as reported by the flow after certification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFileInfo {
    /// Bundle the file landed in
    pub bundle_id: String,
    /// File identifier within the bundle
    pub identifier: String,
}

/// Client handle for one storage network
#[async_trait::async_trait]
pub trait StorageNetwork: Send + Sync {
    /// Open a write flow over a fixed list of files
    async fn start_write_flow(&self, files: Vec<FlowFile>) -> Result<Box<dyn WriteFlow>>;

    /// Fetch a stored bundle by id
    async fn get_bundle(&self, bundle_id: &str) -> Result<Box<dyn BundleReader>>;
}

/// One in-progress write of a batch of files
#[async_trait::async_trait]
pub trait WriteFlow: Send + Sync {
    /// Client-side encoding; must complete before registration
    async fn encode(&mut self) -> Result<()>;

    /// Build the register-storage transaction payload
    fn register(&mut self, ticket: &RegistrationTicket) -> Result<TransactionPayload>;

    /// Push shard data to storage nodes, authorized by the register digest
    async fn upload(&mut self, register_digest: &str) -> Result<()>;

    /// Build the certify-upload transaction payload; requires upload done
    fn certify(&mut self) -> Result<TransactionPayload>;

    /// List stored files; available once the flow has been certified
    async fn list_files(&self) -> Result<Vec<StoredFileInfo>>;
}

/// Read handle for a stored bundle
#[async_trait::async_trait]
pub trait BundleReader: Send + Sync {
    /// Enumerate the bundle's constituent files
    async fn files(&self) -> Result<Vec<Box<dyn StoredFile>>>;
}

/// Read handle for one file inside a bundle
#[async_trait::async_trait]
pub trait StoredFile: Send + Sync {
    /// File identifier, if the bundle recorded one
    async fn identifier(&self) -> Result<Option<String>>;

    /// Tag map attached at write time
    async fn tags(&self) -> Result<HashMap<String, String>>;

    /// The file's payload bytes
    async fn bytes(&self) -> Result<Bytes>;
}
