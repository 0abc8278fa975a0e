//! Wharf - client upload orchestration for quilt-based blob storage
//!
//! Stores arbitrary byte payloads on a decentralized blob-storage
//! network, either user-paid through the full on-chain protocol or
//! publisher-funded through a single HTTP PUT.
//!
//! ## Components
//!
//! - **Encoder**: validates batches and encodes them into a bundle
//! - **Ledger**: builds and resolves register/certify transactions
//! - **Uploader**: pushes shard data to storage nodes
//! - **Orchestrator**: sequences the full user-paid pipeline
//! - **Resolver**: reads a stored bundle back into typed results
//! - **Publisher**: the wallet-free publisher-funded fallback
//!
//! Wallet signing and the concrete network/ledger clients are injected
//! boundaries; [`testing`] ships in-memory implementations.

pub mod config;
pub mod content_type;
pub mod encoder;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod publisher;
pub mod resolver;
pub mod signer;
pub mod storage;
pub mod testing;
pub mod uploader;

pub use config::{Network, NetworkConfig};
pub use content_type::{ContentType, CONTENT_TYPE_TAG};
pub use encoder::{filter_valid, EncodedBundle, UploadEncoder, UploadItem};
pub use error::{Result, UploadError};
pub use ledger::{
    fetch_display_balance, format_token_balance, Address, ChainContext, LedgerRpc,
    RegistrationTicket, TokenBalance, TransactionBuilder, TransactionKind, UnsignedTransaction,
    MAX_EPOCHS, TOKEN_DECIMALS,
};
pub use orchestrator::{BatchOutcome, UploadFailure, UploadOrchestrator, UploadPhase};
pub use publisher::PublisherClient;
pub use resolver::{ResultResolver, UploadResult};
pub use signer::{ensure_resolved, SignedTransactionResult, WalletSigner};
pub use storage::{
    BundleReader, FlowFile, StorageNetwork, StoredFile, StoredFileInfo, TransactionPayload,
    WriteFlow,
};
pub use uploader::StorageUploader;
