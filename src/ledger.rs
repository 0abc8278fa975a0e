//! Ledger transaction building
//!
//! Builds the two on-chain transactions of the upload protocol:
//! register-storage (reserve and pay for space) and certify-upload
//! (confirm off-chain data placement). Transactions are built in two
//! phases: construct the payload from the flow, then resolve it against
//! live chain state fetched over the [`LedgerRpc`] boundary. Fee and
//! structure depend on live network parameters, so an unresolved
//! transaction must never reach a signer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::encoder::EncodedBundle;
use crate::error::{Result, UploadError};
use crate::storage::TransactionPayload;

/// Platform maximum for storage duration, in epochs
pub const MAX_EPOCHS: u32 = 10;

/// Decimal places of the network's storage token
pub const TOKEN_DECIMALS: u32 = 9;

/// A ledger account address: 0x-prefixed, 32 bytes of hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address string
    pub fn parse(s: &str) -> Result<Address> {
        let hex_part = s
            .strip_prefix("0x")
            .ok_or_else(|| UploadError::InvalidInput(format!("address missing 0x prefix: {}", s)))?;

        if hex_part.len() != 64 {
            return Err(UploadError::InvalidInput(format!(
                "address must be 32 bytes of hex, got {} chars",
                hex_part.len()
            )));
        }

        hex::decode(hex_part)
            .map_err(|e| UploadError::InvalidInput(format!("address is not hex: {}", e)))?;

        Ok(Address(format!("0x{}", hex_part.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Address> {
        Address::parse(s)
    }
}

/// Storage duration and ownership terms for a registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationTicket {
    /// Storage duration in whole epochs, 1..=MAX_EPOCHS
    pub epochs: u32,
    /// Account that will own the storage object
    pub owner: String,
    /// Whether the stored bundle may be deleted before expiry
    pub deletable: bool,
}

impl RegistrationTicket {
    /// Check duration bounds and owner address validity
    pub fn validate(&self) -> Result<()> {
        if self.epochs < 1 || self.epochs > MAX_EPOCHS {
            return Err(UploadError::InvalidTicket(format!(
                "epochs must be between 1 and {}, got {}",
                MAX_EPOCHS, self.epochs
            )));
        }

        if Address::parse(&self.owner).is_err() {
            return Err(UploadError::InvalidTicket(format!(
                "owner is not a valid address: {}",
                self.owner
            )));
        }

        Ok(())
    }

    /// The owner as a typed address; call after `validate`
    pub fn owner_address(&self) -> Result<Address> {
        Address::parse(&self.owner)
            .map_err(|_| UploadError::InvalidTicket(format!("owner is not a valid address: {}", self.owner)))
    }
}

/// Which on-chain operation a transaction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    RegisterStorage,
    CertifyUpload,
}

/// Live chain parameters a transaction must be bound to before signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    /// Current network epoch
    pub epoch: u64,
    /// Reference gas price in base token units
    pub reference_gas_price: u64,
}

/// Balance of one coin type for one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub coin_type: String,
    pub total_balance: u128,
}

/// Read access to the ledger, injected into the pipeline
#[async_trait::async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Current chain parameters for transaction resolution
    async fn chain_context(&self) -> Result<ChainContext>;

    /// Total balance of a coin type held by an owner
    async fn get_balance(&self, owner: &Address, coin_type: &str) -> Result<TokenBalance>;
}

/// An unsigned transaction, possibly not yet bound to chain state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub kind: TransactionKind,
    pub sender: Address,
    pub payload: TransactionPayload,
    context: Option<ChainContext>,
}

impl UnsignedTransaction {
    pub fn new(kind: TransactionKind, sender: Address, payload: TransactionPayload) -> Self {
        Self {
            kind,
            sender,
            payload,
            context: None,
        }
    }

    /// Whether the transaction has been bound to live chain state
    pub fn is_resolved(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&ChainContext> {
        self.context.as_ref()
    }

    fn bind(&mut self, context: ChainContext) {
        self.context = Some(context);
    }
}

/// Builds register and certify transactions for an encoded bundle
pub struct TransactionBuilder {
    ledger: Arc<dyn LedgerRpc>,
    config: NetworkConfig,
}

impl TransactionBuilder {
    pub fn new(ledger: Arc<dyn LedgerRpc>, config: NetworkConfig) -> Self {
        Self { ledger, config }
    }

    /// Build and resolve the register-storage transaction
    ///
    /// Fails with `InvalidTicket` on out-of-range epochs or a malformed
    /// owner address, before touching the flow or the ledger.
    pub async fn build_register(
        &self,
        bundle: &mut EncodedBundle,
        ticket: &RegistrationTicket,
    ) -> Result<UnsignedTransaction> {
        ticket.validate()?;
        let sender = ticket.owner_address()?;

        let payload = bundle.flow_mut().register(ticket)?;
        let mut tx = UnsignedTransaction::new(TransactionKind::RegisterStorage, sender, payload);
        self.resolve(&mut tx).await?;

        debug!(
            kind = ?tx.kind,
            sender = %tx.sender,
            epochs = ticket.epochs,
            "Register transaction built"
        );
        Ok(tx)
    }

    /// Build and resolve the certify-upload transaction
    ///
    /// Only callable once shard upload has completed; fails with
    /// `NotReady` otherwise.
    pub async fn build_certify(
        &self,
        bundle: &mut EncodedBundle,
        sender: &Address,
    ) -> Result<UnsignedTransaction> {
        if !bundle.is_uploaded() {
            return Err(UploadError::NotReady(
                "certify requested before upload completed".to_string(),
            ));
        }

        let payload = bundle.flow_mut().certify()?;
        let mut tx = UnsignedTransaction::new(TransactionKind::CertifyUpload, sender.clone(), payload);
        self.resolve(&mut tx).await?;

        debug!(kind = ?tx.kind, sender = %tx.sender, "Certify transaction built");
        Ok(tx)
    }

    /// Bind a constructed transaction to current chain state
    pub async fn resolve(&self, tx: &mut UnsignedTransaction) -> Result<()> {
        let context = tokio::time::timeout(self.config.request_timeout, self.ledger.chain_context())
            .await
            .map_err(|_| UploadError::NetworkError("chain context fetch timed out".to_string()))??;

        tx.bind(context);
        Ok(())
    }
}

/// Format a raw token amount for display with three decimal places
pub fn format_token_balance(raw: u128, decimals: u32) -> String {
    let unit = 10u128.pow(decimals);
    let whole = raw / unit;
    let frac_scale = 10u128.pow(decimals.saturating_sub(3)).max(1);
    let milli = (raw % unit) / frac_scale;
    format!("{}.{:03}", whole, milli)
}

/// Fetch and format an owner's balance of one coin type
pub async fn fetch_display_balance(
    ledger: &dyn LedgerRpc,
    owner: &Address,
    coin_type: &str,
) -> Result<String> {
    let balance = ledger.get_balance(owner, coin_type).await?;
    Ok(format_token_balance(balance.total_balance, TOKEN_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_owner() -> String {
        format!("0x{}", "ab".repeat(32))
    }

    #[test]
    fn test_address_parse() {
        let addr = Address::parse(&test_owner()).unwrap();
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 66);

        assert!(Address::parse("not-an-address").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse(&format!("0x{}", "zz".repeat(32))).is_err());
    }

    #[test]
    fn test_address_normalizes_case() {
        let upper = format!("0x{}", "AB".repeat(32));
        let addr = Address::parse(&upper).unwrap();
        assert_eq!(addr.as_str(), test_owner());
    }

    #[test]
    fn test_ticket_epoch_bounds() {
        let mut ticket = RegistrationTicket {
            epochs: 0,
            owner: test_owner(),
            deletable: true,
        };
        assert!(matches!(
            ticket.validate(),
            Err(UploadError::InvalidTicket(_))
        ));

        ticket.epochs = 11;
        assert!(matches!(
            ticket.validate(),
            Err(UploadError::InvalidTicket(_))
        ));

        for epochs in 1..=10 {
            ticket.epochs = epochs;
            assert!(ticket.validate().is_ok(), "epochs {} should be valid", epochs);
        }
    }

    #[test]
    fn test_ticket_owner_validation() {
        let ticket = RegistrationTicket {
            epochs: 3,
            owner: "nobody".to_string(),
            deletable: false,
        };
        assert!(matches!(
            ticket.validate(),
            Err(UploadError::InvalidTicket(_))
        ));
    }

    #[test]
    fn test_unresolved_until_bound() {
        let payload = TransactionPayload {
            operation: "register_storage".to_string(),
            body: serde_json::json!({}),
        };
        let mut tx = UnsignedTransaction::new(
            TransactionKind::RegisterStorage,
            Address::parse(&test_owner()).unwrap(),
            payload,
        );
        assert!(!tx.is_resolved());

        tx.bind(ChainContext {
            epoch: 7,
            reference_gas_price: 1000,
        });
        assert!(tx.is_resolved());
        assert_eq!(tx.context().unwrap().epoch, 7);
    }

    #[test]
    fn test_format_token_balance() {
        assert_eq!(format_token_balance(0, TOKEN_DECIMALS), "0.000");
        assert_eq!(format_token_balance(1_234_567_890, TOKEN_DECIMALS), "1.234");
        assert_eq!(format_token_balance(5_000_000_000, TOKEN_DECIMALS), "5.000");
        assert_eq!(format_token_balance(999_999_999, TOKEN_DECIMALS), "0.999");
    }

    #[tokio::test]
    async fn test_build_register_resolves_transaction() {
        use crate::content_type::ContentType;
        use crate::encoder::{UploadEncoder, UploadItem};
        use crate::testing::{InMemoryStorageNetwork, StaticLedger};

        let network = Arc::new(InMemoryStorageNetwork::new());
        let encoder = UploadEncoder::new(network);
        let mut bundle = encoder
            .encode(&[UploadItem::new("a.txt", ContentType::Text, "hello".as_bytes())])
            .await
            .unwrap();

        let builder = TransactionBuilder::new(
            Arc::new(StaticLedger::new()),
            crate::config::NetworkConfig::default(),
        );

        let bad_ticket = RegistrationTicket {
            epochs: 0,
            owner: test_owner(),
            deletable: true,
        };
        assert!(matches!(
            builder.build_register(&mut bundle, &bad_ticket).await,
            Err(UploadError::InvalidTicket(_))
        ));

        let ticket = RegistrationTicket {
            epochs: 3,
            owner: test_owner(),
            deletable: true,
        };
        let tx = builder.build_register(&mut bundle, &ticket).await.unwrap();
        assert!(tx.is_resolved());
        assert_eq!(tx.kind, TransactionKind::RegisterStorage);
        assert_eq!(tx.sender.as_str(), test_owner());

        // Certify is out of order until the upload has completed
        let sender = tx.sender.clone();
        assert!(matches!(
            builder.build_certify(&mut bundle, &sender).await,
            Err(UploadError::NotReady(_))
        ));
    }

    #[test]
    fn test_fetch_display_balance() {
        use crate::testing::StaticLedger;

        let ledger = StaticLedger::with_balance(1_234_567_890);
        let owner = Address::parse(&test_owner()).unwrap();

        let display =
            tokio_test::block_on(fetch_display_balance(&ledger, &owner, "0x2::tok::TOK")).unwrap();
        assert_eq!(display, "1.234");
    }
}
