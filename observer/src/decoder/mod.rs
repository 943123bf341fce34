//! Bridge event decoding
//!
//! Raw logs are classified by their first topic against the chain's
//! [`EventSchema`] and their data is decoded into a typed [`DecodedEvent`].

pub mod schema;

pub use schema::{EventSchema, EventSignature, FieldShape};

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::to_checksum;
use tracing::trace;

use crate::{ChainId, DecodedEvent, EventKind, LogEntry, ObserverError, Provenance, Result};

/// Decodes the logs of one chain's bridge contract
#[derive(Debug, Clone)]
pub struct EventDecoder {
    chain: ChainId,
    schema: EventSchema,
}

impl EventDecoder {
    /// Create a decoder for a chain
    pub fn new(chain: ChainId, schema: EventSchema) -> Self {
        Self { chain, schema }
    }

    /// Get the schema in use
    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    /// Decode a log entry into a bridge event
    pub fn decode(&self, entry: &LogEntry) -> Result<DecodedEvent> {
        let topic = entry.topic.ok_or_else(|| ObserverError::UnknownSignature {
            topic: "anonymous".to_string(),
        })?;
        let signature = self
            .schema
            .lookup(&topic)
            .ok_or_else(|| ObserverError::UnknownSignature {
                topic: format!("{:?}", topic),
            })?;

        let tokens = abi::decode(&signature.params, entry.payload.as_ref())
            .map_err(|e| ObserverError::malformed(&signature.name, e.to_string()))?;

        trace!(
            chain = %self.chain,
            event = %signature.name,
            tx_hash = ?entry.transaction_id,
            "Decoded {} tokens",
            tokens.len()
        );

        let provenance = Provenance {
            chain: self.chain.clone(),
            transaction_id: entry.transaction_id,
            block_height: entry.block_height,
        };
        let mut fields = Fields::new(&signature.name, tokens);

        let event = match signature.kind {
            EventKind::Deposit => DecodedEvent::Deposit {
                sender: fields.address()?,
                source_chain: self.chain.clone(),
                recipient: fields.recipient()?,
                amount: fields.amount()?,
                destination_chain: fields.chain_ref()?,
                message: fields.message()?,
                provenance,
            },
            EventKind::Burn => DecodedEvent::Burn {
                sender: fields.address()?,
                source_chain: self.chain.clone(),
                recipient: fields.recipient()?,
                amount: fields.amount()?,
                destination_chain: fields.chain_ref()?,
                message: fields.message()?,
                provenance,
            },
            EventKind::Release => DecodedEvent::Release {
                recipient: fields.recipient()?,
                amount: fields.amount()?,
                provenance,
            },
            EventKind::MintConfirmation => DecodedEvent::MintConfirmation {
                recipient: fields.recipient()?,
                amount: fields.amount()?,
                correlation_hash: fields.hash()?,
                provenance,
            },
        };

        Ok(event)
    }
}

/// Positional reader over decoded ABI tokens
struct Fields<'a> {
    event: &'a str,
    tokens: std::vec::IntoIter<Token>,
    position: usize,
}

impl<'a> Fields<'a> {
    fn new(event: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            event,
            tokens: tokens.into_iter(),
            position: 0,
        }
    }

    fn next(&mut self) -> Result<Token> {
        let (event, position) = (self.event, self.position);
        self.position += 1;
        self.tokens
            .next()
            .ok_or_else(|| ObserverError::malformed(event, format!("missing field {}", position)))
    }

    fn mismatch(&self, expected: &str, found: &Token) -> ObserverError {
        ObserverError::malformed(
            self.event,
            format!(
                "field {} should be {}, found {:?}",
                self.position - 1,
                expected,
                found
            ),
        )
    }

    fn address(&mut self) -> Result<Address> {
        match self.next()? {
            Token::Address(address) => Ok(address),
            other => Err(self.mismatch("an address", &other)),
        }
    }

    fn recipient(&mut self) -> Result<String> {
        match self.next()? {
            Token::Address(address) => Ok(to_checksum(&address, None)),
            Token::String(recipient) => Ok(recipient),
            other => Err(self.mismatch("a recipient", &other)),
        }
    }

    fn amount(&mut self) -> Result<U256> {
        match self.next()? {
            Token::Uint(amount) => Ok(amount),
            other => Err(self.mismatch("an unsigned amount", &other)),
        }
    }

    fn chain_ref(&mut self) -> Result<ChainId> {
        match self.next()? {
            Token::Uint(id) => Ok(ChainId::new(id.to_string())),
            Token::String(name) => name
                .parse()
                .map_err(|_| ObserverError::malformed(self.event, "empty destination chain")),
            other => Err(self.mismatch("a chain reference", &other)),
        }
    }

    fn message(&mut self) -> Result<Bytes> {
        match self.next()? {
            Token::Bytes(bytes) => Ok(Bytes::from(bytes)),
            Token::String(text) => Ok(Bytes::from(text.into_bytes())),
            other => Err(self.mismatch("a message", &other)),
        }
    }

    fn hash(&mut self) -> Result<H256> {
        match self.next()? {
            Token::FixedBytes(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
            other => Err(self.mismatch("a 32-byte hash", &other)),
        }
    }
}
