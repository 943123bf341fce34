//! Event schemas: canonical signatures and their precomputed topic hashes

use ethers::abi::{param_type::Reader, ParamType};
use ethers::types::H256;
use ethers::utils::keccak256;
use std::collections::HashMap;

use crate::{config::SchemaConfig, EventKind, ObserverError, Result};

/// Role a positional event parameter plays when building a decoded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// EVM address of the account that initiated a transfer
    Sender,
    /// Recipient, either an EVM address or a foreign address string
    Recipient,
    /// Unsigned token amount
    Amount,
    /// Destination chain, either a numeric id or a name
    ChainRef,
    /// Free-form message, either bytes or a string
    Message,
    /// 32-byte correlation hash
    Hash,
}

impl FieldShape {
    /// Whether a parameter type can carry this field
    pub fn accepts(&self, param: &ParamType) -> bool {
        match self {
            FieldShape::Sender => matches!(param, ParamType::Address),
            FieldShape::Recipient => matches!(param, ParamType::Address | ParamType::String),
            FieldShape::Amount => matches!(param, ParamType::Uint(_)),
            FieldShape::ChainRef => matches!(param, ParamType::Uint(_) | ParamType::String),
            FieldShape::Message => matches!(param, ParamType::Bytes | ParamType::String),
            FieldShape::Hash => matches!(param, ParamType::FixedBytes(32)),
        }
    }
}

/// Positional field layout of each event kind
pub fn field_layout(kind: EventKind) -> &'static [FieldShape] {
    use FieldShape::*;
    match kind {
        EventKind::Deposit => &[Sender, Recipient, Amount, ChainRef, Message],
        EventKind::Burn => &[Sender, Recipient, Amount, ChainRef, Message],
        EventKind::Release => &[Recipient, Amount],
        EventKind::MintConfirmation => &[Recipient, Amount, Hash],
    }
}

/// A parsed event signature
#[derive(Debug, Clone, PartialEq)]
pub struct EventSignature {
    pub kind: EventKind,
    pub name: String,
    pub params: Vec<ParamType>,
    /// Normalized signature, e.g. `Unlock(address,uint256)`
    pub canonical: String,
    /// keccak-256 of the canonical signature
    pub topic: H256,
}

impl EventSignature {
    /// Parse and validate a signature for the given event kind
    pub fn parse(kind: EventKind, signature: &str) -> Result<Self> {
        let signature = signature.trim();
        let signature = signature.strip_prefix("event ").unwrap_or(signature).trim();

        let open = signature
            .find('(')
            .ok_or_else(|| ObserverError::schema(format!("missing '(' in {}", signature)))?;
        if !signature.ends_with(')') {
            return Err(ObserverError::schema(format!("missing ')' in {}", signature)));
        }

        let name = signature[..open].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ObserverError::schema(format!("invalid event name in {}", signature)));
        }

        let inner = &signature[open + 1..signature.len() - 1];
        let params = split_top_level(inner)
            .into_iter()
            .map(|param| parse_param(param, signature))
            .collect::<Result<Vec<_>>>()?;

        let layout = field_layout(kind);
        if params.len() != layout.len() {
            return Err(ObserverError::schema(format!(
                "{} expects {} parameters, {} has {}",
                kind,
                layout.len(),
                signature,
                params.len()
            )));
        }
        for (index, (shape, param)) in layout.iter().zip(&params).enumerate() {
            if !shape.accepts(param) {
                return Err(ObserverError::schema(format!(
                    "parameter {} of {} cannot carry {:?}: found {}",
                    index, signature, shape, param
                )));
            }
        }

        let canonical = format!(
            "{}({})",
            name,
            params.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",")
        );
        let topic = H256::from(keccak256(canonical.as_bytes()));

        Ok(Self {
            kind,
            name: name.to_string(),
            params,
            canonical,
            topic,
        })
    }
}

/// Parse one parameter declaration such as `uint256 amount` or `(uint256, bytes) data`.
///
/// Indexed parameters are refused: their values travel in the log topics and
/// the decoder only reads the data section.
fn parse_param(param: &str, signature: &str) -> Result<ParamType> {
    let compact = compact_tuples(param);
    let mut words = compact.split_whitespace();
    let ty = words.next().unwrap_or_default();
    if words.any(|word| word == "indexed") {
        return Err(ObserverError::schema(format!(
            "indexed parameter {} in {} is not carried in the log data",
            param, signature
        )));
    }

    Reader::read(ty).map_err(|e| {
        ObserverError::schema(format!("invalid type {} in {}: {}", ty, signature, e))
    })
}

/// Remove whitespace nested inside parentheses
fn compact_tuples(param: &str) -> String {
    let mut depth = 0usize;
    param
        .chars()
        .filter(|c| {
            match *c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() => return depth == 0,
                _ => {}
            }
            true
        })
        .collect()
}

/// Split a parameter list on commas that are not nested in parentheses
fn split_top_level(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(inner[start..].trim());
    parts
}

/// The set of events one chain's bridge contract emits, keyed by topic hash.
///
/// Topic hashes are computed once when the schema is built.
#[derive(Debug, Clone)]
pub struct EventSchema {
    by_topic: HashMap<H256, EventSignature>,
}

impl EventSchema {
    /// Build a schema from configured signatures
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        let mut by_topic: HashMap<H256, EventSignature> = HashMap::new();
        for (kind, signature) in [
            (EventKind::Deposit, &config.deposit),
            (EventKind::Burn, &config.burn),
            (EventKind::Release, &config.release),
            (EventKind::MintConfirmation, &config.mint_confirmation),
        ] {
            let parsed = EventSignature::parse(kind, signature)?;
            if let Some(existing) = by_topic.get(&parsed.topic) {
                return Err(ObserverError::schema(format!(
                    "{} and {} share the signature {}",
                    existing.kind, kind, parsed.canonical
                )));
            }
            by_topic.insert(parsed.topic, parsed);
        }
        Ok(Self { by_topic })
    }

    /// Schema of the canonical bridge contract
    pub fn canonical() -> Self {
        CANONICAL_SCHEMA.clone()
    }

    /// Find the signature matching a log topic
    pub fn lookup(&self, topic: &H256) -> Option<&EventSignature> {
        self.by_topic.get(topic)
    }

    /// Get the signature configured for an event kind
    pub fn signature(&self, kind: EventKind) -> Option<&EventSignature> {
        self.by_topic.values().find(|sig| sig.kind == kind)
    }

}

static CANONICAL_SCHEMA: once_cell::sync::Lazy<EventSchema> = once_cell::sync::Lazy::new(|| {
    EventSchema::from_config(&SchemaConfig::default()).expect("Valid canonical bridge schema")
});
