//! Local node identity.
//!
//! A node is identified by a libp2p [`Keypair`]; its public key determines the [`PeerId`].
//! Keys travel as standard base64 of the libp2p protobuf private key encoding, the
//! same textual form other libp2p implementations use in their config files.
//!
//! There is no keystore: printing a freshly generated key is the only way to keep an
//! identity across restarts.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use base64::{Engine, engine::general_purpose::STANDARD};
use libp2p::{
    PeerId,
    identity::{KeyType, Keypair},
};
use std::io::Write;

/// Protobuf tag of the `Type` field (field 1, varint) in a `PrivateKey` message.
const KEY_TYPE_TAG: u8 = 0x08;

/// Errors raised while obtaining the node identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Not base64, or not a protobuf private key.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Well-formed key material of a type nodes cannot use.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The key pair could not be serialized.
    #[error("failed to encode key: {0}")]
    Encode(#[source] libp2p::identity::DecodingError),

    /// The generated key could not be printed.
    #[error("failed to print key: {0}")]
    Io(#[from] std::io::Error),
}

/// The local node identity. Created once at startup and never regenerated.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    keypair: Keypair,
    peer_id: PeerId,
}

impl NodeIdentity {
    /// Wraps an existing key pair.
    pub fn new(keypair: Keypair) -> Self {
        let peer_id = keypair.public().to_peer_id();
        Self { keypair, peer_id }
    }

    /// Generates a fresh Ed25519 identity.
    pub fn generate() -> Self {
        Self::new(Keypair::generate_ed25519())
    }

    /// Decodes an identity from its base64 form.
    pub fn decode(encoded: &str) -> Result<Self, IdentityError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| IdentityError::InvalidKeyEncoding(e.to_string()))?;

        if let Some(name) = unsupported_type_tag(&bytes) {
            return Err(IdentityError::UnsupportedKeyType(name));
        }

        let keypair = Keypair::from_protobuf_encoding(&bytes)
            .map_err(|e| IdentityError::InvalidKeyEncoding(e.to_string()))?;

        match keypair.key_type() {
            KeyType::Ed25519 | KeyType::Ecdsa => Ok(Self::new(keypair)),
            other => Err(IdentityError::UnsupportedKeyType(format!("{other:?}"))),
        }
    }

    /// Encodes the private key as base64.
    pub fn encode(&self) -> Result<String, IdentityError> {
        let bytes = self
            .keypair
            .to_protobuf_encoding()
            .map_err(IdentityError::Encode)?;
        Ok(STANDARD.encode(bytes))
    }

    /// The key pair, for building the transport.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The peer id derived from the public key.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Logs the identity at startup.
    pub fn log(&self) {
        tracing::info!(peer_id = %self.peer_id, key_type = ?self.keypair.key_type(), "Node identity");
    }
}

/// Returns the identity for `encoded`, or generates one and writes its encoding to `out`.
///
/// The printed line is what an operator passes back with `--key` to keep the same
/// peer id across restarts.
pub fn obtain(encoded: Option<&str>, out: &mut impl Write) -> Result<NodeIdentity, IdentityError> {
    match encoded {
        Some(encoded) => NodeIdentity::decode(encoded),
        None => {
            let identity = NodeIdentity::generate();
            writeln!(out, "{}", identity.encode()?)?;
            out.flush()?;
            Ok(identity)
        }
    }
}

/// Generates a new key and returns its encoding without keeping it.
pub fn generate_encoded() -> Result<String, IdentityError> {
    NodeIdentity::generate().encode()
}

/// Recognizes key types this build cannot use from the protobuf header, so that they
/// are reported as unsupported rather than malformed.
fn unsupported_type_tag(bytes: &[u8]) -> Option<String> {
    let (&tag, rest) = bytes.split_first()?;
    let &ty = rest.first()?;
    if tag != KEY_TYPE_TAG || ty & 0x80 != 0 {
        return None;
    }
    match ty {
        // Ed25519, ECDSA
        1 | 3 => None,
        0 => Some("RSA".to_string()),
        2 => Some("Secp256k1".to_string()),
        n => Some(format!("unknown ({n})")),
    }
}
