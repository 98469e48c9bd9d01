// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption envelope codec.
//!
//! Clients encrypt a note before upload: a KEM encapsulation against the
//! owner's public key yields a shared secret, the content key is wrapped
//! under it, and the body is encrypted under the content key. This module
//! only checks that the four parts are present and turns the text-safe
//! body into raw bytes for the blob store.
//!
//! ## Security Note
//!
//! **DO NOT** add decryption or verification here. The KEM private key
//! never leaves the client; the server stores what it is given and hands
//! it back unchanged.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::models::OwnerId;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Standard alphabet, padding optional.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// URL-safe alphabet, padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Hex characters of the owner digest used to namespace blob names.
const OWNER_NAMESPACE_LEN: usize = 16;

/// Structural problems with a submitted envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("encrypted content is not valid base64: {0}")]
    InvalidEncoding(String),

    #[error("encrypted content is empty")]
    EmptyContent,

    #[error("encrypted content is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
}

/// The four-part envelope as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionEnvelope {
    /// KEM ciphertext.
    #[serde(default)]
    pub encapsulated_key: String,
    /// Content key wrapped under the KEM shared secret.
    #[serde(default, alias = "encryptedSymmetricKey")]
    pub wrapped_symmetric_key: String,
    /// Encrypted body, base64 encoded.
    #[serde(default)]
    pub encrypted_content: String,
    /// Client-side integrity hash over the plaintext.
    #[serde(default)]
    pub record_hash: String,
}

/// An envelope whose body has been decoded to the bytes kept at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
    pub encapsulated_key: String,
    pub wrapped_symmetric_key: String,
    pub content: Vec<u8>,
    pub record_hash: String,
}

impl std::fmt::Debug for DecodedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedEnvelope")
            .field("content_len", &self.content.len())
            .field("record_hash", &self.record_hash)
            .finish_non_exhaustive()
    }
}

impl EncryptionEnvelope {
    /// Check presence of every part, then decode the body.
    pub fn decode(self, max_content_bytes: usize) -> Result<DecodedEnvelope, EnvelopeError> {
        require("encapsulatedKey", &self.encapsulated_key)?;
        require("wrappedSymmetricKey", &self.wrapped_symmetric_key)?;
        require("encryptedContent", &self.encrypted_content)?;
        require("recordHash", &self.record_hash)?;

        let compact = strip_whitespace(&self.encrypted_content);

        // base64 expands by 4/3; reject before allocating for the decode
        let estimated = compact.len() / 4 * 3;
        if estimated > max_content_bytes.saturating_add(3) {
            return Err(EnvelopeError::TooLarge {
                size: estimated,
                max: max_content_bytes,
            });
        }

        let content = decode_compact(&compact)?;
        if content.len() > max_content_bytes {
            return Err(EnvelopeError::TooLarge {
                size: content.len(),
                max: max_content_bytes,
            });
        }

        Ok(DecodedEnvelope {
            encapsulated_key: self.encapsulated_key,
            wrapped_symmetric_key: self.wrapped_symmetric_key,
            content,
            record_hash: self.record_hash,
        })
    }
}

fn require(name: &'static str, value: &str) -> Result<(), EnvelopeError> {
    if value.trim().is_empty() {
        Err(EnvelopeError::MissingField(name))
    } else {
        Ok(())
    }
}

/// Decode a base64 text payload into raw ciphertext bytes.
///
/// Accepts the standard and URL-safe alphabets, with or without padding.
/// Embedded whitespace (line-wrapped base64) is ignored.
pub fn decode_content(wire: &str) -> Result<Vec<u8>, EnvelopeError> {
    decode_compact(&strip_whitespace(wire))
}

fn strip_whitespace(wire: &str) -> String {
    wire.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn decode_compact(compact: &str) -> Result<Vec<u8>, EnvelopeError> {
    if compact.is_empty() {
        return Err(EnvelopeError::EmptyContent);
    }

    let bytes = STANDARD_LENIENT
        .decode(compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(compact))
        .map_err(|e| EnvelopeError::InvalidEncoding(e.to_string()))?;

    if bytes.is_empty() {
        return Err(EnvelopeError::EmptyContent);
    }
    Ok(bytes)
}

/// Deterministic display name for a note's ciphertext in the blob store.
///
/// Namespaced by a digest of the owner so operators can group blobs per
/// user without the name revealing who the user is or what the note holds.
pub fn blob_name_for(owner: &OwnerId, document_id: &str, timestamp: DateTime<Utc>) -> String {
    let digest = format!("{:x}", Sha256::digest(owner.as_str().as_bytes()));
    format!(
        "notes/{}/{}-{}.enc",
        &digest[..OWNER_NAMESPACE_LEN],
        document_id,
        timestamp.timestamp_millis()
    )
}
