//! Optional whole-frame encryption.
//!
//! When a session is configured with key material, every outbound page
//! is sealed with XChaCha20-Poly1305 before it reaches the transport and
//! every inbound frame is opened before it reaches the codec.
//!
//! ## Sealed layout
//!
//! ```text
//! nonce:       [u8; 24]  random per frame
//! ciphertext:  [u8]      frame bytes + 16-byte tag
//! ```

use bytes::Bytes;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::error::{Error, Result};

/// BLAKE3 derivation context for the frame key.
const KEY_CONTEXT: &str = "vizlink 2024-06 session frame cipher key";

/// Size of the per-frame nonce prefix.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

// ── FrameCipher ──────────────────────────────────────────────────

/// Symmetric cipher keyed by a session-scoped secret.
pub struct FrameCipher {
    aead: XChaCha20Poly1305,
}

impl FrameCipher {
    /// Derive a frame key from arbitrary key material.
    pub fn new(key_material: &str) -> Result<Self> {
        if key_material.is_empty() {
            return Err(Error::Config("encryption key must not be empty".into()));
        }
        let key = blake3::derive_key(KEY_CONTEXT, key_material.as_bytes());
        Ok(Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// Encrypt a whole frame under a fresh random nonce.
    pub fn seal(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), frame)
            .map_err(|_| Error::Cipher("frame encryption failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt and authenticate a sealed frame.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Cipher("sealed frame shorter than nonce and tag"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.aead
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Cipher("frame authentication failed (wrong key or corrupted channel)"))
    }
}

impl std::fmt::Debug for FrameCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCipher").finish_non_exhaustive()
    }
}

// ── CipherAdapter ────────────────────────────────────────────────

/// Identity when no key is configured, [`FrameCipher`] otherwise.
#[derive(Debug, Default)]
pub enum CipherAdapter {
    #[default]
    Plain,
    Sealed(FrameCipher),
}

impl CipherAdapter {
    /// Build from optional key material.
    pub fn from_key(key_material: Option<&str>) -> Result<Self> {
        match key_material {
            Some(key) => Ok(Self::Sealed(FrameCipher::new(key)?)),
            None => Ok(Self::Plain),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }

    /// Encrypt an outbound frame.
    pub fn wrap(&self, frame: Bytes) -> Result<Bytes> {
        match self {
            Self::Plain => Ok(frame),
            Self::Sealed(cipher) => cipher.seal(&frame).map(Bytes::from),
        }
    }

    /// Decrypt an inbound frame.
    pub fn unwrap(&self, frame: Bytes) -> Result<Bytes> {
        match self {
            Self::Plain => Ok(frame),
            Self::Sealed(cipher) => cipher.open(&frame).map(Bytes::from),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let cipher = FrameCipher::new("correct horse battery staple").unwrap();
        let sealed = cipher.seal(b"frame bytes").unwrap();

        assert_eq!(sealed.len(), NONCE_SIZE + b"frame bytes".len() + TAG_SIZE);
        assert_eq!(cipher.open(&sealed).unwrap(), b"frame bytes");
    }

    #[test]
    fn nonces_differ_per_frame() {
        let cipher = FrameCipher::new("k").unwrap();
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn wrong_key_is_fatal() {
        let sealed = FrameCipher::new("alpha").unwrap().seal(b"secret").unwrap();
        let err = FrameCipher::new("beta").unwrap().open(&sealed).unwrap_err();
        assert!(matches!(err, Error::Cipher(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let cipher = FrameCipher::new("k").unwrap();
        assert!(cipher.open(&[0u8; 10]).is_err());
    }

    #[test]
    fn plain_adapter_is_identity() {
        let adapter = CipherAdapter::from_key(None).unwrap();
        assert!(!adapter.is_enabled());
        let frame = Bytes::from_static(b"\x05\x00\x00\x00hello");
        assert_eq!(adapter.wrap(frame.clone()).unwrap(), frame);
        assert_eq!(adapter.unwrap(frame.clone()).unwrap(), frame);
    }

    #[test]
    fn sealed_adapter_roundtrip() {
        let adapter = CipherAdapter::from_key(Some("session key")).unwrap();
        let frame = Bytes::from_static(b"payload");
        let wrapped = adapter.wrap(frame.clone()).unwrap();
        assert_ne!(wrapped, frame);
        assert_eq!(adapter.unwrap(wrapped).unwrap(), frame);
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(FrameCipher::new(""), Err(Error::Config(_))));
    }
}
