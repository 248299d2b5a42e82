//! Pluggable datagram encryption.
//!
//! The fragmentation layer treats encryption as an opaque byte transform:
//! the sender encrypts each whole fragment (identifier included) and the
//! receiver decrypts before parsing. [`SharedSecretCipher`] is the built-in
//! shared-secret transform; callers can supply any other [`Cipher`].

use std::{fmt, sync::Arc};

use chacha20poly1305::{
    XChaCha20Poly1305,
    XNonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Shared secret length in bytes.
pub const SECRET_SIZE: usize = 32;
/// Random nonce prefixed to every ciphertext.
pub const NONCE_PREFIX_SIZE: usize = 24;
/// Poly1305 tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Errors raised by encryption capabilities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// The secret is not a 64-character hex string.
    #[error("shared secret must be {} hex characters", SECRET_SIZE * 2)]
    InvalidSecret,
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),
    /// Input was malformed or did not authenticate.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Byte transform applied to whole datagrams.
pub trait Cipher: Send + Sync {
    /// Encrypt one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encrypt`] if the transform fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decrypt`] on malformed or mismatched input.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Bytes added to every datagram by [`Cipher::encrypt`].
    fn overhead(&self) -> usize { 0 }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretKey([u8; SECRET_SIZE]);

/// XChaCha20-Poly1305 keyed by a shared secret.
///
/// Output layout: `[nonce(24) | ciphertext | tag(16)]`.
///
/// # Examples
///
/// ```
/// use udpfrag::cipher::{Cipher, SharedSecretCipher};
///
/// let cipher = SharedSecretCipher::new([7; 32]);
/// let sealed = cipher.encrypt(b"payload").expect("encrypt");
/// assert_eq!(sealed.len(), 7 + cipher.overhead());
/// assert_eq!(cipher.decrypt(&sealed).expect("decrypt"), b"payload");
/// ```
#[derive(Clone)]
pub struct SharedSecretCipher {
    key: SecretKey,
}

impl SharedSecretCipher {
    /// Build a cipher from raw key bytes.
    #[must_use]
    pub fn new(secret: [u8; SECRET_SIZE]) -> Self {
        Self {
            key: SecretKey(secret),
        }
    }

    /// Build a cipher from a 64-character hex secret.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidSecret`] when `secret` is not valid hex
    /// of the right length.
    pub fn from_hex(secret: &str) -> Result<Self, CipherError> {
        let mut bytes = hex::decode(secret).map_err(|_| CipherError::InvalidSecret)?;
        let key = <[u8; SECRET_SIZE]>::try_from(bytes.as_slice())
            .map_err(|_| CipherError::InvalidSecret);
        bytes.zeroize();
        key.map(Self::new)
    }

    fn aead(&self) -> XChaCha20Poly1305 { XChaCha20Poly1305::new((&self.key.0).into()) }
}

impl Cipher for SharedSecretCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0_u8; NONCE_PREFIX_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let sealed = self
            .aead()
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|err| CipherError::Encrypt(err.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_PREFIX_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < NONCE_PREFIX_SIZE + TAG_SIZE {
            return Err(CipherError::Decrypt(format!(
                "ciphertext of {} bytes is shorter than nonce and tag",
                ciphertext.len()
            )));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_PREFIX_SIZE);
        self.aead()
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|err| CipherError::Decrypt(err.to_string()))
    }

    fn overhead(&self) -> usize { NONCE_PREFIX_SIZE + TAG_SIZE }
}

impl fmt::Debug for SharedSecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretCipher").finish_non_exhaustive()
    }
}

/// Cipher assembled from a pair of caller-supplied functions.
pub struct FnCipher<E, D> {
    encrypt: E,
    decrypt: D,
    overhead: usize,
}

impl<E, D> FnCipher<E, D>
where
    E: Fn(&[u8]) -> Result<Vec<u8>, CipherError> + Send + Sync,
    D: Fn(&[u8]) -> Result<Vec<u8>, CipherError> + Send + Sync,
{
    /// Wrap `encrypt`/`decrypt`, declaring `overhead` bytes added per datagram.
    pub fn new(encrypt: E, decrypt: D, overhead: usize) -> Self {
        Self {
            encrypt,
            decrypt,
            overhead,
        }
    }
}

impl<E, D> Cipher for FnCipher<E, D>
where
    E: Fn(&[u8]) -> Result<Vec<u8>, CipherError> + Send + Sync,
    D: Fn(&[u8]) -> Result<Vec<u8>, CipherError> + Send + Sync,
{
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> { (self.encrypt)(plaintext) }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        (self.decrypt)(ciphertext)
    }

    fn overhead(&self) -> usize { self.overhead }
}

/// Encryption setting for a sender or receiver.
#[derive(Clone, Default)]
pub enum Encryption {
    /// Datagrams travel in plaintext.
    #[default]
    None,
    /// Built-in shared-secret cipher.
    SharedSecret(Arc<SharedSecretCipher>),
    /// Caller-supplied transform.
    Custom(Arc<dyn Cipher>),
}

impl Encryption {
    /// Use the built-in cipher keyed by a 64-character hex secret.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidSecret`] for malformed secrets.
    pub fn from_hex_secret(secret: &str) -> Result<Self, CipherError> {
        SharedSecretCipher::from_hex(secret).map(|cipher| Self::SharedSecret(Arc::new(cipher)))
    }

    /// Use a caller-supplied cipher.
    pub fn custom(cipher: impl Cipher + 'static) -> Self { Self::Custom(Arc::new(cipher)) }

    /// Resolve the configured cipher, if any.
    #[must_use]
    pub fn cipher(&self) -> Option<Arc<dyn Cipher>> {
        match self {
            Self::None => None,
            Self::SharedSecret(cipher) => Some(Arc::clone(cipher) as Arc<dyn Cipher>),
            Self::Custom(cipher) => Some(Arc::clone(cipher)),
        }
    }

    /// Per-datagram overhead of the configured cipher.
    #[must_use]
    pub fn overhead(&self) -> usize { self.cipher().map_or(0, |cipher| cipher.overhead()) }
}

impl fmt::Debug for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::SharedSecret(_) => f.write_str("SharedSecret(..)"),
            Self::Custom(cipher) => write!(f, "Custom(overhead={})", cipher.overhead()),
        }
    }
}
