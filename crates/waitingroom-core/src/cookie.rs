//! Sealed cookie codec.
//!
//! Authenticated symmetric serialization of the [`Client`] tuple using
//! XChaCha20-Poly1305. The cookie value is `base64(nonce || ciphertext)`
//! with the cookie name bound as associated data, so a value pasted under a
//! different cookie name fails to open.
//!
//! Keys come from `WAITINGROOM_COOKIE_SECRET_HASH_KEY` and
//! `WAITINGROOM_COOKIE_SECRET_BLOCK_KEY`; both must be set together so every
//! gateway replica seals compatibly. When neither is set an ephemeral key is
//! generated at startup, which only works for a single replica.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::client::Client;
use crate::error::{Error, Result};

/// Cookie name carried between the edge and the client.
pub const COOKIE_NAME: &str = "waiting-room";

/// XChaCha20-Poly1305 key size (256 bits).
const KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size (192 bits).
const NONCE_SIZE: usize = 24;

const HASH_KEY_ENV: &str = "WAITINGROOM_COOKIE_SECRET_HASH_KEY";
const BLOCK_KEY_ENV: &str = "WAITINGROOM_COOKIE_SECRET_BLOCK_KEY";

/// Sealing key with zeroize-on-drop semantics.
#[derive(Clone, ZeroizeOnDrop)]
struct SealKey {
    bytes: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealKey").finish_non_exhaustive()
    }
}

/// Seals and opens client cookies.
#[derive(Debug, Clone)]
pub struct CookieCodec {
    key: SealKey,
}

impl CookieCodec {
    /// Builds the codec from the two operator-supplied secrets.
    ///
    /// The AEAD key is `SHA-256(hash_key || block_key)`, so both secrets
    /// participate in sealing and replicas sharing them interoperate.
    #[must_use]
    pub fn from_keys(hash_key: &[u8], block_key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(hash_key);
        hasher.update(block_key);
        let digest = hasher.finalize();

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&digest);
        Self {
            key: SealKey { bytes },
        }
    }

    /// Generates a random per-process key. Single-replica use only:
    /// cookies sealed by one process cannot be opened by another.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            key: SealKey { bytes },
        }
    }

    /// Builds the codec from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when only one of the two key variables is
    /// set; a half-configured seal would split the cluster into replicas
    /// that cannot read each other's cookies.
    pub fn from_env() -> Result<Self> {
        let hash_key = std::env::var(HASH_KEY_ENV).ok();
        let block_key = std::env::var(BLOCK_KEY_ENV).ok();
        match (hash_key, block_key) {
            (Some(h), Some(b)) => Ok(Self::from_keys(h.as_bytes(), b.as_bytes())),
            (None, None) => {
                tracing::warn!(
                    "cookie seal keys not set, generating an ephemeral key (single replica only)"
                );
                Ok(Self::generate())
            }
            _ => Err(Error::Config(format!(
                "{HASH_KEY_ENV} and {BLOCK_KEY_ENV} must be set together"
            ))),
        }
    }

    /// Seals a client into a cookie value.
    ///
    /// # Errors
    ///
    /// Returns `Error::CookieSeal` if serialization or encryption fails.
    pub fn seal(&self, client: &Client) -> Result<String> {
        let payload =
            serde_json::to_vec(client).map_err(|e| Error::CookieSeal(e.to_string()))?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());
        let ciphertext = cipher
            .encrypt(
                (&nonce).into(),
                Payload {
                    msg: &payload,
                    aad: COOKIE_NAME.as_bytes(),
                },
            )
            .map_err(|e| Error::CookieSeal(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Opens a cookie value back into a client.
    ///
    /// # Errors
    ///
    /// Returns `Error::CookieOpen` on malformed encoding, truncation, or
    /// authentication failure. Callers treat any failure as "no cookie"
    /// and evict the value from the browser.
    pub fn open(&self, value: &str) -> Result<Client> {
        let sealed = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| Error::CookieOpen(e.to_string()))?;
        if sealed.len() <= NONCE_SIZE {
            return Err(Error::CookieOpen("value too short".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce: &[u8; NONCE_SIZE] = nonce.try_into().expect("split length checked");

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());
        let payload = cipher
            .decrypt(
                nonce.into(),
                Payload {
                    msg: ciphertext,
                    aad: COOKIE_NAME.as_bytes(),
                },
            )
            .map_err(|_| Error::CookieOpen("authentication failed".to_string()))?;

        serde_json::from_slice(&payload).map_err(|e| Error::CookieOpen(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client() -> Client {
        Client {
            serial_number: 42,
            id: "11111111-2222-3333-4444-555555555555".to_string(),
            take_serial_number_time: 1_700_000_000,
        }
    }

    #[test]
    fn seal_open_round_trip() {
        let codec = CookieCodec::generate();
        let sealed = codec.seal(&sample_client()).unwrap();
        let opened = codec.open(&sealed).unwrap();
        assert_eq!(opened, sample_client());
    }

    #[test]
    fn sealed_values_differ_per_call() {
        // Random nonce per seal: identical clients produce distinct values.
        let codec = CookieCodec::generate();
        let a = codec.seal(&sample_client()).unwrap();
        let b = codec.seal(&sample_client()).unwrap();
        assert_ne!(a, b);
        assert_eq!(codec.open(&a).unwrap(), codec.open(&b).unwrap());
    }

    #[test]
    fn tampered_value_fails_to_open() {
        let codec = CookieCodec::generate();
        let sealed = codec.seal(&sample_client()).unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);

        assert!(matches!(
            codec.open(&tampered),
            Err(Error::CookieOpen(_))
        ));
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sealed = CookieCodec::generate().seal(&sample_client()).unwrap();
        let other = CookieCodec::generate();
        assert!(matches!(other.open(&sealed), Err(Error::CookieOpen(_))));
    }

    #[test]
    fn garbage_fails_to_open() {
        let codec = CookieCodec::generate();
        assert!(codec.open("not base64 !!!").is_err());
        assert!(codec.open("").is_err());
        assert!(codec.open("AAAA").is_err());
    }

    #[test]
    fn same_keys_interoperate_across_codecs() {
        let a = CookieCodec::from_keys(b"hash-key", b"block-key");
        let b = CookieCodec::from_keys(b"hash-key", b"block-key");
        let sealed = a.seal(&sample_client()).unwrap();
        assert_eq!(b.open(&sealed).unwrap(), sample_client());
    }

    #[test]
    fn different_block_key_does_not_interoperate() {
        let a = CookieCodec::from_keys(b"hash-key", b"block-key");
        let b = CookieCodec::from_keys(b"hash-key", b"other-block-key");
        let sealed = a.seal(&sample_client()).unwrap();
        assert!(b.open(&sealed).is_err());
    }
}
