use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD as B64, URL_SAFE_NO_PAD as B64_URL};
use sha2::{Digest, Sha256};

/// Prefix distinguishing secret bearer tokens from ordinary word tokens.
/// The word-token vocabulary never starts a token with this letter.
pub const SECRET_MARKER: &str = "e";

/// Field separator inside a stored envelope record.
const RECORD_SEPARATOR: char = '?';

const SECRET_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Record does not have the expected shape (field count, encoding,
    /// field lengths) or the token is missing its marker.
    #[error("malformed envelope record")]
    Malformed,
    /// Authenticated decryption failed. Indistinguishable from `Malformed`
    /// in anything user-facing.
    #[error("authentication failed")]
    Authentication,
    #[error("key derivation failed")]
    KeyDerivation,
}

/// Output of [`seal`]: the bearer token goes to the creator, the digest and
/// record go to the store. The secret itself is never persisted.
pub struct Sealed {
    /// `"e"` + base64url of 32 random bytes, the full share token.
    pub token: String,
    /// Lowercase hex sha256 of the base64url secret; the store's lookup key.
    pub digest: String,
    /// `base64(ciphertext) ? hex(tag) ? base64(nonce)`.
    pub record: String,
}

/// Seal plaintext under a fresh random secret.
///
/// The secret (base64url form) is run through Argon2id with the fixed
/// application-wide salt to derive the AES-256-GCM key, so anyone holding
/// only the stored record cannot decrypt.
pub fn seal(plaintext: &[u8], kdf_salt: &[u8]) -> Result<Sealed, EnvelopeError> {
    let mut secret = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    let secret = B64_URL.encode(secret);

    let key = derive_key(&secret, kdf_salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EnvelopeError::Authentication)?;
    // aes-gcm appends the 16-byte tag; the record stores it as its own field
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    let record = format!(
        "{}{sep}{}{sep}{}",
        B64.encode(&sealed),
        hex::encode(&tag),
        B64.encode(nonce_bytes),
        sep = RECORD_SEPARATOR,
    );

    Ok(Sealed {
        digest: digest_hex(&secret),
        token: format!("{SECRET_MARKER}{secret}"),
        record,
    })
}

/// Open a stored record with the token the viewer presented.
///
/// Any malformed field or tag mismatch fails closed; partial plaintext is
/// never returned.
pub fn open(record: &str, presented: &str, kdf_salt: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let secret = presented
        .strip_prefix(SECRET_MARKER)
        .ok_or(EnvelopeError::Malformed)?;

    let fields: Vec<&str> = record.split(RECORD_SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(EnvelopeError::Malformed);
    }
    let mut sealed = B64.decode(fields[0]).map_err(|_| EnvelopeError::Malformed)?;
    let tag = hex::decode(fields[1]).map_err(|_| EnvelopeError::Malformed)?;
    let nonce_bytes = B64.decode(fields[2]).map_err(|_| EnvelopeError::Malformed)?;
    if tag.len() != TAG_LEN || nonce_bytes.len() != NONCE_LEN {
        return Err(EnvelopeError::Malformed);
    }

    let key = derive_key(secret, kdf_salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&nonce_bytes);

    sealed.extend_from_slice(&tag);
    cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| EnvelopeError::Authentication)
}

/// Transform a presented token into the store's lookup key.
///
/// Secret tokens are looked up by digest (the store never indexes the
/// secret itself); ordinary word tokens are their own key. Every read path
/// must go through this before touching the store.
pub fn lookup_key(presented: &str) -> String {
    match presented.strip_prefix(SECRET_MARKER) {
        Some(secret) => digest_hex(secret),
        None => presented.to_string(),
    }
}

pub fn is_secret_token(presented: &str) -> bool {
    presented.starts_with(SECRET_MARKER)
}

fn derive_key(secret: &str, salt: &[u8]) -> Result<[u8; 32], EnvelopeError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), salt, &mut key)
        .map_err(|_| EnvelopeError::KeyDerivation)?;
    Ok(key)
}

fn digest_hex(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
