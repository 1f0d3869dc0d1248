//! Note Encryption
//!
//! ECIES over secp256k1, binding the commitment randomness to the recipient's
//! encryption key.
//!
//! ```text
//! Flow:
//! 1. Sender generates ephemeral keypair (epk, esk)
//! 2. Shared secret = ECDH(esk, recipient_pk).x
//! 3. encKey || macKey = SHA-512(shared secret)
//! 4. Ciphertext = AES-256-CTR(encKey, iv, plaintext)
//! 5. MAC = HMAC-SHA256(macKey, iv || epk || ciphertext)
//! 6. Output = iv(16) || epk(65, uncompressed) || MAC(32) || ciphertext
//! ```
//!
//! The MAC is checked before anything is decrypted, so a wrong key or a
//! tampered note is rejected instead of yielding garbage randomness.

use aes::Aes256;
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey, ecdh};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Result, ShieldedError};
use crate::keys::{ENC_PK_LEN, ENC_SK_LEN, to_array};

type Aes256Ctr = Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const IV_LEN: usize = 16;
pub const EPHEMERAL_PK_LEN: usize = 65;
pub const MAC_LEN: usize = 32;
/// Bytes preceding the ciphertext
pub const OVERHEAD: usize = IV_LEN + EPHEMERAL_PK_LEN + MAC_LEN;

pub const RANDOM_LEN: usize = 16;
/// randomP || randomR || randomS
pub const NOTE_PLAINTEXT_LEN: usize = 3 * RANDOM_LEN;
pub const ENCRYPTED_NOTE_LEN: usize = OVERHEAD + NOTE_PLAINTEXT_LEN;

/// Commitment randomness carried inside an encrypted note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotePlaintext {
    pub random_p: [u8; RANDOM_LEN],
    pub random_r: [u8; RANDOM_LEN],
    pub random_s: [u8; RANDOM_LEN],
}

impl NotePlaintext {
    pub fn to_bytes(&self) -> [u8; NOTE_PLAINTEXT_LEN] {
        let mut bytes = [0u8; NOTE_PLAINTEXT_LEN];
        bytes[..RANDOM_LEN].copy_from_slice(&self.random_p);
        bytes[RANDOM_LEN..2 * RANDOM_LEN].copy_from_slice(&self.random_r);
        bytes[2 * RANDOM_LEN..].copy_from_slice(&self.random_s);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NOTE_PLAINTEXT_LEN {
            return Err(ShieldedError::DecryptionFailure(
                "note plaintext must be 48 bytes",
            ));
        }
        let mut plaintext = Self {
            random_p: [0u8; RANDOM_LEN],
            random_r: [0u8; RANDOM_LEN],
            random_s: [0u8; RANDOM_LEN],
        };
        plaintext.random_p.copy_from_slice(&bytes[..RANDOM_LEN]);
        plaintext
            .random_r
            .copy_from_slice(&bytes[RANDOM_LEN..2 * RANDOM_LEN]);
        plaintext.random_s.copy_from_slice(&bytes[2 * RANDOM_LEN..]);
        Ok(plaintext)
    }
}

/// Encrypt note randomness for the holder of `pk_enc`
pub fn encrypt_note<R: RngCore + CryptoRng>(
    pk_enc: &[u8],
    note: &NotePlaintext,
    rng: &mut R,
) -> Result<Vec<u8>> {
    encrypt(pk_enc, &note.to_bytes(), rng)
}

/// Decrypt an encrypted note with the recipient's encryption secret key
pub fn decrypt_note(sk_enc: &[u8], encrypted: &[u8]) -> Result<NotePlaintext> {
    if encrypted.len() != ENCRYPTED_NOTE_LEN {
        return Err(ShieldedError::DecryptionFailure(
            "encrypted note has the wrong length",
        ));
    }
    NotePlaintext::from_bytes(&decrypt(sk_enc, encrypted)?)
}

/// ECIES-encrypt `plaintext` to a compressed secp256k1 public key
pub fn encrypt<R: RngCore + CryptoRng>(
    pk_enc: &[u8],
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let pk_enc: [u8; ENC_PK_LEN] = to_array("encryption public key", pk_enc)?;
    let recipient = PublicKey::from_sec1_bytes(&pk_enc)
        .map_err(|_| ShieldedError::InvalidKey("encryption public key is not a curve point"))?;

    let ephemeral = ecdh::EphemeralSecret::random(rng);
    let ephemeral_pk = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(&recipient);
    let (enc_key, mac_key) = derive_keys(shared.raw_secret_bytes());

    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let mut ciphertext = plaintext.to_vec();
    let mut cipher = Aes256Ctr::new_from_slices(&enc_key, &iv)
        .map_err(|_| ShieldedError::InvalidKey("derived cipher key has the wrong length"))?;
    cipher.apply_keystream(&mut ciphertext);

    let mac = compute_mac(&mac_key, &iv, ephemeral_pk.as_bytes(), &ciphertext)?;

    let mut out = Vec::with_capacity(OVERHEAD + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(ephemeral_pk.as_bytes());
    out.extend_from_slice(&mac);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an ECIES payload produced by [`encrypt`]
pub fn decrypt(sk_enc: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let sk_enc: [u8; ENC_SK_LEN] = to_array("encryption secret key", sk_enc)?;
    if data.len() <= OVERHEAD {
        return Err(ShieldedError::DecryptionFailure("payload is truncated"));
    }
    let secret = SecretKey::from_slice(&sk_enc)
        .map_err(|_| ShieldedError::InvalidKey("encryption secret key is not a secp256k1 scalar"))?;

    let iv = &data[..IV_LEN];
    let ephemeral_bytes = &data[IV_LEN..IV_LEN + EPHEMERAL_PK_LEN];
    let mac = &data[IV_LEN + EPHEMERAL_PK_LEN..OVERHEAD];
    let ciphertext = &data[OVERHEAD..];

    let ephemeral = PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|_| ShieldedError::DecryptionFailure("ephemeral key is not a curve point"))?;
    let shared = ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let (enc_key, mac_key) = derive_keys(shared.raw_secret_bytes());

    let mut verifier = <HmacSha256 as Mac>::new_from_slice(&mac_key)
        .map_err(|_| ShieldedError::DecryptionFailure("bad mac key"))?;
    verifier.update(iv);
    verifier.update(ephemeral_bytes);
    verifier.update(ciphertext);
    verifier
        .verify_slice(mac)
        .map_err(|_| {
            ShieldedError::DecryptionFailure("mac mismatch (wrong key or tampered note)")
        })?;

    let mut plaintext = ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new_from_slices(&enc_key, iv)
        .map_err(|_| ShieldedError::DecryptionFailure("bad cipher parameters"))?;
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

/// Split SHA-512 of the shared secret into cipher and MAC keys
fn derive_keys(shared_secret: &[u8]) -> ([u8; 32], [u8; 32]) {
    let digest = Sha512::digest(shared_secret);
    let mut enc_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    enc_key.copy_from_slice(&digest[..32]);
    mac_key.copy_from_slice(&digest[32..]);
    (enc_key, mac_key)
}

fn compute_mac(
    mac_key: &[u8],
    iv: &[u8],
    ephemeral_pk: &[u8],
    ciphertext: &[u8],
) -> Result<[u8; MAC_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| ShieldedError::InvalidKey("bad mac key"))?;
    mac.update(iv);
    mac.update(ephemeral_pk);
    mac.update(ciphertext);
    let mut tag = [0u8; MAC_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}
