//! RSA transport encryption.
//!
//! Every frame on the wire is encrypted with PKCS#1 v1.5 under the peer's
//! public key. RSA can only encrypt a little less than the modulus size in
//! one go, so payloads are split into fixed-size chunks and each chunk is
//! encrypted/decrypted independently.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// Default modulus size for freshly generated keypairs. 2048 bits keeps
/// chunking overhead low while remaining comfortably secure.
pub const KEY_BITS: usize = 2048;

#[derive(Debug)]
pub enum CryptoError {
    Encrypt,
    Decrypt,
    KeyGen,
}

pub struct KeyPair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl KeyPair {
    pub fn generate() -> Result<KeyPair, CryptoError> {
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(|_| CryptoError::KeyGen)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair { private, public })
    }
}

/// The two big integers (`n`, `e`) that make up an RSA public key, exchanged
/// in the clear during the handshake.
pub struct PublicKeyParams {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

pub fn export_public_key(key: &RsaPublicKey) -> PublicKeyParams {
    PublicKeyParams {
        n: key.n().to_bytes_be(),
        e: key.e().to_bytes_be(),
    }
}

pub fn import_public_key(params: &PublicKeyParams) -> Result<RsaPublicKey, CryptoError> {
    let n = BigUint::from_bytes_be(&params.n);
    let e = BigUint::from_bytes_be(&params.e);
    RsaPublicKey::new(n, e).map_err(|_| CryptoError::KeyGen)
}

/// Maximum plaintext bytes that fit in a single PKCS#1 v1.5 block for the
/// given key size. 11 bytes of padding overhead per RFC 2313.
fn chunk_plain_size(key: &RsaPublicKey) -> usize {
    key.size() - 11
}

pub fn encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut rng = OsRng;
    let chunk_size = chunk_plain_size(public_key);
    let mut out = Vec::with_capacity(plaintext.len() / chunk_size.max(1) + 1);

    if plaintext.is_empty() {
        let block = public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, &[])
            .map_err(|_| CryptoError::Encrypt)?;
        out.extend_from_slice(&block);
        return Ok(out);
    }

    for chunk in plaintext.chunks(chunk_size) {
        let block = public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|_| CryptoError::Encrypt)?;
        out.extend_from_slice(&block);
    }

    Ok(out)
}

pub fn decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let block_size = private_key.size();
    if block_size == 0 || ciphertext.len() % block_size != 0 {
        return Err(CryptoError::Decrypt);
    }

    let mut out = Vec::with_capacity(ciphertext.len());
    for block in ciphertext.chunks(block_size) {
        let plain = private_key
            .decrypt(Pkcs1v15Encrypt, block)
            .map_err(|_| CryptoError::Decrypt)?;
        out.extend_from_slice(&plain);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let message = b"hello moonlapse";

        let cipher = encrypt(&pair.public, message).unwrap();
        let plain = decrypt(&pair.private, &cipher).unwrap();

        assert_eq!(plain, message);
    }

    #[test]
    fn test_roundtrip_multi_block() {
        let pair = KeyPair::generate().unwrap();
        let message = vec![7u8; 600];

        let cipher = encrypt(&pair.public, &message).unwrap();
        let plain = decrypt(&pair.private, &cipher).unwrap();

        assert_eq!(plain, message);
    }

    #[test]
    fn test_export_import_public_key() {
        let pair = KeyPair::generate().unwrap();
        let params = export_public_key(&pair.public);
        let imported = import_public_key(&params).unwrap();

        assert_eq!(imported.n(), pair.public.n());
        assert_eq!(imported.e(), pair.public.e());
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let pair_a = KeyPair::generate().unwrap();
        let pair_b = KeyPair::generate().unwrap();

        let cipher = encrypt(&pair_a.public, b"secret").unwrap();
        let result = decrypt(&pair_b.private, &cipher);

        assert!(result.is_err());
    }
}
