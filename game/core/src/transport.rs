//! Netstring framing (`len:payload,`) over a TCP stream, wrapping each
//! frame's payload in RSA encryption once a handshake has happened. This is
//! the Rust analogue of the original server's Twisted `NetstringReceiver`
//! plus its ad hoc `cryptography.encrypt`/`decrypt` calls.

use moonlapse_proto::crypto::{self, CryptoError, KeyPair};
use moonlapse_proto::shared::{ErrorType, NetworkError, NetworkResult};
use rsa::RsaPublicKey;
use std::io::{self, Read, Write};

/// Refuses to read a netstring longer than this many bytes, so a corrupt or
/// hostile peer can't make us allocate without bound.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Reads one netstring-framed payload (`len:payload,`) off `reader`.
/// Blocks until the whole frame has arrived.
pub fn read_netstring<R: Read>(reader: &mut R) -> NetworkResult<Vec<u8>> {
    let mut len_buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == b':' {
            break;
        }
        if !byte[0].is_ascii_digit() {
            return Err(NetworkError::Fatal(ErrorType::EmptyPayload));
        }
        len_buf.push(byte[0]);
        if len_buf.len() > 10 {
            return Err(NetworkError::Fatal(ErrorType::PayloadTooLarge));
        }
    }

    let len: usize = std::str::from_utf8(&len_buf)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(NetworkError::Fatal(ErrorType::EmptyPayload))?;

    if len > MAX_FRAME_LEN {
        return Err(NetworkError::Fatal(ErrorType::PayloadTooLarge));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    reader.read_exact(&mut byte)?;
    if byte[0] != b',' {
        return Err(NetworkError::Fatal(ErrorType::EmptyPayload));
    }

    Ok(payload)
}

/// Writes `payload` as a netstring frame to `writer`.
pub fn write_netstring<W: Write>(writer: &mut W, payload: &[u8]) -> NetworkResult<()> {
    write!(writer, "{}:", payload.len())?;
    writer.write_all(payload)?;
    writer.write_all(b",")?;
    Ok(())
}

/// Encrypts `payload` for `peer_key` and frames it; falls back to sending
/// it in the clear if `peer_key` hasn't been established yet (before the
/// handshake completes).
pub fn send_frame<W: Write>(writer: &mut W, payload: &[u8], peer_key: Option<&RsaPublicKey>) -> NetworkResult<()> {
    let framed = match peer_key {
        Some(key) => crypto::encrypt(key, payload).map_err(|_| NetworkError::Fatal(ErrorType::Crypto))?,
        None => payload.to_vec(),
    };
    write_netstring(writer, &framed)
}

/// Decrypts an incoming frame under our private key. If decryption fails
/// and `require_encryption` is false, the raw bytes are accepted as-is,
/// mirroring the original server's lenient fallback; if `require_encryption`
/// is true, a failed decrypt is a fatal protocol error instead.
pub fn decrypt_frame(private_key: &rsa::RsaPrivateKey, raw: Vec<u8>, require_encryption: bool) -> NetworkResult<Vec<u8>> {
    match crypto::decrypt(private_key, &raw) {
        Ok(plain) => Ok(plain),
        Err(CryptoError::Decrypt) if !require_encryption => Ok(raw),
        Err(_) => Err(NetworkError::Fatal(ErrorType::Crypto)),
    }
}

/// Per-connection transport state: our keypair (shared across connections)
/// plus whichever public key the client handed us during its `ClientKey`
/// packet.
pub struct Transport<'a> {
    pub server_keys: &'a KeyPair,
    pub client_public_key: Option<RsaPublicKey>,
    pub require_encryption: bool,
}

impl<'a> Transport<'a> {
    pub fn new(server_keys: &'a KeyPair, require_encryption: bool) -> Transport<'a> {
        Transport { server_keys, client_public_key: None, require_encryption }
    }

    pub fn read_frame<R: Read>(&self, reader: &mut R) -> NetworkResult<Vec<u8>> {
        let raw = read_netstring(reader)?;
        decrypt_frame(&self.server_keys.private, raw, self.require_encryption)
    }

    pub fn write_frame<W: Write>(&self, writer: &mut W, payload: &[u8]) -> NetworkResult<()> {
        send_frame(writer, payload, self.client_public_key.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_netstring_roundtrip() {
        let mut buf = Vec::new();
        write_netstring(&mut buf, b"hello").unwrap();
        assert_eq!(buf, b"5:hello,");

        let mut cursor = Cursor::new(buf);
        let payload = read_netstring(&mut cursor).unwrap();
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_netstring_rejects_non_digit_length() {
        let mut cursor = Cursor::new(b"abc:hello,".to_vec());
        let result = read_netstring(&mut cursor);
        assert!(result.is_err());
    }

    #[test]
    fn test_netstring_rejects_oversized_frame() {
        let mut cursor = Cursor::new(b"9999999999999:x,".to_vec());
        let result = read_netstring(&mut cursor);
        assert!(matches!(result, Err(NetworkError::Fatal(ErrorType::PayloadTooLarge))));
    }

    #[test]
    fn test_decrypt_frame_falls_back_to_cleartext_when_lax() {
        let pair = KeyPair::generate().unwrap();
        let plain = decrypt_frame(&pair.private, b"not actually encrypted".to_vec(), false).unwrap();
        assert_eq!(plain, b"not actually encrypted");
    }

    #[test]
    fn test_decrypt_frame_rejects_bad_ciphertext_when_strict() {
        let pair = KeyPair::generate().unwrap();
        let result = decrypt_frame(&pair.private, b"not actually encrypted".to_vec(), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_and_decrypt_frame_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let mut buf = Vec::new();
        send_frame(&mut buf, b"secret message", Some(&pair.public)).unwrap();

        let mut cursor = Cursor::new(buf);
        let raw = read_netstring(&mut cursor).unwrap();
        let plain = decrypt_frame(&pair.private, raw, true).unwrap();
        assert_eq!(plain, b"secret message");
    }
}
