//! Encrypt-and-save / decrypt-and-read pipeline, §4.B.
//!
//! On-disk layout: `base64( iv[16] || AES-256-CFB(plaintext, key) )`.

use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use dfs_types::Error;
use rand::RngCore;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

/// Generates a fresh 32-byte key via a CSPRNG, base64-encoded for storage
/// in `User.crypt_key` / `ShareSpace.crypt_key`.
pub fn generate_key_base64() -> String {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    BASE64.encode(key)
}

pub fn decode_key(key_base64: &str) -> Result<[u8; KEY_SIZE], Error> {
    let bytes = BASE64
        .decode(key_base64)
        .map_err(|e| Error::Crypto(format!("invalid key encoding: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::Crypto("encryption key must be 32 bytes".into()))
}

/// Encrypts `plaintext` under `key` and base64-encodes `iv || ciphertext`
/// for on-disk storage.
pub fn encrypt_and_encode(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> Vec<u8> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut buf = plaintext.to_vec();
    Aes256CfbEnc::new(key.into(), &iv.into()).encrypt(&mut buf);

    let mut framed = Vec::with_capacity(IV_SIZE + buf.len());
    framed.extend_from_slice(&iv);
    framed.extend_from_slice(&buf);

    BASE64.encode(framed).into_bytes()
}

/// Inverse of [`encrypt_and_encode`]: base64-decodes, splits the IV, and
/// decrypts the remainder.
pub fn decode_and_decrypt(encoded: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, Error> {
    let framed = BASE64
        .decode(encoded)
        .map_err(|e| Error::Crypto(format!("invalid base64 on disk: {e}")))?;

    if framed.len() < IV_SIZE {
        return Err(Error::Crypto("ciphertext shorter than iv".into()));
    }

    let (iv, ciphertext) = framed.split_at(IV_SIZE);
    let mut buf = ciphertext.to_vec();
    Aes256CfbDec::new(key.into(), iv.into()).decrypt(&mut buf);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let key = decode_key(&generate_key_base64()).unwrap();
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        let encoded = encrypt_and_encode(plaintext, &key);
        let decrypted = decode_and_decrypt(&encoded, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn distinct_ivs_yield_distinct_ciphertexts() {
        let key = decode_key(&generate_key_base64()).unwrap();
        let plaintext = b"same plaintext, twice";

        let a = encrypt_and_encode(plaintext, &key);
        let b = encrypt_and_encode(plaintext, &key);

        assert_ne!(a, b, "fresh IV per encryption must change the ciphertext");
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let key_a = decode_key(&generate_key_base64()).unwrap();
        let key_b = decode_key(&generate_key_base64()).unwrap();
        let plaintext = b"super secret payload";

        let encoded = encrypt_and_encode(plaintext, &key_a);
        let recovered = decode_and_decrypt(&encoded, &key_b).unwrap();

        assert_ne!(recovered, plaintext);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = decode_key(&generate_key_base64()).unwrap();
        let encoded = encrypt_and_encode(b"", &key);
        let decrypted = decode_and_decrypt(&encoded, &key).unwrap();
        assert!(decrypted.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn round_trip_arbitrary_plaintext(data: Vec<u8>) {
            let key = decode_key(&generate_key_base64()).unwrap();
            let encoded = encrypt_and_encode(&data, &key);
            let decrypted = decode_and_decrypt(&encoded, &key).unwrap();
            proptest::prop_assert_eq!(decrypted, data);
        }
    }
}
