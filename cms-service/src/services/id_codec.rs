use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const CIPHER_KEY_LABEL: &[u8] = b"cms-external-id-cipher";

/// Turns internal consent and payment ids into opaque external ids and back.
///
/// External form: `base64url(nonce || AES-256-GCM(id))`. The nonce is the
/// first 12 bytes of `HMAC-SHA256(key, id)`, so one internal id always maps to
/// the same external id.
#[derive(Clone)]
pub struct IdCodec {
    cipher: Aes256Gcm,
    mac: HmacSha256,
}

impl IdCodec {
    pub fn new(key: &Secret<String>) -> Result<Self, AppError> {
        let key = key.expose_secret();
        if key.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "security.encryption_key must not be empty"
            )));
        }

        let mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid key length: {}", e)))?;

        // AES-256 needs exactly 32 bytes; derive them from the configured key
        let mut derive = mac.clone();
        derive.update(CIPHER_KEY_LABEL);
        let cipher_key = derive.finalize().into_bytes();
        let cipher = <Aes256Gcm as KeyInit>::new_from_slice(&cipher_key)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid cipher key: {}", e)))?;

        Ok(Self { cipher, mac })
    }

    pub fn encode(&self, internal_id: &str) -> Result<String, AppError> {
        let nonce_bytes = self.nonce_for(internal_id);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), internal_id.as_bytes())
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Id encryption failed: {}", e)))?;

        let mut external = nonce_bytes.to_vec();
        external.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(external))
    }

    /// The internal id, or `None` for anything this codec did not produce.
    pub fn decode(&self, external_id: &str) -> Option<String> {
        let data = URL_SAFE_NO_PAD.decode(external_id).ok()?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;

        String::from_utf8(plaintext).ok()
    }

    fn nonce_for(&self, internal_id: &str) -> [u8; NONCE_LEN] {
        let mut mac = self.mac.clone();
        mac.update(internal_id.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(key: &str) -> IdCodec {
        IdCodec::new(&Secret::new(key.to_string())).unwrap()
    }

    #[test]
    fn encoded_ids_decode_to_the_internal_id() {
        let codec = codec("secret");
        let internal = "6f0c3f0e-53a4-4c43-8a37-5d0ff3c8b4c1";
        let external = codec.encode(internal).unwrap();

        assert_eq!(codec.decode(&external).as_deref(), Some(internal));
        assert_eq!(codec.encode(internal).unwrap(), external);
    }

    #[test]
    fn internal_id_is_not_readable_from_the_external_id() {
        let codec = codec("secret");
        let internal = "consent-1";
        let external = codec.encode(internal).unwrap();

        assert!(!external.contains(&URL_SAFE_NO_PAD.encode(internal)));
        let raw = URL_SAFE_NO_PAD.decode(&external).unwrap();
        assert!(!raw.windows(internal.len()).any(|w| w == internal.as_bytes()));
    }

    #[test]
    fn tampered_ids_are_rejected() {
        let codec = codec("secret");
        let external = codec.encode("consent-1").unwrap();

        let mut raw = URL_SAFE_NO_PAD.decode(&external).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let flipped = URL_SAFE_NO_PAD.encode(raw);

        assert_eq!(codec.decode(&flipped), None);
        assert_eq!(codec.decode("consent-1"), None);
        assert_eq!(codec.decode("!!not-base64!!"), None);
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode([0u8; 8])), None);
    }

    #[test]
    fn ids_from_another_key_are_rejected() {
        let external = codec("key-a").encode("payment-1").unwrap();
        assert_eq!(codec("key-b").decode(&external), None);
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        assert!(IdCodec::new(&Secret::new(String::new())).is_err());
    }
}
