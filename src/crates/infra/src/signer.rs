use application::query::url_signer::UrlSigner;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Invalid media base url: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// 签发带有效期的对象访问 URL
///
/// 格式: `{media_base_url}/{object_key}?expires={unix秒}&signature={hex(hmac_sha256("{key}:{expires}"))}`
#[derive(Clone)]
pub struct HmacUrlSigner {
    base: Url,
    mac: HmacSha256,
    ttl_secs: i64,
}

impl HmacUrlSigner {
    pub fn new(media_base_url: &str, signing_key: &str, ttl_secs: u64) -> Result<Self, SignerError> {
        let base = Url::parse(media_base_url)
            .map_err(|e| SignerError::InvalidBaseUrl(format!("{}: {}", media_base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SignerError::InvalidBaseUrl(media_base_url.to_string()));
        }
        let mac = HmacSha256::new_from_slice(signing_key.as_bytes())
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self {
            base,
            mac,
            ttl_secs: ttl_secs as i64,
        })
    }

    fn signature(&self, object_key: &str, expires: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{}:{}", object_key, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign_at(&self, object_key: &str, now: i64) -> String {
        let expires = now + self.ttl_secs;
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(object_key.split('/').filter(|s| !s.is_empty()));
        }
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(object_key, expires));
        url.to_string()
    }

    /// 校验签名和有效期
    pub fn verify(&self, object_key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(format!("{}:{}", object_key, expires).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

impl UrlSigner for HmacUrlSigner {
    fn sign(&self, object_key: &str) -> String {
        self.sign_at(object_key, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_value(url: &Url, name: &str) -> String {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_signed_url_carries_expiry_and_valid_signature() {
        let signer = HmacUrlSigner::new("https://media.example.com/bucket/", "secret", 3600).unwrap();
        let signed = Url::parse(&signer.sign_at("music/哲学/a b.mp3", 1_000)).unwrap();

        assert_eq!(signed.host_str(), Some("media.example.com"));
        assert!(signed.path().starts_with("/bucket/music/"));
        let expires: i64 = query_value(&signed, "expires").parse().unwrap();
        assert_eq!(expires, 4_600);
        let signature = query_value(&signed, "signature");
        assert!(signer.verify("music/哲学/a b.mp3", expires, &signature, 2_000));
    }

    #[test]
    fn test_verify_rejects_tampering_and_expiry() {
        let signer = HmacUrlSigner::new("https://media.example.com", "secret", 10).unwrap();
        let signed = Url::parse(&signer.sign_at("music/a.mp3", 0)).unwrap();
        let signature = query_value(&signed, "signature");

        assert!(!signer.verify("music/b.mp3", 10, &signature, 0));
        assert!(!signer.verify("music/a.mp3", 10, &signature, 11));
        assert!(!signer.verify("music/a.mp3", 10, "zz", 0));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HmacUrlSigner::new("not a url", "secret", 10).is_err());
    }
}
