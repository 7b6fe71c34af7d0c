//! Signed, expiring bearer tokens.
//!
//! Compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`.
//! The `purpose` claim separates full sessions from the short-lived token
//! handed out while a second factor is outstanding.

use crate::domain::{KycStatus, UserId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    TwoFactor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub kyc: KycStatus,
    pub purpose: TokenPurpose,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued for another purpose")]
    WrongPurpose,
    #[error("signing key rejected")]
    InvalidKey,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

const ALGORITHM: &str = "HS256";

pub struct TokenSigner {
    /// Keyed MAC, cloned per operation
    mac: HmacSha256,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidKey)?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    pub fn issue(&self, claims: &Claims) -> String {
        let header = serde_json::to_vec(&Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        })
        .unwrap_or_default();
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    /// Check signature, expiry against `now` (unix seconds) and purpose.
    pub fn verify(
        &self,
        token: &str,
        now: i64,
        purpose: TokenPurpose,
    ) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.purpose != purpose {
            return Err(TokenError::WrongPurpose);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn claims(purpose: TokenPurpose, iat: i64, ttl: i64) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "investor@example.com".into(),
            kyc: KycStatus::Verified,
            purpose,
            iat,
            exp: iat + ttl,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new("secret").unwrap();
        let c = claims(TokenPurpose::Session, 1_000, 3_600);
        let token = signer.issue(&c);
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.verify(&token, 1_500, TokenPurpose::Session), Ok(c));
    }

    #[test]
    fn test_expired() {
        let signer = TokenSigner::new("secret").unwrap();
        let token = signer.issue(&claims(TokenPurpose::Session, 1_000, 60));
        assert_eq!(
            signer.verify(&token, 1_060, TokenPurpose::Session),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_purpose() {
        let signer = TokenSigner::new("secret").unwrap();
        let token = signer.issue(&claims(TokenPurpose::TwoFactor, 1_000, 600));
        assert_eq!(
            signer.verify(&token, 1_001, TokenPurpose::Session),
            Err(TokenError::WrongPurpose)
        );
    }

    #[test]
    fn test_foreign_key_rejected() {
        let token = TokenSigner::new("one").unwrap().issue(&claims(TokenPurpose::Session, 1_000, 600));
        assert_eq!(
            TokenSigner::new("two").unwrap().verify(&token, 1_001, TokenPurpose::Session),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("secret").unwrap();
        let token = signer.issue(&claims(TokenPurpose::Session, 1_000, 600));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims(TokenPurpose::Session, 1_000, 999_999)).unwrap(),
        );
        parts[1] = &forged;
        assert_eq!(
            signer.verify(&parts.join("."), 1_001, TokenPurpose::Session),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_malformed() {
        let signer = TokenSigner::new("secret").unwrap();
        assert_eq!(
            signer.verify("abc", 0, TokenPurpose::Session),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            signer.verify("a.b.c.d", 0, TokenPurpose::Session),
            Err(TokenError::Malformed)
        );
    }
}
