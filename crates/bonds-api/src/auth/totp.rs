//! Time-based one-time passwords (RFC 6238, HMAC-SHA1, 30 s, 6 digits).

use base32::Alphabet;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECONDS: i64 = 30;
pub const DIGITS: u32 = 6;
/// 160-bit shared secret, the RFC 4226 recommendation.
pub const SECRET_BYTES: usize = 20;

const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Fresh random secret, base32 without padding.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base32::encode(ALPHABET, &bytes)
}

fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    base32::decode(ALPHABET, &cleaned).filter(|k| !k.is_empty())
}

/// RFC 4226 HOTP value for `counter`.
fn hotp(key: &[u8], counter: u64) -> Option<u32> {
    let mut mac = HmacSha1::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Some(binary % 10u32.pow(DIGITS))
}

/// Code for the step containing `unix_seconds`.
pub fn code_at(secret: &str, unix_seconds: i64) -> Option<String> {
    let key = decode_secret(secret)?;
    let counter = u64::try_from(unix_seconds.div_euclid(STEP_SECONDS)).ok()?;
    hotp(&key, counter).map(|v| format!("{:0width$}", v, width = DIGITS as usize))
}

/// Accept `code` if it matches any step within `skew` steps of `unix_seconds`.
pub fn verify(secret: &str, code: &str, unix_seconds: i64, skew: u8) -> bool {
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(key) = decode_secret(secret) else {
        return false;
    };
    let current = unix_seconds.div_euclid(STEP_SECONDS);
    let skew = i64::from(skew);

    let mut matched = false;
    for step in (current - skew)..=(current + skew) {
        let Ok(counter) = u64::try_from(step) else {
            continue;
        };
        if let Some(value) = hotp(&key, counter) {
            let expected = format!("{:0width$}", value, width = DIGITS as usize);
            matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
        }
    }
    matched
}

/// `otpauth://` URI for authenticator apps.
///
/// `issuer` must already be URI-safe; the account label is percent-encoded.
pub fn provisioning_uri(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}",
        percent_encode(account)
    )
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
