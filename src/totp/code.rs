//! RFC 4226 code derivation and windowed verification.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::TotpError;

type HmacSha1 = Hmac<Sha1>;

/// Derives the HOTP code for a counter value.
///
/// HMAC-SHA1 over the big-endian 8-byte counter, dynamic-offset truncation
/// (RFC 4226 §5.3), reduced modulo `10^digits` and zero-padded.
pub(crate) fn hotp(secret: &[u8], counter: u64, digits: u32) -> String {
    // HMAC accepts keys of any length; Secret enforces its own bounds.
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}

/// Checks a candidate against every step in `[step - window, step + window]`.
///
/// Steps below zero are skipped rather than wrapped. Each comparison is
/// constant-time.
pub(crate) fn verify(
    secret: &[u8],
    candidate: &str,
    step: u64,
    window: u64,
    digits: u32,
) -> Result<bool, TotpError> {
    if candidate.len() != digits as usize || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TotpError::MalformedCode {
            expected_digits: digits,
        });
    }

    let first = step.saturating_sub(window);
    let last = step.saturating_add(window);
    for tick in first..=last {
        let expected = hotp(secret, tick, digits);
        if constant_time_eq(expected.as_bytes(), candidate.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}
