//! `otpauth://totp/...` enrollment URI construction.

use url::form_urlencoded;
use url::Url;

/// Builds the standard enrollment URI authenticator apps scan:
/// `otpauth://totp/{issuer}:{account}?secret=...&issuer=...&algorithm=SHA1&digits=...&period=...`
pub(crate) fn enrollment_uri(
    issuer: &str,
    account: &str,
    secret_base32: &str,
    digits: u32,
    period_seconds: u64,
) -> String {
    let label = format!("{issuer}:{account}");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("secret", secret_base32)
        .append_pair("issuer", issuer)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", &digits.to_string())
        .append_pair("period", &period_seconds.to_string())
        .finish();

    // The static base always parses; the fallback only guards against an
    // incompatible future url crate.
    match Url::parse("otpauth://totp/") {
        Ok(mut url) => {
            url.set_path(&label);
            url.set_query(Some(&query));
            url.to_string()
        }
        Err(_) => format!("otpauth://totp/{label}?{query}"),
    }
}
