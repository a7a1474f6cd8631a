//! Browser fingerprint, the same digest the web client computes in JS.
//!
//! A continuity signal for "same browser profile", not a security boundary:
//! every input is client-controlled.

use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTraits {
    /// Random UUID persisted in the browser's local storage.
    pub device_id: String,
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone: String,
    pub language: String,
}

/// Lowercase SHA-256 hex of `deviceId-userAgent-WxH-timezone-language`.
pub fn compute_fingerprint(traits: &DeviceTraits) -> String {
    let input = format!(
        "{}-{}-{}x{}-{}-{}",
        traits.device_id,
        traits.user_agent,
        traits.screen_width,
        traits.screen_height,
        traits.timezone,
        traits.language
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traits() -> DeviceTraits {
        DeviceTraits {
            device_id: "3f1c9a52-0000-4000-8000-000000000001".into(),
            user_agent: "Mozilla/5.0 (iPhone)".into(),
            screen_width: 390,
            screen_height: 844,
            timezone: "Asia/Ho_Chi_Minh".into(),
            language: "vi-VN".into(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic_hex() {
        let a = compute_fingerprint(&traits());
        let b = compute_fingerprint(&traits());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn cleared_storage_means_new_device() {
        let mut other = traits();
        other.device_id = "3f1c9a52-0000-4000-8000-000000000002".into();
        assert_ne!(compute_fingerprint(&traits()), compute_fingerprint(&other));
    }

    #[test]
    fn digest_matches_known_input() {
        let expected = hex::encode(Sha256::digest(
            b"3f1c9a52-0000-4000-8000-000000000001-Mozilla/5.0 (iPhone)-390x844-Asia/Ho_Chi_Minh-vi-VN",
        ));
        assert_eq!(compute_fingerprint(&traits()), expected);
    }
}
