//! Device fingerprinting.
//!
//! A fingerprint is a deterministic function of three client-reported
//! fields. Same device, same three fields, same fingerprint — this is
//! what lets session lookup key on "this device" rather than "this login".

use sha2::{Digest, Sha256};

/// Computes `hex(SHA256(device_id|"|"|device_os|"|"|device_name))`.
#[must_use]
pub fn compute(device_id: &str, device_os: &str, device_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_bytes());
    hasher.update(b"|");
    hasher.update(device_os.as_bytes());
    hasher.update(b"|");
    hasher.update(device_name.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute("device-1", "ios", "Alice's iPhone");
        let b = compute("device-1", "ios", "Alice's iPhone");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_devices_get_distinct_fingerprints() {
        let phone = compute("device-1", "ios", "Alice's iPhone");
        let laptop = compute("device-2", "macos", "Alice's MacBook");
        let tablet = compute("device-3", "ipados", "Alice's iPad");
        assert_ne!(phone, laptop);
        assert_ne!(phone, tablet);
        assert_ne!(laptop, tablet);
    }

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let fp = compute("d", "os", "name");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
