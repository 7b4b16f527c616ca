//! Anti-CSRF `state` generation.

use rand::RngCore as _;

/// Generate a random `state` parameter (hex-encoded, 32 lowercase hex chars).
#[must_use]
pub fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        use std::fmt::Write as _;
        let _ = write!(s, "{b:02x}");
        s
    })
}
