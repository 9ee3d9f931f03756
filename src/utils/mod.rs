//! Shared helpers

pub mod hashing;
pub mod paths;

pub use hashing::{hmac_sha256, sha256_hex, to_hex};
pub use paths::{absolutize, expand_home};
