pub mod cache;
pub mod fingerprint;

pub use cache::{Admission, DedupCache};
pub use fingerprint::{DefaultFingerprint, FingerprintStrategy};
