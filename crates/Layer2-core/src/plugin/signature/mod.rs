//! Signature - 플러그인 서명 판정과 매니페스트 검증

pub mod calculator;
pub mod keystore;
pub mod manifest;
pub mod verifier;

pub use calculator::{ManifestCalculator, SignatureCalculator};
pub use keystore::{InMemoryKeyStore, KeyStore};
pub use manifest::{SignatureManifest, SignedManifest, MANIFEST_FILE};
pub use verifier::{armor_public_key, parse_public_key, ManifestVerifier, DEFAULT_KEY_ID};
