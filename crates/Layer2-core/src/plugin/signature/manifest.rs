//! Signed Manifest - MANIFEST.txt 형식
//!
//! ```text
//! -----BEGIN KILN SIGNED MANIFEST-----
//! Key-Id: 7e4d0cd6e2d0a4c5
//!
//! { ...json body... }
//! -----BEGIN KILN SIGNATURE-----
//! <base64 ed25519 signature>
//! -----END KILN SIGNATURE-----
//! ```

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::types::SignatureType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 서명 매니페스트 파일명
pub const MANIFEST_FILE: &str = "MANIFEST.txt";

const BEGIN_MANIFEST: &str = "-----BEGIN KILN SIGNED MANIFEST-----";
const BEGIN_SIGNATURE: &str = "-----BEGIN KILN SIGNATURE-----";
const END_SIGNATURE: &str = "-----END KILN SIGNATURE-----";
const KEY_ID_HEADER: &str = "Key-Id:";

// ============================================================================
// SignedManifest - clear-signed 블록
// ============================================================================

/// 서명 블록 (본문 + 서명)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedManifest {
    pub key_id: String,
    /// 서명 대상 본문 (마지막 줄바꿈 제외)
    pub body: String,
    pub signature: Vec<u8>,
}

enum Section {
    Start,
    Headers,
    Body,
    Signature,
    Done,
}

impl SignedManifest {
    /// 텍스트 블록 파싱
    pub fn parse(text: &str) -> PluginResult<Self> {
        let text = text.replace("\r\n", "\n");

        let mut section = Section::Start;
        let mut key_id = None;
        let mut body: Vec<&str> = Vec::new();
        let mut encoded = String::new();

        for line in text.lines() {
            match section {
                Section::Start => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if line.trim() != BEGIN_MANIFEST {
                        return Err(malformed("missing signed manifest header"));
                    }
                    section = Section::Headers;
                }
                Section::Headers => {
                    if line.trim().is_empty() {
                        section = Section::Body;
                    } else if let Some(value) = line.strip_prefix(KEY_ID_HEADER) {
                        key_id = Some(value.trim().to_string());
                    }
                }
                Section::Body => {
                    if line == BEGIN_SIGNATURE {
                        section = Section::Signature;
                    } else {
                        body.push(line);
                    }
                }
                Section::Signature => {
                    if line.trim() == END_SIGNATURE {
                        section = Section::Done;
                    } else {
                        encoded.push_str(line.trim());
                    }
                }
                Section::Done => {
                    if !line.trim().is_empty() {
                        return Err(malformed("trailing data after signature"));
                    }
                }
            }
        }

        if !matches!(section, Section::Done) {
            return Err(malformed("unterminated signed manifest"));
        }

        let key_id = key_id
            .filter(|k| !k.is_empty())
            .ok_or_else(|| malformed("missing Key-Id header"))?;
        let signature = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| malformed(&format!("bad signature encoding: {}", e)))?;

        Ok(Self {
            key_id,
            body: body.join("\n"),
            signature,
        })
    }

    /// 텍스트 블록으로 직렬화
    pub fn to_armored(&self) -> String {
        format!(
            "{}\n{} {}\n\n{}\n{}\n{}\n{}\n",
            BEGIN_MANIFEST,
            KEY_ID_HEADER,
            self.key_id,
            self.body,
            BEGIN_SIGNATURE,
            STANDARD.encode(&self.signature),
            END_SIGNATURE
        )
    }
}

fn malformed(message: &str) -> PluginError {
    PluginError::Verification(format!("malformed {}: {}", MANIFEST_FILE, message))
}

// ============================================================================
// SignatureManifest - 서명된 본문
// ============================================================================

/// 서명된 본문 내용
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureManifest {
    pub manifest_version: String,
    pub signature_type: SignatureType,
    pub signed_by_org: String,
    #[serde(default)]
    pub signed_by_org_name: String,
    #[serde(default)]
    pub root_urls: Vec<String>,
    pub plugin: String,
    pub version: String,
    #[serde(default)]
    pub time: i64,
    /// 상대 경로 -> sha256 hex
    pub files: BTreeMap<String, String>,
}

impl SignatureManifest {
    pub fn from_body(body: &str) -> PluginResult<Self> {
        serde_json::from_str(body).map_err(|e| malformed(&e.to_string()))
    }

    /// 지원하는 매니페스트 버전(2.x)인지
    pub fn is_supported_version(&self) -> bool {
        semver::Version::parse(&self.manifest_version)
            .map(|v| v.major == 2)
            .unwrap_or(false)
    }
}
