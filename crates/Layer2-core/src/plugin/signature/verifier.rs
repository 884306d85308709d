//! Manifest Verifier - Ed25519 서명 검증
//!
//! 신뢰 키는 내장 기본 키, 또는 원격 키 목록에서 받아 `KeyStore`에 캐시한 키입니다.
//! 원격 키 사용은 `SignatureConfig::dynamic_keys`로 켭니다 (기본 꺼짐).
//! 모르는 키 ID가 와도 원격 목록은 `refresh_interval`에 한 번만 받습니다.

use super::keystore::KeyStore;
use crate::plugin::error::{PluginError, PluginResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};
use kiln_foundation::SignatureConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 내장 신뢰 키 ID
pub const DEFAULT_KEY_ID: &str = "7e4d0cd6e2d0a4c5";

/// 내장 신뢰 키
pub const DEFAULT_PUBLIC_KEY: &str = "-----BEGIN KILN PUBLIC KEY-----
jdvh7Len9lpVJJnFUQORSm5hw6OGQQxu6cSNdpZ4too=
-----END KILN PUBLIC KEY-----
";

const BEGIN_PUBLIC_KEY: &str = "-----BEGIN KILN PUBLIC KEY-----";
const END_PUBLIC_KEY: &str = "-----END KILN PUBLIC KEY-----";

/// 원격 키 목록 재요청 최소 간격 (초)
const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 300;

// ============================================================================
// 키 목록 응답
// ============================================================================

#[derive(Debug, Deserialize)]
struct KeyListing {
    #[serde(default)]
    items: Vec<KeyListingItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyListingItem {
    key_id: String,
    public_key: String,
    /// 유효 시작 시각 (unix seconds)
    #[serde(default)]
    since: i64,
}

// ============================================================================
// ManifestVerifier
// ============================================================================

/// 서명 검증기
pub struct ManifestVerifier {
    dynamic_keys: bool,
    key_listing_url: String,
    client: reqwest::Client,
    store: Arc<dyn KeyStore>,
    static_keys: HashMap<String, String>,
    refresh_interval: Duration,
    /// 키 조회/캐시 채우기 직렬화. 마지막 원격 요청 시각 (실패 포함)
    lookup: Mutex<Option<DateTime<Utc>>>,
}

impl ManifestVerifier {
    pub fn new(config: &SignatureConfig, store: Arc<dyn KeyStore>) -> Self {
        let mut static_keys = HashMap::new();
        static_keys.insert(DEFAULT_KEY_ID.to_string(), DEFAULT_PUBLIC_KEY.to_string());

        Self {
            dynamic_keys: config.dynamic_keys,
            key_listing_url: config.key_listing_url.clone(),
            client: reqwest::Client::new(),
            store,
            static_keys,
            refresh_interval: Duration::seconds(DEFAULT_REFRESH_INTERVAL_SECS),
            lookup: Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// 추가 정적 신뢰 키
    pub fn with_static_key(mut self, key_id: impl Into<String>, armored: impl Into<String>) -> Self {
        self.static_keys.insert(key_id.into(), armored.into());
        self
    }

    /// 키 ID로 armored 공개키 조회
    pub async fn public_key(&self, key_id: &str) -> PluginResult<String> {
        let mut last_attempt = self.lookup.lock().await;

        if self.dynamic_keys {
            if let Some(key) = self.store.get(key_id).await? {
                return Ok(key);
            }

            if self.refresh_due(*last_attempt).await? {
                *last_attempt = Some(Utc::now());
                match self.refresh_keys().await {
                    Ok(()) => {
                        if let Some(key) = self.store.get(key_id).await? {
                            return Ok(key);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to refresh signing keys from {}: {}", self.key_listing_url, e);
                    }
                }
            } else {
                debug!(key_id = %key_id, "Signing keys refreshed recently, not fetching again");
            }
        }

        self.static_keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| PluginError::KeyNotFound(key_id.to_string()))
    }

    /// 마지막 시도와 마지막 성공 모두 간격 밖일 때만 재요청
    async fn refresh_due(&self, last_attempt: Option<DateTime<Utc>>) -> PluginResult<bool> {
        let now = Utc::now();
        let recent = |at: Option<DateTime<Utc>>| at.is_some_and(|at| now - at < self.refresh_interval);

        if recent(last_attempt) {
            return Ok(false);
        }
        Ok(!recent(self.store.last_updated().await?))
    }

    /// 원격 키 목록을 받아 저장소에 기록
    ///
    /// 아직 유효 기간이 시작되지 않은 키(`since`가 미래)는 저장하지 않습니다.
    async fn refresh_keys(&self) -> PluginResult<()> {
        debug!("Fetching signing keys from {}", self.key_listing_url);

        let response = self.client.get(&self.key_listing_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::HttpStatus {
                status: status.as_u16(),
                url: self.key_listing_url.clone(),
            });
        }

        let listing: KeyListing = response.json().await?;
        let now = Utc::now();
        let mut cached = 0;
        for item in &listing.items {
            if item.since > now.timestamp() {
                debug!(key_id = %item.key_id, since = item.since, "Signing key not valid yet, skipping");
                continue;
            }
            debug!(key_id = %item.key_id, since = item.since, "Caching signing key");
            self.store.set(&item.key_id, &item.public_key).await?;
            cached += 1;
        }
        self.store.set_last_updated(now).await?;

        info!("Cached {} of {} signing keys", cached, listing.items.len());
        Ok(())
    }

    /// 본문에 대한 분리 서명 검증
    pub async fn verify(&self, key_id: &str, body: &[u8], signature: &[u8]) -> PluginResult<()> {
        let armored = self.public_key(key_id).await?;
        let key = parse_public_key(&armored)?;

        let signature = Ed25519Signature::from_slice(signature)
            .map_err(|e| PluginError::Verification(format!("bad signature: {}", e)))?;

        key.verify_strict(body, &signature)
            .map_err(|e| PluginError::Verification(format!("signature mismatch for key {}: {}", key_id, e)))
    }
}

/// armored 공개키 파싱
pub fn parse_public_key(armored: &str) -> PluginResult<VerifyingKey> {
    let trimmed = armored.trim();
    if !trimmed.starts_with(BEGIN_PUBLIC_KEY) || !trimmed.ends_with(END_PUBLIC_KEY) {
        return Err(PluginError::Verification("public key is not armored".into()));
    }

    let encoded: String = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| PluginError::Verification(format!("bad public key encoding: {}", e)))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| PluginError::Verification(format!("public key has {} bytes", bytes.len())))?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| PluginError::Verification(format!("bad public key: {}", e)))
}

/// 공개키를 armored 형식으로
pub fn armor_public_key(key: &VerifyingKey) -> String {
    format!(
        "{}\n{}\n{}\n",
        BEGIN_PUBLIC_KEY,
        STANDARD.encode(key.to_bytes()),
        END_PUBLIC_KEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::signature::keystore::InMemoryKeyStore;
    use ed25519_dalek::{Signer, SigningKey};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// 고정 JSON을 돌려주는 키 목록 서버. 받은 요청 수를 셉니다.
    fn serve_key_listing(body: String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/plugins/ci/keys", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let reader = BufReader::new(stream.try_clone().unwrap());
                for line in reader.lines() {
                    match line {
                        Ok(line) if !line.is_empty() => continue,
                        _ => break,
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (url, hits)
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn verifier(config: SignatureConfig, store: Arc<dyn KeyStore>) -> ManifestVerifier {
        ManifestVerifier::new(&config, store)
            .with_static_key("test-key", armor_public_key(&signing_key().verifying_key()))
    }

    #[test]
    fn test_default_key_parses() {
        assert!(parse_public_key(DEFAULT_PUBLIC_KEY).is_ok());
        assert!(parse_public_key("garbage").is_err());

        let short = format!("{}\nAQID\n{}", BEGIN_PUBLIC_KEY, END_PUBLIC_KEY);
        assert!(parse_public_key(&short).is_err());
    }

    #[tokio::test]
    async fn test_verify_with_static_key() {
        let v = verifier(SignatureConfig::default(), Arc::new(InMemoryKeyStore::new()));
        let body = b"{\"plugin\":\"acme-panel\"}";
        let sig = signing_key().sign(body).to_bytes();

        v.verify("test-key", body, &sig).await.unwrap();

        let tampered = b"{\"plugin\":\"evil-panel\"}";
        assert!(matches!(
            v.verify("test-key", tampered, &sig).await,
            Err(PluginError::Verification(_))
        ));
        assert!(matches!(
            v.verify("unknown", body, &sig).await,
            Err(PluginError::KeyNotFound(_))
        ));
        assert!(v.verify("test-key", body, &[0u8; 10]).await.is_err());
    }

    #[tokio::test]
    async fn test_dynamic_keys_use_store_first() {
        let store = Arc::new(InMemoryKeyStore::new());
        let other = SigningKey::from_bytes(&[9u8; 32]);
        store
            .set("rotated", &armor_public_key(&other.verifying_key()))
            .await
            .unwrap();

        let config = SignatureConfig {
            dynamic_keys: true,
            key_listing_url: "http://127.0.0.1:9/keys".into(),
        };
        let v = verifier(config, store);

        let body = b"body";
        v.verify("rotated", body, &other.sign(body).to_bytes())
            .await
            .unwrap();

        // 키 목록을 못 받아도 정적 키로 대체
        v.verify("test-key", body, &signing_key().sign(body).to_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dynamic_keys_fetched_from_listing() {
        let fetched = SigningKey::from_bytes(&[11u8; 32]);
        let future = SigningKey::from_bytes(&[12u8; 32]);
        let now = Utc::now().timestamp();
        let body = serde_json::json!({
            "items": [
                {
                    "keyId": "fetched",
                    "publicKey": armor_public_key(&fetched.verifying_key()),
                    "since": now - 60
                },
                {
                    "keyId": "not-yet-valid",
                    "publicKey": armor_public_key(&future.verifying_key()),
                    "since": now + 3600
                }
            ]
        })
        .to_string();
        let (url, hits) = serve_key_listing(body);

        let store = Arc::new(InMemoryKeyStore::new());
        let config = SignatureConfig {
            dynamic_keys: true,
            key_listing_url: url,
        };
        let v = verifier(config, store.clone());

        let payload = b"{\"plugin\":\"acme-panel\"}";
        v.verify("fetched", payload, &fetched.sign(payload).to_bytes())
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.last_updated().await.unwrap().is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // 유효 시작 전 키는 저장되지 않음
        assert!(matches!(
            v.verify("not-yet-valid", payload, &future.sign(payload).to_bytes()).await,
            Err(PluginError::KeyNotFound(_))
        ));
        assert!(store.get("not-yet-valid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_keys_do_not_refetch_within_interval() {
        let (url, hits) = serve_key_listing(r#"{"items":[]}"#.to_string());
        let config = SignatureConfig {
            dynamic_keys: true,
            key_listing_url: url,
        };
        let v = verifier(config, Arc::new(InMemoryKeyStore::new()));

        for i in 0..5 {
            let result = v.public_key(&format!("bogus-{}", i)).await;
            assert!(matches!(result, Err(PluginError::KeyNotFound(_))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // 간격이 0이면 매번 재요청
        let v = v.with_refresh_interval(Duration::zero());
        v.public_key("bogus-again").await.unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_lookups() {
        let v = Arc::new(verifier(
            SignatureConfig::default(),
            Arc::new(InMemoryKeyStore::new()),
        ));
        let body = b"concurrent";
        let sig = signing_key().sign(body).to_bytes();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let v = Arc::clone(&v);
            handles.push(tokio::spawn(async move {
                v.verify("test-key", body, &sig).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
