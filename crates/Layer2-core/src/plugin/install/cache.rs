//! 버전 캐시와 설치 지표
//!
//! 둘 다 프로세스 전역이 아니라 설치 소스를 조립하는 쪽이 만들어 주입합니다.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// VersionCache
// ============================================================================

/// 버전 미지정 설치의 (id, url) -> 해석된 버전
#[derive(Debug, Default)]
pub struct VersionCache {
    versions: DashMap<(String, String), String>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(id: &str, url: Option<&str>) -> (String, String) {
        (id.to_string(), url.unwrap_or_default().to_string())
    }

    pub fn get(&self, id: &str, url: Option<&str>) -> Option<String> {
        self.versions
            .get(&Self::key(id, url))
            .map(|v| v.value().clone())
    }

    pub fn set(&self, id: &str, url: Option<&str>, version: impl Into<String>) {
        self.versions.insert(Self::key(id, url), version.into());
    }

    pub fn remove(&self, id: &str, url: Option<&str>) {
        self.versions.remove(&Self::key(id, url));
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

// ============================================================================
// InstallMetrics
// ============================================================================

/// 설치 카운터
#[derive(Debug, Default)]
pub struct InstallMetrics {
    downloads: AtomicU64,
    cache_hits: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
}

/// 특정 시점의 카운터 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub downloads: u64,
    pub cache_hits: u64,
    pub duplicates: u64,
    pub failures: u64,
}

impl InstallMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloads: self.downloads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_version_cache_keyed_by_url() {
        let cache = VersionCache::new();
        cache.set("acme-panel", None, "1.0.0");
        cache.set("acme-panel", Some("https://a.example/acme.zip"), "2.0.0");

        assert_eq!(cache.get("acme-panel", None).as_deref(), Some("1.0.0"));
        assert_eq!(
            cache.get("acme-panel", Some("https://a.example/acme.zip")).as_deref(),
            Some("2.0.0")
        );
        assert!(cache.get("acme-panel", Some("https://b.example/acme.zip")).is_none());

        cache.remove("acme-panel", None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_metrics() {
        let metrics = Arc::new(InstallMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_download();
                        metrics.record_cache_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.downloads, 400);
        assert_eq!(snapshot.cache_hits, 400);
        assert_eq!(snapshot.failures, 0);
    }
}
