//! Error Tracker - 플러그인별 최근 에러
//!
//! 로드된 플러그인 목록과 별개로 호스트가 보여주는 에러 목록입니다.

use super::types::{ErrorCode, SignatureStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// 에러 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginErrorEntry {
    pub plugin_id: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_status: Option<SignatureStatus>,
    pub recorded_at: DateTime<Utc>,
}

/// 플러그인 ID -> 마지막 에러
#[derive(Debug, Default)]
pub struct ErrorTracker {
    errors: RwLock<HashMap<String, PluginErrorEntry>>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        plugin_id: &str,
        code: ErrorCode,
        message: impl Into<String>,
        signature_status: Option<SignatureStatus>,
    ) {
        let entry = PluginErrorEntry {
            plugin_id: plugin_id.to_string(),
            code,
            message: message.into(),
            signature_status,
            recorded_at: Utc::now(),
        };
        self.errors.write().insert(plugin_id.to_string(), entry);
    }

    pub fn clear(&self, plugin_id: &str) {
        self.errors.write().remove(plugin_id);
    }

    pub fn error(&self, plugin_id: &str) -> Option<PluginErrorEntry> {
        self.errors.read().get(plugin_id).cloned()
    }

    /// ID 순으로 정렬된 전체 목록
    pub fn errors(&self) -> Vec<PluginErrorEntry> {
        let mut errors: Vec<_> = self.errors.read().values().cloned().collect();
        errors.sort_by(|a, b| a.plugin_id.cmp(&b.plugin_id));
        errors
    }

    pub fn len(&self) -> usize {
        self.errors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let tracker = ErrorTracker::new();
        tracker.record(
            "b-panel",
            ErrorCode::SignatureMissing,
            "unsigned",
            Some(SignatureStatus::Unsigned),
        );
        tracker.record("a-app", ErrorCode::LegacyFramework, "legacy", None);
        tracker.record("a-app", ErrorCode::InitializationFailed, "boom", None);

        let errors = tracker.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].plugin_id, "a-app");
        assert_eq!(errors[0].code, ErrorCode::InitializationFailed);

        tracker.clear("a-app");
        assert!(tracker.error("a-app").is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_serialize() {
        let tracker = ErrorTracker::new();
        tracker.record("x-panel", ErrorCode::SignatureInvalid, "bad", Some(SignatureStatus::Invalid));
        let json = serde_json::to_value(tracker.error("x-panel").unwrap()).unwrap();
        assert_eq!(json["pluginId"], "x-panel");
        assert_eq!(json["code"], "signatureInvalid");
    }
}
