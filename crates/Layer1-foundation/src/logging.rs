//! Logging - tracing subscriber 초기화

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 전역 tracing subscriber 설치
///
/// `RUST_LOG`가 있으면 그 필터를, 없으면 `default_level`을 사용합니다.
/// 이미 설치된 경우 `false`를 반환하고 아무것도 하지 않습니다.
pub fn init_tracing(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}

/// 디버그 플래그로 기본 레벨 결정
pub fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_noop() {
        let _ = init_tracing(default_level(true));
        assert!(!init_tracing("info"));
    }
}
