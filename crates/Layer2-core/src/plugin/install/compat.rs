//! Compat - 호스트 호환성 기술자 (버전, OS, 아키텍처)

use semver::Version;
use std::fmt;

/// 아카이브 버전/체크섬 선택 기준
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatOpts {
    pub host_version: Option<Version>,
    pub os: String,
    pub arch: String,
}

impl CompatOpts {
    pub fn new(host_version: Option<Version>, os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            host_version,
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// 현재 실행 환경 기준
    pub fn current(host_version: Option<&str>) -> Self {
        let host_version = host_version.and_then(|v| Version::parse(v.trim_start_matches('v')).ok());
        Self::new(host_version, host_os(), host_arch())
    }

    /// 카탈로그 키 (`linux-amd64`)
    pub fn os_arch(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for CompatOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host_version {
            Some(v) => write!(f, "host {} on {}", v, self.os_arch()),
            None => write!(f, "{}", self.os_arch()),
        }
    }
}

/// 카탈로그 표기 OS 이름
pub fn host_os() -> &'static str {
    std::env::consts::OS
}

/// 카탈로그 표기 아키텍처 이름
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_parses_host_version() {
        let compat = CompatOpts::current(Some("v10.2.1"));
        assert_eq!(compat.host_version, Some(Version::new(10, 2, 1)));
        assert_eq!(compat.os, host_os());

        let compat = CompatOpts::current(Some("not-a-version"));
        assert!(compat.host_version.is_none());
    }

    #[test]
    fn test_os_arch_key() {
        let compat = CompatOpts::new(None, "linux", "arm64");
        assert_eq!(compat.os_arch(), "linux-arm64");
        assert_eq!(compat.to_string(), "linux-arm64");
    }
}
