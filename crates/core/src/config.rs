//! 설정 관리 — watchpost.toml 파싱 및 런타임 설정
//!
//! [`WatchpostConfig`]는 실행 전체의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WATCHPOST_LIFECYCLE_PHASE_TIMEOUT_SECS=300` 형식)
//! 3. 설정 파일 (`watchpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), watchpost_core::error::WatchpostError> {
//! use watchpost_core::config::WatchpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WatchpostConfig::load("watchpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WatchpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WatchpostError};

/// Watchpost 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 단계 타임아웃 설정
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// 클러스터 접속 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 내장 관찰자 설정
    #[serde(default)]
    pub observers: ObserversConfig,
}

impl WatchpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        Self::load_with(path, |_| {}).await
    }

    /// 파일 → 환경변수 → `overrides` 순서로 적용한 뒤 검증합니다.
    ///
    /// 검증은 마지막 한 번만 수행되므로, 잘못된 파일 값도 CLI 인자로 고칠 수 있습니다.
    pub async fn load_with(
        path: impl AsRef<Path>,
        overrides: impl FnOnce(&mut Self),
    ) -> Result<Self, WatchpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WatchpostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WatchpostError> {
        toml::from_str(toml_str).map_err(|e| {
            WatchpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WATCHPOST_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WATCHPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WATCHPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.storage_dir, "WATCHPOST_GENERAL_STORAGE_DIR");

        // Lifecycle
        override_u64(
            &mut self.lifecycle.phase_timeout_secs,
            "WATCHPOST_LIFECYCLE_PHASE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.lifecycle.cleanup_timeout_secs,
            "WATCHPOST_LIFECYCLE_CLEANUP_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.lifecycle.cancel_grace_secs,
            "WATCHPOST_LIFECYCLE_CANCEL_GRACE_SECS",
        );
        override_u64(
            &mut self.lifecycle.workload_secs,
            "WATCHPOST_LIFECYCLE_WORKLOAD_SECS",
        );

        // Cluster
        override_string(&mut self.cluster.host, "WATCHPOST_CLUSTER_HOST");
        override_string(&mut self.cluster.bearer_token, "WATCHPOST_CLUSTER_BEARER_TOKEN");
        override_string(
            &mut self.cluster.certificate_authority,
            "WATCHPOST_CLUSTER_CERTIFICATE_AUTHORITY",
        );
        override_string(
            &mut self.cluster.client_certificate,
            "WATCHPOST_CLUSTER_CLIENT_CERTIFICATE",
        );
        override_string(&mut self.cluster.client_key, "WATCHPOST_CLUSTER_CLIENT_KEY");
        override_bool(
            &mut self.cluster.insecure_skip_tls_verify,
            "WATCHPOST_CLUSTER_INSECURE_SKIP_TLS_VERIFY",
        );

        // Observers
        override_csv(&mut self.observers.disabled, "WATCHPOST_OBSERVERS_DISABLED");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WatchpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.general.storage_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.storage_dir".to_owned(),
                reason: "storage directory must not be empty".to_owned(),
            }
            .into());
        }

        for (field, value) in [
            ("lifecycle.phase_timeout_secs", self.lifecycle.phase_timeout_secs),
            (
                "lifecycle.cleanup_timeout_secs",
                self.lifecycle.cleanup_timeout_secs,
            ),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "timeout must be greater than zero".to_owned(),
                }
                .into());
            }
        }

        if self.cluster.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.host".to_owned(),
                reason: "cluster host must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 산출물 저장 디렉토리
    pub storage_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            storage_dir: "/tmp/watchpost".to_owned(),
        }
    }
}

/// 단계 실행 제한 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// 단계별 최대 대기 시간 (초). 초과한 관찰자는 타임아웃 실패로 처리됩니다.
    pub phase_timeout_secs: u64,
    /// Cleanup 단계 최대 대기 시간 (초)
    pub cleanup_timeout_secs: u64,
    /// 취소 후 진행 중인 호출이 반환되기를 기다리는 시간 (초)
    pub cancel_grace_secs: u64,
    /// 워크로드 구간 길이 (초). 0이면 종료 시그널까지 대기합니다.
    pub workload_secs: u64,
}

impl LifecycleConfig {
    /// 단계 타임아웃
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    /// Cleanup 타임아웃
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    /// 취소 유예 시간
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 600,
            cleanup_timeout_secs: 120,
            cancel_grace_secs: 10,
            workload_secs: 0,
        }
    }
}

/// 클러스터 접속 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// API 서버 주소
    pub host: String,
    /// Bearer 토큰
    pub bearer_token: String,
    /// 클라이언트 인증서 (PEM)
    pub client_certificate: String,
    /// 클라이언트 키 (PEM)
    pub client_key: String,
    /// CA 인증서 (PEM)
    pub certificate_authority: String,
    /// TLS 검증 생략
    pub insecure_skip_tls_verify: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: "https://127.0.0.1:6443".to_owned(),
            bearer_token: String::new(),
            client_certificate: String::new(),
            client_key: String::new(),
            certificate_authority: String::new(),
            insecure_skip_tls_verify: false,
        }
    }
}

/// 내장 관찰자 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserversConfig {
    /// 비활성화할 관찰자 이름 목록
    pub disabled: Vec<String>,
}

impl ObserversConfig {
    /// 관찰자가 활성화되어 있는지 확인합니다.
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
