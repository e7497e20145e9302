//! 에러 타입 — 도메인별 에러 정의
//!
//! 오케스트레이터 밖으로 전파되는 에러는 설정/레지스트리 구성 에러와
//! 생명주기 호출 순서 위반뿐입니다. 관찰자 단계 에러는 모두
//! [`ResultRecord`](crate::result::ResultRecord)로 변환됩니다.

use crate::lifecycle::{LifecycleState, Phase};

/// Watchpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WatchpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 레지스트리 구성 에러 (첫 단계 이전에 발생하는 치명적 에러)
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 생명주기 호출 순서 위반
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// 관찰자 내부 에러
    #[error("observer error: {0}")]
    Observer(#[from] ObserverError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 레지스트리 구성 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 같은 이름의 관찰자가 이미 등록됨
    #[error("observer already registered: {name}")]
    DuplicateName { name: String },

    /// 관찰자 이름이 비어 있음
    #[error("observer name must not be empty")]
    EmptyName,
}

/// 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// 이전 단계가 끝나기 전에 다음 단계를 호출함
    #[error("cannot run {phase} while orchestrator is {state}")]
    OutOfOrder { phase: Phase, state: LifecycleState },
}

/// 관찰자가 반환하는 에러
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// 일반 실패
    #[error("{0}")]
    Failed(String),

    /// 클러스터 접근 실패
    #[error("cluster access failed: {0}")]
    Cluster(String),

    /// 컨텍스트 취소로 중단됨
    #[error("cancelled")]
    Cancelled,
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 파일 이름으로 사용할 수 없는 값
    #[error("invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// 직렬화 실패
    #[error("failed to serialize {path}: {reason}")]
    Serialize { path: String, reason: String },
}
