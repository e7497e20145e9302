#![doc = include_str!("../README.md")]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod interval;
pub mod lifecycle;
pub mod metrics;
pub mod observer;
pub mod registry;
pub mod result;
pub mod storage;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, LifecycleError, ObserverError, RegistryError, StorageError, WatchpostError,
};

// 설정
pub use config::WatchpostConfig;

// 관찰자 trait
pub use observer::{
    BoxFuture, ClusterAccess, CollectedData, DynObserver, Observer, ResourceSnapshot, TimeWindow,
};

// 레지스트리 / 오케스트레이터
pub use lifecycle::{
    CleanupHandle, LifecycleOptions, LifecycleOrchestrator, LifecycleState, Phase, RunInputs,
    RunReport,
};
pub use registry::{ObserverRegistration, ObserverRegistry};

// 도메인 타입
pub use cleanup::CleanupGuard;
pub use interval::{Interval, IntervalRecorder, Intervals};
pub use result::{Outcome, OutcomeCounts, ResultRecord};
pub use storage::StorageSink;
