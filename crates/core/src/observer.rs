//! 관찰자 trait — 테스트 실행 동안 클러스터를 지켜보는 플러그인 단위
//!
//! 모든 관찰자는 [`Observer`] trait을 구현합니다. 오케스트레이터는 실행마다
//! 아래 순서로 각 메서드를 정확히 한 번씩 호출합니다 (`cleanup`만 예외).
//!
//! ```text
//! start_collection → collect_data → construct_computed_intervals
//!   → evaluate_tests → write_content_to_storage → cleanup
//! ```
//!
//! 서로 다른 관찰자의 같은 단계는 동시에 실행될 수 있지만,
//! 한 관찰자의 N 단계와 N+1 단계가 겹치는 일은 없습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::ClusterConfig;
use crate::error::WatchpostError;
use crate::interval::{IntervalRecorder, Intervals};
use crate::result::ResultRecord;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── ClusterAccess ───────────────────────────────────────────────────

/// 클러스터 접속 정보
///
/// 모든 관찰자가 읽기 전용으로 공유합니다. 오케스트레이터는 이 값을
/// 해석하지 않고 StartCollection 단계에 그대로 전달합니다.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClusterAccess {
    /// API 서버 주소
    pub host: String,
    /// Bearer 토큰
    pub bearer_token: Option<String>,
    /// 클라이언트 인증서 (PEM)
    pub client_certificate: Option<String>,
    /// 클라이언트 키 (PEM)
    pub client_key: Option<String>,
    /// CA 인증서 (PEM)
    pub certificate_authority: Option<String>,
    /// TLS 검증 생략 여부
    pub insecure_skip_tls_verify: bool,
}

impl ClusterAccess {
    /// 주소만 가진 접속 정보를 생성합니다.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// 설정 섹션에서 접속 정보를 만듭니다. 빈 문자열은 미설정으로 취급합니다.
    pub fn from_config(config: &ClusterConfig) -> Self {
        fn non_empty(value: &str) -> Option<String> {
            (!value.is_empty()).then(|| value.to_owned())
        }

        Self {
            host: config.host.clone(),
            bearer_token: non_empty(&config.bearer_token),
            client_certificate: non_empty(&config.client_certificate),
            client_key: non_empty(&config.client_key),
            certificate_authority: non_empty(&config.certificate_authority),
            insecure_skip_tls_verify: config.insecure_skip_tls_verify,
        }
    }
}

// 토큰과 키는 로그에 남기지 않습니다.
impl fmt::Debug for ClusterAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterAccess")
            .field("host", &self.host)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field(
                "client_certificate",
                &self.client_certificate.as_ref().map(|_| "<set>"),
            )
            .field("client_key", &self.client_key.as_ref().map(|_| "<redacted>"))
            .field(
                "certificate_authority",
                &self.certificate_authority.as_ref().map(|_| "<set>"),
            )
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

// ─── ResourceSnapshot ────────────────────────────────────────────────

/// 실행 종료 시점의 추적 리소스 스냅샷
///
/// 리소스 종류 → 키 → 객체 형태의 불투명한 맵입니다.
/// 호출자가 소유하며 관찰자는 읽기만 합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSnapshot(BTreeMap<String, BTreeMap<String, serde_json::Value>>);

impl ResourceSnapshot {
    /// 빈 스냅샷을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 리소스 객체를 추가합니다.
    pub fn insert(
        &mut self,
        kind: impl Into<String>,
        key: impl Into<String>,
        object: serde_json::Value,
    ) {
        self.0
            .entry(kind.into())
            .or_default()
            .insert(key.into(), object);
    }

    /// 종류별 리소스 맵을 조회합니다.
    pub fn kind(&self, kind: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.0.get(kind)
    }

    /// 등록된 리소스 종류 목록
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// 전체 객체 수
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── TimeWindow ──────────────────────────────────────────────────────

/// 주 워크로드 구간
///
/// 호출자가 지정하며 모든 관찰자에게 수정 없이 전달됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// 시작 시각
    pub begin: SystemTime,
    /// 종료 시각
    pub end: SystemTime,
}

impl TimeWindow {
    /// 구간을 생성합니다.
    pub fn new(begin: SystemTime, end: SystemTime) -> Self {
        Self { begin, end }
    }
}

// ─── CollectedData ───────────────────────────────────────────────────

/// CollectData 단계의 출력
#[derive(Debug, Clone, Default)]
pub struct CollectedData {
    /// 원시 인터벌
    pub intervals: Intervals,
    /// 수집 단계에서 바로 판정한 결과
    pub results: Vec<ResultRecord>,
}

impl CollectedData {
    /// 인터벌만 가진 출력을 생성합니다.
    pub fn intervals(intervals: impl Into<Intervals>) -> Self {
        Self {
            intervals: intervals.into(),
            results: Vec::new(),
        }
    }

    /// 결과 레코드를 추가합니다.
    pub fn with_results(mut self, results: Vec<ResultRecord>) -> Self {
        self.results = results;
        self
    }
}

// ─── Observer Trait ──────────────────────────────────────────────────

/// 모든 관찰자가 구현하는 trait
///
/// 어느 단계에서 에러를 반환해도 실행은 중단되지 않습니다. 오케스트레이터가
/// 에러를 관찰자 이름이 붙은 실패 레코드로 변환하고, 해당 관찰자도 이후
/// 단계에 계속 참여합니다.
///
/// # 구현 예시
/// ```ignore
/// struct NodeWatcher {
///     guard: CleanupGuard,
/// }
///
/// impl Observer for NodeWatcher {
///     async fn start_collection(&self, cancel: &CancellationToken, cluster: &ClusterAccess,
///         recorder: &IntervalRecorder) -> Result<(), WatchpostError> {
///         // watch 시작
///         Ok(())
///     }
///     // ...
///     async fn cleanup(&self, _cancel: &CancellationToken) -> Result<(), WatchpostError> {
///         self.guard.run(|| async { Ok(()) }).await
///     }
/// }
/// ```
pub trait Observer: Send + Sync {
    /// 수집에 필요한 리소스를 준비합니다 (watch 시작, 샘플러 기동 등).
    ///
    /// 취소 토큰이 취소되면 즉시 반환해야 합니다.
    fn start_collection(
        &self,
        cancel: &CancellationToken,
        cluster: &ClusterAccess,
        recorder: &IntervalRecorder,
    ) -> impl Future<Output = Result<(), WatchpostError>> + Send;

    /// 워크로드 구간이 끝난 뒤 한 번 호출되어 원시 인터벌과 결과를 수집합니다.
    ///
    /// `storage_dir`은 StartCollection에서 남긴 임시 데이터를 읽는 용도이며,
    /// 최종 산출물은 [`write_content_to_storage`](Self::write_content_to_storage)에서만 씁니다.
    fn collect_data(
        &self,
        cancel: &CancellationToken,
        storage_dir: &Path,
        window: &TimeWindow,
    ) -> impl Future<Output = Result<CollectedData, WatchpostError>> + Send;

    /// 모든 관찰자의 원시 인터벌 합집합을 받아 파생 인터벌을 계산합니다.
    ///
    /// 새로 만든 인터벌만 반환해야 합니다. 같은 단계의 다른 관찰자 출력에
    /// 의존해서는 안 됩니다.
    fn construct_computed_intervals(
        &self,
        cancel: &CancellationToken,
        starting: &Intervals,
        resources: &ResourceSnapshot,
        window: &TimeWindow,
    ) -> impl Future<Output = Result<Intervals, WatchpostError>> + Send;

    /// 최종 인터벌 스트림을 검사하여 판정 결과를 만듭니다.
    fn evaluate_tests(
        &self,
        cancel: &CancellationToken,
        final_intervals: &Intervals,
    ) -> impl Future<Output = Result<Vec<ResultRecord>, WatchpostError>> + Send;

    /// 관찰자 소유 산출물을 저장합니다.
    ///
    /// 인터벌과 결과 레코드는 오케스트레이터 호출자가 따로 저장하므로 쓰지 않습니다.
    /// 이전 단계가 실패했더라도 안전하게 호출될 수 있어야 합니다.
    fn write_content_to_storage(
        &self,
        cancel: &CancellationToken,
        storage_dir: &Path,
        time_suffix: &str,
        final_intervals: &Intervals,
        resources: &ResourceSnapshot,
    ) -> impl Future<Output = Result<(), WatchpostError>> + Send;

    /// StartCollection에서 확보한 리소스를 해제합니다.
    ///
    /// 반드시 멱등이어야 합니다. 정상 종료, 중단 핸들러, 타임아웃 강제 정리 등에서
    /// 여러 번, 동시에 호출될 수 있습니다. [`CleanupGuard`](crate::cleanup::CleanupGuard) 참고.
    fn cleanup(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), WatchpostError>> + Send;
}

// ─── DynObserver Trait ───────────────────────────────────────────────

/// dyn-compatible 관찰자 trait
///
/// `Observer` trait은 RPITIT를 사용하므로 `dyn Observer`가 불가합니다.
/// `DynObserver`는 `BoxFuture`를 반환하여 `Arc<dyn DynObserver>`로
/// 서로 다른 관찰자를 한 레지스트리에서 관리할 수 있게 합니다.
pub trait DynObserver: Send + Sync {
    /// [`Observer::start_collection`]
    fn start_collection<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        cluster: &'a ClusterAccess,
        recorder: &'a IntervalRecorder,
    ) -> BoxFuture<'a, Result<(), WatchpostError>>;

    /// [`Observer::collect_data`]
    fn collect_data<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        storage_dir: &'a Path,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, Result<CollectedData, WatchpostError>>;

    /// [`Observer::construct_computed_intervals`]
    fn construct_computed_intervals<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        starting: &'a Intervals,
        resources: &'a ResourceSnapshot,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, Result<Intervals, WatchpostError>>;

    /// [`Observer::evaluate_tests`]
    fn evaluate_tests<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        final_intervals: &'a Intervals,
    ) -> BoxFuture<'a, Result<Vec<ResultRecord>, WatchpostError>>;

    /// [`Observer::write_content_to_storage`]
    fn write_content_to_storage<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        storage_dir: &'a Path,
        time_suffix: &'a str,
        final_intervals: &'a Intervals,
        resources: &'a ResourceSnapshot,
    ) -> BoxFuture<'a, Result<(), WatchpostError>>;

    /// [`Observer::cleanup`]
    fn cleanup<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), WatchpostError>>;
}

/// Observer를 구현한 타입은 자동으로 DynObserver도 구현됩니다.
impl<T: Observer> DynObserver for T {
    fn start_collection<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        cluster: &'a ClusterAccess,
        recorder: &'a IntervalRecorder,
    ) -> BoxFuture<'a, Result<(), WatchpostError>> {
        Box::pin(Observer::start_collection(self, cancel, cluster, recorder))
    }

    fn collect_data<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        storage_dir: &'a Path,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, Result<CollectedData, WatchpostError>> {
        Box::pin(Observer::collect_data(self, cancel, storage_dir, window))
    }

    fn construct_computed_intervals<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        starting: &'a Intervals,
        resources: &'a ResourceSnapshot,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, Result<Intervals, WatchpostError>> {
        Box::pin(Observer::construct_computed_intervals(
            self, cancel, starting, resources, window,
        ))
    }

    fn evaluate_tests<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        final_intervals: &'a Intervals,
    ) -> BoxFuture<'a, Result<Vec<ResultRecord>, WatchpostError>> {
        Box::pin(Observer::evaluate_tests(self, cancel, final_intervals))
    }

    fn write_content_to_storage<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        storage_dir: &'a Path,
        time_suffix: &'a str,
        final_intervals: &'a Intervals,
        resources: &'a ResourceSnapshot,
    ) -> BoxFuture<'a, Result<(), WatchpostError>> {
        Box::pin(Observer::write_content_to_storage(
            self,
            cancel,
            storage_dir,
            time_suffix,
            final_intervals,
            resources,
        ))
    }

    fn cleanup<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), WatchpostError>> {
        Box::pin(Observer::cleanup(self, cancel))
    }
}
