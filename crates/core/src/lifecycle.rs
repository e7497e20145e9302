//! 생명주기 오케스트레이터 — 관찰자 단계 실행, 장벽, 장애 격리
//!
//! [`LifecycleOrchestrator`]는 평탄화된 레지스트리를 고정된 순서의 단계로 진행시킵니다.
//!
//! ```text
//! Pending ─start_collection→ Collecting ─collect_data→ DataCollected
//!   ─construct_computed_intervals→ IntervalsConstructed
//!   ─evaluate_tests→ TestsEvaluated ─write_content_to_storage→ Persisted
//!
//! (모든 상태) ─cleanup→ CleanedUp
//! ```
//!
//! 각 단계는 관찰자마다 태스크 하나를 띄우고, 모든 태스크가 끝나거나
//! 실패로 확정될 때까지 기다린 뒤에만 다음 단계로 넘어갑니다.
//! 관찰자 에러, 패닉, 타임아웃, 취소는 모두 실패 [`ResultRecord`]로 변환되며
//! 오케스트레이터 밖으로 전파되는 에러는 호출 순서 위반뿐입니다.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, WatchpostError};
use crate::interval::{IntervalDrain, IntervalRecorder, Intervals};
use crate::metrics as m;
use crate::observer::{ClusterAccess, DynObserver, ResourceSnapshot, TimeWindow};
use crate::registry::{ObserverRegistration, ObserverRegistry};
use crate::result::{OutcomeCounts, ResultRecord};

// ─── Phase / LifecycleState ──────────────────────────────────────────

/// 관찰자 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// 수집 준비
    StartCollection,
    /// 원시 데이터 수집
    CollectData,
    /// 파생 인터벌 계산
    ConstructIntervals,
    /// 테스트 판정
    EvaluateTests,
    /// 산출물 저장
    WriteStorage,
    /// 리소스 해제
    Cleanup,
}

impl Phase {
    /// 실행 순서대로 나열한 모든 단계
    pub const ALL: [Phase; 6] = [
        Phase::StartCollection,
        Phase::CollectData,
        Phase::ConstructIntervals,
        Phase::EvaluateTests,
        Phase::WriteStorage,
        Phase::Cleanup,
    ];

    /// 리포트와 메트릭에 쓰이는 사람이 읽을 수 있는 이름
    pub fn label(self) -> &'static str {
        match self {
            Self::StartCollection => "setup",
            Self::CollectData => "collection",
            Self::ConstructIntervals => "interval construction",
            Self::EvaluateTests => "test evaluation",
            Self::WriteStorage => "storage",
            Self::Cleanup => "cleanup",
        }
    }

    /// 이 단계를 시작할 수 있는 상태. Cleanup은 어느 상태에서나 가능합니다.
    fn required_state(self) -> Option<LifecycleState> {
        match self {
            Self::StartCollection => Some(LifecycleState::Pending),
            Self::CollectData => Some(LifecycleState::Collecting),
            Self::ConstructIntervals => Some(LifecycleState::DataCollected),
            Self::EvaluateTests => Some(LifecycleState::IntervalsConstructed),
            Self::WriteStorage => Some(LifecycleState::TestsEvaluated),
            Self::Cleanup => None,
        }
    }

    /// 이 단계가 끝난 뒤의 상태
    fn settled_state(self) -> LifecycleState {
        match self {
            Self::StartCollection => LifecycleState::Collecting,
            Self::CollectData => LifecycleState::DataCollected,
            Self::ConstructIntervals => LifecycleState::IntervalsConstructed,
            Self::EvaluateTests => LifecycleState::TestsEvaluated,
            Self::WriteStorage => LifecycleState::Persisted,
            Self::Cleanup => LifecycleState::CleanedUp,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 오케스트레이터 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// 아직 아무 단계도 실행하지 않음
    Pending,
    /// StartCollection 완료, 워크로드 진행 중
    Collecting,
    /// CollectData 완료
    DataCollected,
    /// ConstructComputedIntervals 완료
    IntervalsConstructed,
    /// EvaluateTests 완료
    TestsEvaluated,
    /// WriteContentToStorage 완료
    Persisted,
    /// Cleanup 완료 (종단 상태)
    CleanedUp,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Collecting => "collecting",
            Self::DataCollected => "data collected",
            Self::IntervalsConstructed => "intervals constructed",
            Self::TestsEvaluated => "tests evaluated",
            Self::Persisted => "persisted",
            Self::CleanedUp => "cleaned up",
        };
        f.write_str(s)
    }
}

// ─── Options / Inputs ────────────────────────────────────────────────

/// 단계 실행 제한
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// 단계(1~5)별 최대 대기 시간
    pub phase_timeout: Duration,
    /// Cleanup 단계 최대 대기 시간
    pub cleanup_timeout: Duration,
    /// 취소 후 진행 중인 호출에 주는 유예 시간
    pub cancel_grace: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for LifecycleOptions {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            phase_timeout: config.phase_timeout(),
            cleanup_timeout: config.cleanup_timeout(),
            cancel_grace: config.cancel_grace(),
        }
    }
}

/// [`LifecycleOrchestrator::run`]에 넘기는 호출자 입력
#[derive(Debug, Clone)]
pub struct RunInputs {
    /// 클러스터 접속 정보
    pub cluster: ClusterAccess,
    /// 산출물 디렉토리
    pub storage_dir: PathBuf,
    /// 산출물 파일 이름 접미어
    pub time_suffix: String,
    /// 실행 종료 시점의 리소스 스냅샷
    pub resources: ResourceSnapshot,
}

impl RunInputs {
    /// 필수 입력으로 생성합니다.
    pub fn new(cluster: ClusterAccess, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            cluster,
            storage_dir: storage_dir.into(),
            time_suffix: String::new(),
            resources: ResourceSnapshot::default(),
        }
    }

    /// 파일 이름 접미어를 설정합니다.
    pub fn with_time_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.time_suffix = suffix.into();
        self
    }

    /// 리소스 스냅샷을 설정합니다.
    pub fn with_resources(mut self, resources: ResourceSnapshot) -> Self {
        self.resources = resources;
        self
    }
}

// ─── RunReport ───────────────────────────────────────────────────────

/// 한 번의 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 실행 ID
    pub run_id: String,
    /// 마지막 상태
    pub state: LifecycleState,
    /// 취소로 일부 단계를 건너뛰었는지 여부
    pub cancelled: bool,
    /// 판정 집계
    pub counts: OutcomeCounts,
    /// 최종 인터벌 스트림 (원시 + 파생, 시작 시각 정렬)
    pub intervals: Intervals,
    /// 모든 결과 레코드 (관찰자 출력 + 변환된 실패)
    pub results: Vec<ResultRecord>,
}

impl RunReport {
    /// 실패 레코드가 하나라도 있는지 확인합니다.
    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// 특정 관찰자가 만든 레코드만 반환합니다.
    pub fn results_from<'a>(&'a self, observer: &'a str) -> impl Iterator<Item = &'a ResultRecord> {
        self.results.iter().filter(move |r| r.source == observer)
    }
}

// ─── Catch-and-convert ───────────────────────────────────────────────

/// 관찰자 태스크 하나의 종료 형태
enum TaskOutcome<T> {
    Completed(Result<T, WatchpostError>),
    Panicked(String),
    TimedOut(Duration),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    fn from_join(joined: Result<Result<T, WatchpostError>, JoinError>) -> Self {
        match joined {
            Ok(result) => Self::Completed(result),
            Err(e) if e.is_panic() => Self::Panicked(panic_message(e.into_panic())),
            Err(_) => Self::Cancelled,
        }
    }

    fn abandoned(cancel_seen: bool, timeout: Duration) -> Self {
        if cancel_seen {
            Self::Cancelled
        } else {
            Self::TimedOut(timeout)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// 태스크 결과를 값 또는 관찰자 이름이 붙은 실패 레코드로 변환합니다.
fn settle<T>(
    registration: &ObserverRegistration,
    phase: Phase,
    outcome: TaskOutcome<T>,
) -> Result<T, ResultRecord> {
    let (kind, detail) = match outcome {
        TaskOutcome::Completed(Ok(value)) => return Ok(value),
        TaskOutcome::Completed(Err(e)) => ("error", e.to_string()),
        TaskOutcome::Panicked(message) => ("panic", format!("panicked: {message}")),
        TaskOutcome::TimedOut(after) => (
            "timeout",
            format!("did not finish {phase} within {}s", after.as_secs_f64()),
        ),
        TaskOutcome::Cancelled => ("cancelled", format!("{phase} abandoned after cancellation")),
    };

    warn!(
        observer = registration.name(),
        %phase,
        kind,
        error = detail.as_str(),
        "observer phase failed"
    );
    counter!(
        m::OBSERVER_FAILURES_TOTAL,
        m::LABEL_OBSERVER => registration.name().to_owned(),
        m::LABEL_PHASE => phase.label(),
        m::LABEL_KIND => kind
    )
    .increment(1);

    Err(ResultRecord::fail(
        format!(
            "[{}] invariant test {} {}",
            registration.owner(),
            registration.name(),
            phase
        ),
        detail,
    )
    .attributed_to(registration.name(), registration.owner()))
}

// ─── Phase join ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PhaseLimits {
    timeout: Duration,
    grace: Duration,
}

/// 관찰자마다 태스크를 띄우고 모두 끝날 때까지 기다립니다.
///
/// 반환 순서는 `targets` 순서와 같습니다. 기한이 지나면 남은 태스크를 중단하고,
/// 중단된 태스크가 실제로 멈출 때까지 기다린 뒤 반환하므로 다음 단계와 겹치지 않습니다.
/// 취소가 관찰되면 기한은 `지금 + grace`로 앞당겨집니다.
async fn join_phase<T, F, Fut>(
    targets: &[ObserverRegistration],
    phase: Phase,
    limits: PhaseLimits,
    cancel: &CancellationToken,
    call: F,
) -> Vec<TaskOutcome<T>>
where
    T: Send + 'static,
    F: Fn(Arc<dyn DynObserver>) -> Fut,
    Fut: Future<Output = Result<T, WatchpostError>> + Send + 'static,
{
    let handles: Vec<JoinHandle<Result<T, WatchpostError>>> = targets
        .iter()
        .map(|r| tokio::spawn(call(Arc::clone(r.observer()))))
        .collect();

    let mut deadline = Instant::now() + limits.timeout;
    let mut cancel_seen = cancel.is_cancelled();
    if cancel_seen {
        deadline = deadline.min(Instant::now() + limits.grace);
    }

    let mut expired = false;
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut aborted = Vec::new();

    for mut handle in handles {
        if expired {
            if handle.is_finished() {
                outcomes.push(TaskOutcome::from_join(handle.await));
            } else {
                handle.abort();
                outcomes.push(TaskOutcome::abandoned(cancel_seen, limits.timeout));
                aborted.push(handle);
            }
            continue;
        }

        loop {
            tokio::select! {
                biased;

                joined = &mut handle => {
                    outcomes.push(TaskOutcome::from_join(joined));
                    break;
                }
                () = tokio::time::sleep_until(deadline) => {
                    expired = true;
                    handle.abort();
                    outcomes.push(TaskOutcome::abandoned(cancel_seen, limits.timeout));
                    aborted.push(handle);
                    break;
                }
                () = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    deadline = deadline.min(Instant::now() + limits.grace);
                    debug!(%phase, "cancellation observed, waiting for in-flight calls");
                }
            }
        }
    }

    for handle in aborted {
        // 중단 요청 후 실제로 멈출 때까지 대기
        let _ = handle.await;
    }

    outcomes
}

// ─── ObserverSlot / CleanupHandle ────────────────────────────────────

struct ObserverSlot {
    registration: ObserverRegistration,
    started: AtomicBool,
}

/// 다른 트리거에서 Cleanup 단계를 실행하기 위한 핸들
///
/// 정상 종료 경로와 동시에 호출될 수 있습니다 (예: 두 번째 종료 시그널).
/// StartCollection이 호출된 관찰자만 정리합니다.
#[derive(Clone)]
pub struct CleanupHandle {
    slots: Arc<Vec<ObserverSlot>>,
    timeout: Duration,
}

impl CleanupHandle {
    /// 시작된 모든 관찰자의 cleanup을 호출하고 실패 레코드를 반환합니다.
    ///
    /// 실행 취소와 무관한 새 취소 토큰을 사용하며, cleanup 타임아웃이 적용됩니다.
    pub async fn cleanup(&self) -> Vec<ResultRecord> {
        let targets: Vec<ObserverRegistration> = self
            .slots
            .iter()
            .filter(|slot| slot.started.load(Ordering::SeqCst))
            .map(|slot| slot.registration.clone())
            .collect();

        let phase = Phase::Cleanup;
        let started_at = Instant::now();
        info!(%phase, observers = targets.len(), "phase started");

        let token = CancellationToken::new();
        let limits = PhaseLimits {
            timeout: self.timeout,
            grace: Duration::ZERO,
        };
        let outcomes = join_phase(&targets, phase, limits, &token, |observer| {
            let token = token.clone();
            async move { observer.cleanup(&token).await }
        })
        .await;

        let failures: Vec<ResultRecord> = targets
            .iter()
            .zip(outcomes)
            .filter_map(|(registration, outcome)| settle(registration, phase, outcome).err())
            .collect();

        phase_settled(phase, started_at, failures.len());
        failures
    }

    /// 정리 대상(시작된) 관찰자 수
    pub fn started_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.started.load(Ordering::SeqCst))
            .count()
    }
}

impl fmt::Debug for CleanupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupHandle")
            .field("observers", &self.slots.len())
            .field("started", &self.started_count())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn phase_settled(phase: Phase, started_at: Instant, failures: usize) {
    let elapsed = started_at.elapsed();
    histogram!(m::PHASE_DURATION_SECONDS, m::LABEL_PHASE => phase.label())
        .record(elapsed.as_secs_f64());
    info!(
        %phase,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        failures,
        "phase settled"
    );
}

// ─── LifecycleOrchestrator ───────────────────────────────────────────

/// 단계별 생명주기 오케스트레이터
///
/// 한 번의 테스트 실행마다 새로 만듭니다. 단계 메서드는 정해진 순서로만 호출할 수 있으며,
/// 순서를 어기면 [`LifecycleError::OutOfOrder`]를 반환합니다.
///
/// 실행 취소 토큰이 취소되면 남은 1~5 단계는 건너뛰고, [`cleanup`](Self::cleanup)은
/// 항상 시작된 관찰자 모두에 대해 실행됩니다.
///
/// # 사용 예시
/// ```ignore
/// let mut orchestrator = LifecycleOrchestrator::new(registry, LifecycleOptions::default());
/// orchestrator.start_collection(&cancel, &cluster).await?;
/// run_workload().await;
/// orchestrator.finish(&cancel, &inputs, window).await?;
/// orchestrator.cleanup().await;
/// let report = orchestrator.into_report();
/// ```
pub struct LifecycleOrchestrator {
    run_id: Uuid,
    slots: Arc<Vec<ObserverSlot>>,
    options: LifecycleOptions,
    state: LifecycleState,
    cancelled: bool,
    recorder: IntervalRecorder,
    drain: IntervalDrain,
    raw_intervals: Arc<Intervals>,
    final_intervals: Arc<Intervals>,
    results: Vec<ResultRecord>,
}

impl LifecycleOrchestrator {
    /// 레지스트리를 소비하여 오케스트레이터를 생성합니다.
    ///
    /// 이후로는 레지스트리 구조를 바꿀 수 없습니다.
    pub fn new(registry: ObserverRegistry, options: LifecycleOptions) -> Self {
        let slots: Vec<ObserverSlot> = registry
            .into_registrations()
            .into_iter()
            .map(|registration| ObserverSlot {
                registration,
                started: AtomicBool::new(false),
            })
            .collect();
        let (recorder, drain) = IntervalRecorder::channel();
        let run_id = Uuid::new_v4();

        gauge!(m::OBSERVERS_REGISTERED).set(slots.len() as f64);
        info!(%run_id, observers = slots.len(), "lifecycle orchestrator created");

        Self {
            run_id,
            slots: Arc::new(slots),
            options,
            state: LifecycleState::Pending,
            cancelled: false,
            recorder,
            drain,
            raw_intervals: Arc::new(Intervals::new()),
            final_intervals: Arc::new(Intervals::new()),
            results: Vec::new(),
        }
    }

    /// 실행 ID
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// 현재 상태
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 취소로 단계를 건너뛰었는지 여부
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// 시스템 인터벌 기록기. 기록된 인터벌은 CollectData 경계에서 원시 스트림에 합쳐집니다.
    pub fn recorder(&self) -> &IntervalRecorder {
        &self.recorder
    }

    /// 등록된 관찰자 수
    pub fn observer_count(&self) -> usize {
        self.slots.len()
    }

    /// CollectData 이후의 원시 인터벌 합집합
    pub fn raw_intervals(&self) -> &Intervals {
        &self.raw_intervals
    }

    /// ConstructComputedIntervals 이후의 최종 인터벌 스트림
    pub fn final_intervals(&self) -> &Intervals {
        &self.final_intervals
    }

    /// 지금까지 누적된 결과 레코드
    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    /// 다른 트리거에서 cleanup을 실행할 수 있는 핸들을 반환합니다.
    pub fn cleanup_handle(&self) -> CleanupHandle {
        CleanupHandle {
            slots: Arc::clone(&self.slots),
            timeout: self.options.cleanup_timeout,
        }
    }

    fn begin_phase(
        &mut self,
        phase: Phase,
        cancel: &CancellationToken,
    ) -> Result<bool, WatchpostError> {
        match phase.required_state() {
            Some(required) if self.state != required => {
                return Err(LifecycleError::OutOfOrder {
                    phase,
                    state: self.state,
                }
                .into());
            }
            _ => {}
        }
        self.state = phase.settled_state();

        if cancel.is_cancelled() {
            self.cancelled = true;
        }
        if self.cancelled {
            info!(%phase, "phase skipped after cancellation");
            return Ok(false);
        }
        info!(%phase, observers = self.slots.len(), "phase started");
        Ok(true)
    }

    fn limits(&self) -> PhaseLimits {
        PhaseLimits {
            timeout: self.options.phase_timeout,
            grace: self.options.cancel_grace,
        }
    }

    fn registrations(&self) -> Vec<ObserverRegistration> {
        self.slots.iter().map(|s| s.registration.clone()).collect()
    }

    fn end_phase(
        &mut self,
        phase: Phase,
        started_at: Instant,
        failures: usize,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            self.cancelled = true;
        }
        phase_settled(phase, started_at, failures);
    }

    /// 1단계: 모든 관찰자의 수집을 시작합니다.
    pub async fn start_collection(
        &mut self,
        cancel: &CancellationToken,
        cluster: &ClusterAccess,
    ) -> Result<(), WatchpostError> {
        let phase = Phase::StartCollection;
        if !self.begin_phase(phase, cancel)? {
            return Ok(());
        }
        let started_at = Instant::now();

        // 태스크를 띄우기 전에 표시하여, 도중에 취소되어도 cleanup 대상이 되게 함
        for slot in self.slots.iter() {
            slot.started.store(true, Ordering::SeqCst);
        }

        let targets = self.registrations();
        let cluster = Arc::new(cluster.clone());
        let recorder = self.recorder.clone();
        let outcomes = join_phase(&targets, phase, self.limits(), cancel, |observer| {
            let cancel = cancel.clone();
            let cluster = Arc::clone(&cluster);
            let recorder = recorder.clone();
            async move {
                observer
                    .start_collection(&cancel, &cluster, &recorder)
                    .await
            }
        })
        .await;

        let before = self.results.len();
        for (registration, outcome) in targets.iter().zip(outcomes) {
            if let Err(record) = settle(registration, phase, outcome) {
                self.results.push(record);
            }
        }

        let failures = self.results.len() - before;
        self.end_phase(phase, started_at, failures, cancel);
        Ok(())
    }

    /// 2단계: 원시 인터벌과 수집 결과를 모읍니다.
    ///
    /// 기록기로 들어온 인터벌을 먼저, 그 뒤에 관찰자 출력을 등록 순서대로 이어 붙입니다.
    pub async fn collect_data(
        &mut self,
        cancel: &CancellationToken,
        storage_dir: &Path,
        window: TimeWindow,
    ) -> Result<(), WatchpostError> {
        let phase = Phase::CollectData;
        let run = self.begin_phase(phase, cancel)?;
        let mut raw = Intervals::new();

        if run {
            let started_at = Instant::now();
            let targets = self.registrations();
            let storage_dir = Arc::new(storage_dir.to_path_buf());
            let outcomes = join_phase(&targets, phase, self.limits(), cancel, |observer| {
                let cancel = cancel.clone();
                let storage_dir = Arc::clone(&storage_dir);
                async move { observer.collect_data(&cancel, &storage_dir, &window).await }
            })
            .await;

            raw.extend(self.drain.drain());
            let mut failures = 0;
            for (registration, outcome) in targets.iter().zip(outcomes) {
                match settle(registration, phase, outcome) {
                    Ok(collected) => {
                        raw.extend(collected.intervals);
                        self.results.extend(collected.results.into_iter().map(|r| {
                            r.attributed_to(registration.name(), registration.owner())
                        }));
                    }
                    Err(record) => {
                        failures += 1;
                        self.results.push(record);
                    }
                }
            }
            self.end_phase(phase, started_at, failures, cancel);
        } else {
            raw.extend(self.drain.drain());
        }

        raw.sort();
        debug!(intervals = raw.len(), "raw interval stream merged");
        self.raw_intervals = Arc::new(raw);
        Ok(())
    }

    /// 3단계: 원시 인터벌 합집합으로부터 파생 인터벌을 계산합니다.
    ///
    /// 모든 관찰자가 같은 원시 스트림을 받으며, 같은 단계의 다른 관찰자 출력은 보지 못합니다.
    pub async fn construct_computed_intervals(
        &mut self,
        cancel: &CancellationToken,
        resources: &ResourceSnapshot,
        window: TimeWindow,
    ) -> Result<(), WatchpostError> {
        let phase = Phase::ConstructIntervals;
        let run = self.begin_phase(phase, cancel)?;
        let mut computed = Intervals::new();

        if run {
            let started_at = Instant::now();
            let targets = self.registrations();
            let starting = Arc::clone(&self.raw_intervals);
            let resources = Arc::new(resources.clone());
            let outcomes = join_phase(&targets, phase, self.limits(), cancel, |observer| {
                let cancel = cancel.clone();
                let starting = Arc::clone(&starting);
                let resources = Arc::clone(&resources);
                async move {
                    observer
                        .construct_computed_intervals(&cancel, &starting, &resources, &window)
                        .await
                }
            })
            .await;

            let mut failures = 0;
            for (registration, outcome) in targets.iter().zip(outcomes) {
                match settle(registration, phase, outcome) {
                    Ok(intervals) => computed.extend(intervals),
                    Err(record) => {
                        failures += 1;
                        self.results.push(record);
                    }
                }
            }
            self.end_phase(phase, started_at, failures, cancel);
        }

        // 이 시점 이후의 기록은 받지 않음
        computed.extend(self.drain.drain());
        self.drain.close();

        let mut final_intervals = (*self.raw_intervals).clone();
        final_intervals.extend(computed);
        final_intervals.sort();
        gauge!(m::INTERVALS_TOTAL).set(final_intervals.len() as f64);
        self.final_intervals = Arc::new(final_intervals);
        Ok(())
    }

    /// 4단계: 최종 인터벌 스트림으로 테스트를 판정합니다.
    pub async fn evaluate_tests(&mut self, cancel: &CancellationToken) -> Result<(), WatchpostError> {
        let phase = Phase::EvaluateTests;
        if !self.begin_phase(phase, cancel)? {
            return Ok(());
        }
        let started_at = Instant::now();
        let targets = self.registrations();
        let final_intervals = Arc::clone(&self.final_intervals);
        let outcomes = join_phase(&targets, phase, self.limits(), cancel, |observer| {
            let cancel = cancel.clone();
            let final_intervals = Arc::clone(&final_intervals);
            async move { observer.evaluate_tests(&cancel, &final_intervals).await }
        })
        .await;

        let mut failures = 0;
        for (registration, outcome) in targets.iter().zip(outcomes) {
            match settle(registration, phase, outcome) {
                Ok(records) => self.results.extend(
                    records
                        .into_iter()
                        .map(|r| r.attributed_to(registration.name(), registration.owner())),
                ),
                Err(record) => {
                    failures += 1;
                    self.results.push(record);
                }
            }
        }
        self.end_phase(phase, started_at, failures, cancel);
        Ok(())
    }

    /// 5단계: 관찰자 소유 산출물을 저장합니다.
    ///
    /// 이전 단계에서 실패한 관찰자도 호출됩니다.
    pub async fn write_content_to_storage(
        &mut self,
        cancel: &CancellationToken,
        storage_dir: &Path,
        time_suffix: &str,
        resources: &ResourceSnapshot,
    ) -> Result<(), WatchpostError> {
        let phase = Phase::WriteStorage;
        if !self.begin_phase(phase, cancel)? {
            return Ok(());
        }
        let started_at = Instant::now();
        let targets = self.registrations();
        let storage_dir = Arc::new(storage_dir.to_path_buf());
        let time_suffix: Arc<str> = Arc::from(time_suffix);
        let final_intervals = Arc::clone(&self.final_intervals);
        let resources = Arc::new(resources.clone());
        let outcomes = join_phase(&targets, phase, self.limits(), cancel, |observer| {
            let cancel = cancel.clone();
            let storage_dir = Arc::clone(&storage_dir);
            let time_suffix = Arc::clone(&time_suffix);
            let final_intervals = Arc::clone(&final_intervals);
            let resources = Arc::clone(&resources);
            async move {
                observer
                    .write_content_to_storage(
                        &cancel,
                        &storage_dir,
                        &time_suffix,
                        &final_intervals,
                        &resources,
                    )
                    .await
            }
        })
        .await;

        let before = self.results.len();
        for (registration, outcome) in targets.iter().zip(outcomes) {
            if let Err(record) = settle(registration, phase, outcome) {
                self.results.push(record);
            }
        }
        let failures = self.results.len() - before;
        self.end_phase(phase, started_at, failures, cancel);
        Ok(())
    }

    /// 2~5단계를 순서대로 실행합니다.
    pub async fn finish(
        &mut self,
        cancel: &CancellationToken,
        inputs: &RunInputs,
        window: TimeWindow,
    ) -> Result<(), WatchpostError> {
        self.collect_data(cancel, &inputs.storage_dir, window).await?;
        self.construct_computed_intervals(cancel, &inputs.resources, window)
            .await?;
        self.evaluate_tests(cancel).await?;
        self.write_content_to_storage(
            cancel,
            &inputs.storage_dir,
            &inputs.time_suffix,
            &inputs.resources,
        )
        .await
    }

    /// 6단계: 시작된 모든 관찰자를 정리합니다.
    ///
    /// 어느 상태에서나 호출할 수 있고, 두 번째 호출부터는 아무 일도 하지 않습니다.
    pub async fn cleanup(&mut self) {
        if self.state == LifecycleState::CleanedUp {
            debug!("cleanup already performed, skipping");
            return;
        }
        let failures = self.cleanup_handle().cleanup().await;
        self.results.extend(failures);
        self.drain.close();
        self.state = LifecycleState::CleanedUp;
    }

    /// 전체 실행을 한 번에 진행합니다.
    ///
    /// StartCollection 후 `workload`가 끝나거나 취소될 때까지 기다린 다음,
    /// 그 구간을 워크로드 구간으로 삼아 나머지 단계와 Cleanup을 실행합니다.
    pub async fn run<W>(
        mut self,
        cancel: &CancellationToken,
        inputs: &RunInputs,
        workload: W,
    ) -> Result<RunReport, WatchpostError>
    where
        W: Future<Output = ()>,
    {
        self.start_collection(cancel, &inputs.cluster).await?;

        let begin = SystemTime::now();
        if !self.cancelled {
            tokio::select! {
                () = workload => debug!("workload finished"),
                () = cancel.cancelled() => info!("workload interrupted by cancellation"),
            }
        }
        let window = TimeWindow::new(begin, SystemTime::now());

        self.finish(cancel, inputs, window).await?;
        self.cleanup().await;
        Ok(self.into_report())
    }

    /// 실행 결과를 반환합니다.
    pub fn into_report(self) -> RunReport {
        let counts = OutcomeCounts::tally(&self.results);
        counter!(m::RESULTS_TOTAL, m::LABEL_OUTCOME => "pass").increment(counts.passed as u64);
        counter!(m::RESULTS_TOTAL, m::LABEL_OUTCOME => "fail").increment(counts.failed as u64);
        counter!(m::RESULTS_TOTAL, m::LABEL_OUTCOME => "flake").increment(counts.flaked as u64);

        let intervals =
            Arc::try_unwrap(self.final_intervals).unwrap_or_else(|shared| (*shared).clone());
        RunReport {
            run_id: self.run_id.to_string(),
            state: self.state,
            cancelled: self.cancelled,
            counts,
            intervals,
            results: self.results,
        }
    }
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("run_id", &self.run_id)
            .field("state", &self.state)
            .field("cancelled", &self.cancelled)
            .field("observers", &self.slots.len())
            .field("results", &self.results.len())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
