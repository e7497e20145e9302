//! 메트릭 상수 및 설명 등록
//!
//! 오케스트레이터가 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 익스포터는 설치하지 않으며, 호스트 프로세스가 전역 레코더를 설치하면 수집됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `watchpost_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//! use watchpost_core::metrics::{OBSERVER_FAILURES_TOTAL, LABEL_OBSERVER, LABEL_PHASE};
//!
//! counter!(OBSERVER_FAILURES_TOTAL, LABEL_OBSERVER => "audit", LABEL_PHASE => "collection")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 단계 레이블 키 (setup, collection, ...)
pub const LABEL_PHASE: &str = "phase";

/// 관찰자 이름 레이블 키
pub const LABEL_OBSERVER: &str = "observer";

/// 실패 종류 레이블 키 (error, panic, timeout, cancelled)
pub const LABEL_KIND: &str = "kind";

// ─── 오케스트레이터 메트릭 ──────────────────────────────────────────

/// 단계 전체 소요 시간 (histogram, 초, label: phase)
pub const PHASE_DURATION_SECONDS: &str = "watchpost_phase_duration_seconds";

/// 관찰자 단계 실패 수 (counter, labels: observer, phase, kind)
pub const OBSERVER_FAILURES_TOTAL: &str = "watchpost_observer_failures_total";

/// 등록된 관찰자 수 (gauge)
pub const OBSERVERS_REGISTERED: &str = "watchpost_observers_registered";

/// 최종 스트림의 인터벌 수 (gauge)
pub const INTERVALS_TOTAL: &str = "watchpost_intervals";

/// 결과 레코드 수 (counter, label: outcome)
pub const RESULTS_TOTAL: &str = "watchpost_results_total";

/// 결과 레이블 키 (pass, fail, flake)
pub const LABEL_OUTCOME: &str = "outcome";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 단계 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 600s 범위 (기본 단계 타임아웃과 동일한 상한)
pub const PHASE_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 600.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_histogram!(
        PHASE_DURATION_SECONDS,
        "Wall-clock time of one lifecycle phase across all observers"
    );
    describe_counter!(
        OBSERVER_FAILURES_TOTAL,
        "Observer phase calls converted into failing result records"
    );
    describe_gauge!(
        OBSERVERS_REGISTERED,
        "Number of observers in the flattened registry"
    );
    describe_gauge!(
        INTERVALS_TOTAL,
        "Number of intervals in the final merged stream"
    );
    describe_counter!(RESULTS_TOTAL, "Result records produced, by outcome");
}
