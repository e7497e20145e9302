//! 인터벌 — 관찰자가 기록한 시간 구간 레코드와 추가 전용 스트림
//!
//! [`Interval`]은 한 번 생성되면 변경되지 않습니다. [`Intervals`]는 시작 시각 기준으로
//! 정렬된 추가 전용 시퀀스이며, 오케스트레이터가 단계 경계에서만 병합합니다.
//!
//! [`IntervalRecorder`]는 StartCollection 단계에서 관찰자에게 전달되는 기록 채널입니다.
//! 기록된 인터벌은 CollectData 단계가 끝날 때 원시 스트림에 합쳐집니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ObserverError, WatchpostError};

/// 인터벌 카테고리: 노드 상태 변화
pub const CATEGORY_NODE_STATE: &str = "node-state";
/// 인터벌 카테고리: 파드 생명주기
pub const CATEGORY_POD: &str = "pod";
/// 인터벌 카테고리: 테스트 워크로드 구간
pub const CATEGORY_WORKLOAD: &str = "workload";
/// 인터벌 카테고리: 관찰자가 계산한 파생 구간
pub const CATEGORY_COMPUTED: &str = "computed";

/// 시간 구간 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// 시작 시각
    pub from: SystemTime,
    /// 종료 시각 (`None`이면 진행 중)
    pub to: Option<SystemTime>,
    /// 카테고리 (예: `"node-state"`)
    pub category: String,
    /// 기록 주체 (관찰자 이름 또는 시스템 구성요소)
    pub source: String,
    /// 사람이 읽을 수 있는 설명
    pub message: String,
    /// 구조화된 주석
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Interval {
    /// 진행 중인(종료 시각이 없는) 인터벌을 생성합니다.
    pub fn open(
        from: SystemTime,
        category: impl Into<String>,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to: None,
            category: category.into(),
            source: source.into(),
            message: message.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// 종료 시각이 있는 인터벌을 생성합니다.
    pub fn closed(
        from: SystemTime,
        to: SystemTime,
        category: impl Into<String>,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            to: Some(to),
            ..Self::open(from, category, source, message)
        }
    }

    /// 주석을 추가합니다.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// 주석 값을 조회합니다.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// 아직 끝나지 않은 인터벌인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    /// 주어진 시각이 이 구간에 포함되는지 확인합니다.
    ///
    /// 열린 인터벌은 시작 이후 모든 시각을 포함합니다.
    pub fn contains(&self, at: SystemTime) -> bool {
        at >= self.from && self.to.is_none_or(|to| at <= to)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} {}",
            self.category, self.source, self.message
        )
    }
}

/// 시작 시각 기준으로 정렬되는 추가 전용 인터벌 시퀀스
///
/// 같은 시작 시각을 가진 인터벌끼리는 삽입 순서를 유지하지만,
/// 소비자가 그 순서에 의존해서는 안 됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intervals(Vec<Interval>);

impl Intervals {
    /// 빈 스트림을 생성합니다.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 인터벌 하나를 추가합니다.
    pub fn push(&mut self, interval: Interval) {
        self.0.push(interval);
    }

    /// 다른 스트림의 인터벌을 뒤에 이어 붙입니다.
    pub fn extend(&mut self, other: Intervals) {
        self.0.extend(other.0);
    }

    /// 시작 시각 기준 안정 정렬을 수행합니다.
    pub fn sort(&mut self) {
        self.0.sort_by_key(|interval| interval.from);
    }

    /// 정렬된 사본을 반환합니다.
    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    /// 조건을 만족하는 인터벌만 골라 새 스트림으로 반환합니다.
    pub fn filter(&self, mut predicate: impl FnMut(&Interval) -> bool) -> Self {
        Self(self.0.iter().filter(|i| predicate(i)).cloned().collect())
    }

    /// 특정 카테고리의 인터벌을 반환합니다.
    pub fn by_category(&self, category: &str) -> Self {
        self.filter(|i| i.category == category)
    }

    /// 인터벌 수
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 인터벌을 순회합니다.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.0.iter()
    }

    /// 슬라이스로 조회합니다.
    pub fn as_slice(&self) -> &[Interval] {
        &self.0
    }
}

impl From<Vec<Interval>> for Intervals {
    fn from(items: Vec<Interval>) -> Self {
        Self(items)
    }
}

impl FromIterator<Interval> for Intervals {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Intervals {
    type Item = Interval;
    type IntoIter = std::vec::IntoIter<Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Intervals {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ─── IntervalRecorder ────────────────────────────────────────────────

/// 관찰자와 시스템이 공유하는 인터벌 기록 채널
///
/// 복제 비용이 낮으며, 여러 백그라운드 태스크에서 동시에 기록할 수 있습니다.
/// 수신 측은 오케스트레이터가 소유하며 CollectData 단계 경계에서 비웁니다.
#[derive(Debug, Clone)]
pub struct IntervalRecorder {
    tx: mpsc::UnboundedSender<Interval>,
}

impl IntervalRecorder {
    /// 기록기와 수신 측을 생성합니다.
    pub fn channel() -> (Self, IntervalDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, IntervalDrain { rx })
    }

    /// 인터벌을 기록합니다.
    ///
    /// 수신 측이 이미 닫힌 경우(실행 종료 후) 에러를 반환합니다.
    pub fn record(&self, interval: Interval) -> Result<(), WatchpostError> {
        self.tx.send(interval).map_err(|e| {
            ObserverError::Failed(format!(
                "interval recorder closed, dropped interval from {}",
                e.0.source
            ))
            .into()
        })
    }

    /// 수신 측이 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// [`IntervalRecorder`]의 수신 측
#[derive(Debug)]
pub struct IntervalDrain {
    rx: mpsc::UnboundedReceiver<Interval>,
}

impl IntervalDrain {
    /// 지금까지 기록된 인터벌을 모두 꺼냅니다.
    pub fn drain(&mut self) -> Intervals {
        let mut drained = Intervals::new();
        while let Ok(interval) = self.rx.try_recv() {
            drained.push(interval);
        }
        drained
    }

    /// 더 이상 기록을 받지 않도록 채널을 닫습니다.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
