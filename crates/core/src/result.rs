//! 결과 레코드 — 관찰자별 통과/실패/플레이크 판정
//!
//! 같은 테스트 이름의 레코드가 여러 단계에서 나올 수 있으며, 모두 보존됩니다.
//! 반복된 실패는 하위 리포팅에서 신호로 취급되므로 중복 제거하지 않습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 테스트 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// 통과
    Pass,
    /// 실패
    Fail,
    /// 불안정 (재시도 시 통과)
    Flake,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Flake => write!(f, "flake"),
        }
    }
}

/// 구조화된 테스트 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 테스트 이름
    pub name: String,
    /// 소유 팀/분류 태그 (트리아지 라우팅에 사용)
    pub owner: String,
    /// 레코드를 만든 관찰자 이름
    #[serde(default)]
    pub source: String,
    /// 판정
    pub outcome: Outcome,
    /// 실패 상세 (실패/플레이크일 때)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// 부가 출력
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ResultRecord {
    /// 통과 레코드를 생성합니다.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: String::new(),
            source: String::new(),
            outcome: Outcome::Pass,
            failure: None,
            output: None,
        }
    }

    /// 실패 레코드를 생성합니다.
    pub fn fail(name: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            failure: Some(failure.into()),
            ..Self::pass(name)
        }
    }

    /// 플레이크 레코드를 생성합니다.
    pub fn flake(name: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Flake,
            ..Self::fail(name, failure)
        }
    }

    /// 부가 출력을 설정합니다.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// 소유 태그와 출처를 강제로 지정합니다.
    ///
    /// 오케스트레이터는 관찰자가 반환한 모든 레코드에 등록 시점의
    /// 소유 태그를 덮어씁니다.
    pub fn attributed_to(mut self, source: &str, owner: &str) -> Self {
        source.clone_into(&mut self.source);
        owner.clone_into(&mut self.owner);
        self
    }

    /// 실패 레코드인지 확인합니다.
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Fail
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.outcome, self.owner, self.name)?;
        if let Some(failure) = &self.failure {
            write!(f, ": {failure}")?;
        }
        Ok(())
    }
}

/// 결과 레코드 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// 통과 수
    pub passed: usize,
    /// 실패 수
    pub failed: usize,
    /// 플레이크 수
    pub flaked: usize,
}

impl OutcomeCounts {
    /// 레코드 목록을 집계합니다.
    pub fn tally(records: &[ResultRecord]) -> Self {
        records.iter().fold(Self::default(), |mut counts, record| {
            match record.outcome {
                Outcome::Pass => counts.passed += 1,
                Outcome::Fail => counts.failed += 1,
                Outcome::Flake => counts.flaked += 1,
            }
            counts
        })
    }
}
