//! 정리 가드 — 관찰자 cleanup을 한 번만 실행되도록 보호
//!
//! Cleanup은 정상 종료, 중단 시그널, 타임아웃 강제 정리 등에서 여러 번,
//! 동시에 호출될 수 있습니다. [`CleanupGuard`]로 감싸면 실제 정리 작업은
//! 최초 한 번만 실행되고, 나머지 호출은 부작용 없이 `Ok(())`를 반환합니다.

use std::future::Future;

use tokio::sync::OnceCell;

use crate::error::WatchpostError;

/// 한 번만 실행되는 정리 작업 가드
///
/// - 최초 호출자만 정리 작업을 실행하고 그 결과를 받습니다.
/// - 실행 중에 들어온 호출자는 완료를 기다린 뒤 `Ok(())`를 받습니다.
/// - 이후 호출자는 즉시 `Ok(())`를 받습니다. 최초 실행이 에러였어도 다시 실행하지 않습니다.
#[derive(Debug, Default)]
pub struct CleanupGuard {
    done: OnceCell<()>,
}

impl CleanupGuard {
    /// 새 가드를 생성합니다.
    pub fn new() -> Self {
        Self {
            done: OnceCell::new(),
        }
    }

    /// 정리 작업을 최대 한 번 실행합니다.
    pub async fn run<F, Fut>(&self, cleanup: F) -> Result<(), WatchpostError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), WatchpostError>>,
    {
        let mut outcome = Ok(());
        let slot = &mut outcome;
        self.done
            .get_or_init(|| async move {
                *slot = cleanup().await;
            })
            .await;
        outcome
    }

    /// 정리 작업이 이미 완료되었는지 확인합니다.
    pub fn is_done(&self) -> bool {
        self.done.initialized()
    }
}
