//! 스토리지 싱크 — 산출물 디렉토리와 관찰자별 파일 네임스페이스
//!
//! 오케스트레이터는 파일 이름 충돌을 중재하지 않습니다. 대신 관찰자가
//! [`StorageSink::artifact_path`]를 사용하면 `{root}/{observer}/{file}` 형태로
//! 관찰자 이름 아래에 파일이 놓이므로 서로 겹치지 않습니다.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{StorageError, WatchpostError};

/// 산출물 저장 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSink {
    root: PathBuf,
}

impl StorageSink {
    /// 루트 디렉토리로 싱크를 생성합니다. 디렉토리는 쓰기 시점에 만들어집니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 루트 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 루트 바로 아래의 파일 경로를 반환합니다.
    ///
    /// 인터벌/결과 레코드처럼 오케스트레이터 호출자가 직접 쓰는 파일용입니다.
    pub fn file_path(&self, file_name: &str) -> Result<PathBuf, WatchpostError> {
        validate_component(file_name)?;
        Ok(self.root.join(file_name))
    }

    /// 관찰자 네임스페이스 아래의 파일 경로를 반환합니다.
    pub fn artifact_path(&self, observer: &str, file_name: &str) -> Result<PathBuf, WatchpostError> {
        validate_component(observer)?;
        validate_component(file_name)?;
        Ok(self.root.join(observer).join(file_name))
    }

    /// 값을 보기 좋은 JSON으로 직렬화하여 파일에 씁니다.
    ///
    /// 상위 디렉토리가 없으면 생성합니다.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), WatchpostError> {
        let body = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialize {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.write_bytes(path, &body).await
    }

    /// 바이트를 파일에 씁니다. 상위 디렉토리가 없으면 생성합니다.
    pub async fn write_bytes(&self, path: &Path, body: &[u8]) -> Result<(), WatchpostError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, body).await?;
        tracing::debug!(path = %path.display(), bytes = body.len(), "artifact written");
        Ok(())
    }
}

fn validate_component(name: &str) -> Result<(), WatchpostError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name == "." || name == ".." {
        Some("must not be a relative directory reference")
    } else if name.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            name: name.to_owned(),
            reason: reason.to_owned(),
        }
        .into()),
        None => Ok(()),
    }
}
