//! 관찰자 레지스트리 — 이름 기반 등록과 하위 레지스트리 합성
//!
//! 레지스트리는 순수한 장부입니다. 단계 호출 로직은 전혀 없으며,
//! [`LifecycleOrchestrator`](crate::lifecycle::LifecycleOrchestrator)가
//! [`all_observers`](ObserverRegistry::all_observers)로 평탄화된 목록을 받아 사용합니다.
//!
//! 하위 레지스트리는 합성 시점에 부모 네임스페이스로 병합되어 트리가
//! 실행 중에 남지 않습니다. 따라서 각 관찰자는 단계마다 정확히 한 번만 방문됩니다.

use std::fmt;
use std::sync::Arc;

use crate::error::{RegistryError, WatchpostError};
use crate::observer::{DynObserver, Observer};

/// 레지스트리에 등록된 관찰자 항목
#[derive(Clone)]
pub struct ObserverRegistration {
    name: String,
    owner: String,
    observer: Arc<dyn DynObserver>,
}

impl ObserverRegistration {
    /// 관찰자 이름 (레지스트리 내 고유)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 소유 태그
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 관찰자 인스턴스
    pub fn observer(&self) -> &Arc<dyn DynObserver> {
        &self.observer
    }
}

impl fmt::Debug for ObserverRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistration")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// 관찰자 레지스트리
///
/// 등록 순서가 보존되며, 같은 입력이면 항상 같은 순서로 순회합니다.
/// 순서는 리포트의 결정성을 위한 것이며 단계 로직의 정확성과는 무관합니다.
///
/// # 사용 예시
/// ```ignore
/// let mut platform = ObserverRegistry::new();
/// platform.register("cluster-info", "Test Framework", ClusterInfoObserver::new())?;
///
/// let mut networking = ObserverRegistry::new();
/// networking.register("service-disruption", "Networking", disruption)?;
///
/// platform.compose(networking)?;
/// let orchestrator = LifecycleOrchestrator::new(platform, options);
/// ```
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<ObserverRegistration>,
}

impl ObserverRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// 관찰자를 등록합니다.
    ///
    /// 같은 이름이 이미 있으면 같은 인스턴스라도 에러를 반환합니다.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        observer: impl Observer + 'static,
    ) -> Result<(), WatchpostError> {
        self.register_dyn(name, owner, Arc::new(observer))
    }

    /// 이미 `Arc`로 감싼 관찰자를 등록합니다.
    pub fn register_dyn(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        observer: Arc<dyn DynObserver>,
    ) -> Result<(), WatchpostError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName.into());
        }
        if self.contains(&name) {
            return Err(RegistryError::DuplicateName { name }.into());
        }

        tracing::debug!(observer = %name, "observer registered");
        self.observers.push(ObserverRegistration {
            name,
            owner: owner.into(),
            observer,
        });
        Ok(())
    }

    /// 하위 레지스트리의 모든 항목을 이 레지스트리로 병합합니다.
    ///
    /// 이름이 하나라도 겹치면 아무것도 병합하지 않고 에러를 반환합니다.
    /// 하위 항목은 기존 항목 뒤에 하위 레지스트리의 순서대로 붙습니다.
    pub fn compose(&mut self, child: ObserverRegistry) -> Result<(), WatchpostError> {
        if let Some(collision) = child.observers.iter().find(|r| self.contains(&r.name)) {
            return Err(RegistryError::DuplicateName {
                name: collision.name.clone(),
            }
            .into());
        }

        tracing::debug!(count = child.observers.len(), "sub-registry composed");
        self.observers.extend(child.observers);
        Ok(())
    }

    /// 평탄화된 등록 목록을 등록 순서대로 반환합니다.
    pub fn all_observers(&self) -> &[ObserverRegistration] {
        &self.observers
    }

    /// 이름으로 관찰자를 조회합니다.
    pub fn get(&self, name: &str) -> Option<&ObserverRegistration> {
        self.observers.iter().find(|r| r.name == name)
    }

    /// 이름이 등록되어 있는지 확인합니다.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 등록된 관찰자 이름 목록
    pub fn names(&self) -> Vec<&str> {
        self.observers.iter().map(|r| r.name.as_str()).collect()
    }

    /// 등록된 관찰자 수
    pub fn count(&self) -> usize {
        self.observers.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn into_registrations(self) -> Vec<ObserverRegistration> {
        self.observers
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
