// ==========================================
// 开放制造模型 (OMM) - 编排事件发布
// ==========================================
// 职责: 定义编排事件与发布 trait,外部系统实现适配器
// 规则: 发布失败只记录日志,不回滚已生效的变更
// 事件在释放注册表锁之后发布
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 编排事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorEventType {
    /// 作业开工
    JobStarted,
    /// 作业挂起
    JobHeld,
    /// 作业恢复
    JobResumed,
    /// 作业取消
    JobCancelled,
    /// 作业完工
    JobCompleted,
    /// 工序状态变更
    ActionStatusChanged,
    /// 资源已分配
    ResourceAllocated,
    /// 分配已释放
    AllocationReleased,
}

impl OrchestratorEventType {
    pub fn as_str(&self) -> &str {
        match self {
            OrchestratorEventType::JobStarted => "JobStarted",
            OrchestratorEventType::JobHeld => "JobHeld",
            OrchestratorEventType::JobResumed => "JobResumed",
            OrchestratorEventType::JobCancelled => "JobCancelled",
            OrchestratorEventType::JobCompleted => "JobCompleted",
            OrchestratorEventType::ActionStatusChanged => "ActionStatusChanged",
            OrchestratorEventType::ResourceAllocated => "ResourceAllocated",
            OrchestratorEventType::AllocationReleased => "AllocationReleased",
        }
    }
}

/// 编排事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub event_type: OrchestratorEventType,
    pub job_id: Option<String>,
    pub action_id: Option<String>,
    pub resource_id: Option<String>,
    /// 附加说明（原因、状态变更 from→to 等）
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl OrchestratorEvent {
    /// 作业级事件
    pub fn job(event_type: OrchestratorEventType, job_id: &str, detail: Option<String>) -> Self {
        Self {
            event_type,
            job_id: Some(job_id.to_string()),
            action_id: None,
            resource_id: None,
            detail,
            occurred_at: Utc::now(),
        }
    }

    /// 工序级事件
    pub fn action(
        event_type: OrchestratorEventType,
        job_id: Option<&str>,
        action_id: &str,
        resource_id: Option<&str>,
        detail: Option<String>,
    ) -> Self {
        Self {
            event_type,
            job_id: job_id.map(str::to_string),
            action_id: Some(action_id.to_string()),
            resource_id: resource_id.map(str::to_string),
            detail,
            occurred_at: Utc::now(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 编排事件发布者
///
/// # 实现说明
/// - 消息队列、审计日志、监控面板等由外部实现
pub trait OrchestratorEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(receipt)`: 回执（不支持时为空字符串）
    /// - `Err`: 发布失败
    fn publish(&self, event: OrchestratorEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl OrchestratorEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: OrchestratorEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, job_id={:?}",
            event.event_type.as_str(),
            event.job_id
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn OrchestratorEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn OrchestratorEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: OrchestratorEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 批量发布,失败只记录警告
    pub fn publish_all(&self, events: Vec<OrchestratorEvent>) {
        for event in events {
            let event_type = event.event_type.as_str().to_string();
            if let Err(e) = self.publish(event) {
                tracing::warn!(event_type = %event_type, error = %e, "编排事件发布失败");
            }
        }
    }
}

impl std::fmt::Debug for OptionalEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionalEventPublisher")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingPublisher {
        attempts: Mutex<usize>,
    }

    impl OrchestratorEventPublisher for FailingPublisher {
        fn publish(&self, _event: OrchestratorEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            *self.attempts.lock().unwrap() += 1;
            Err("queue unavailable".into())
        }
    }

    #[test]
    fn test_action_event_fields() {
        let event = OrchestratorEvent::action(
            OrchestratorEventType::ResourceAllocated,
            Some("J-1"),
            "A-1",
            Some("R-1"),
            None,
        );
        assert_eq!(event.job_id.as_deref(), Some("J-1"));
        assert_eq!(event.resource_id.as_deref(), Some("R-1"));
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        let event = OrchestratorEvent::job(OrchestratorEventType::JobStarted, "J-1", None);
        assert!(publisher.publish(event).is_ok());
    }

    #[test]
    fn test_publish_all_swallows_failures() {
        let failing = Arc::new(FailingPublisher {
            attempts: Mutex::new(0),
        });
        let publisher = OptionalEventPublisher::with_publisher(failing.clone());
        publisher.publish_all(vec![
            OrchestratorEvent::job(OrchestratorEventType::JobHeld, "J-1", None),
            OrchestratorEvent::job(OrchestratorEventType::JobResumed, "J-1", None),
        ]);
        assert_eq!(*failing.attempts.lock().unwrap(), 2);
    }
}
