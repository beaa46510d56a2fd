// ==========================================
// 开放制造模型 (OMM) - 工序
// ==========================================
// 工序: 原子工作单元（类型、序号、工时、状态、需求列表）
// 工人/资源/地点分配由编排器关系索引统一维护
// 进入 IN_PROGRESS 需经需求匹配,状态变更入口仅对 crate 开放
// ==========================================

use crate::domain::constraint::{Constraint, ConstraintSet};
use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, ensure_percentage, EntityMapping};
use crate::domain::requirement::Requirement;
use crate::domain::types::{new_entity_id, ActionStatus, ActionType};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub action_type: ActionType,
    pub sequence: u32,
    duration_hours: f64,
    status: ActionStatus,
    requirements: Vec<Requirement>,

    // ===== 分配（由关系索引写入） =====
    worker_id: Option<String>,
    resource_id: Option<String>,
    location_id: Option<String>,

    // ===== 搬运 =====
    pub origin_id: Option<String>,
    pub destination_id: Option<String>,
    pub route_id: Option<String>,

    pub product_id: Option<String>,
    progress: f64,
    constraints: ConstraintSet,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// 创建工序（初始状态 REQUESTED）
    pub fn new(name: &str, action_type: ActionType, sequence: u32, duration_hours: f64) -> OmmResult<Self> {
        ensure_not_blank("action.name", name)?;
        ensure_non_negative("action.duration_hours", duration_hours)?;
        let now = Utc::now();
        Ok(Self {
            id: new_entity_id(),
            name: name.to_string(),
            action_type,
            sequence,
            duration_hours,
            status: ActionStatus::Requested,
            requirements: Vec::new(),
            worker_id: None,
            resource_id: None,
            location_id: None,
            origin_id: None,
            destination_id: None,
            route_id: None,
            product_id: None,
            progress: 0.0,
            constraints: ConstraintSet::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// 以草稿状态创建
    pub fn as_draft(mut self) -> Self {
        self.status = ActionStatus::Draft;
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> OmmResult<Self> {
        self.add_requirement(requirement)?;
        Ok(self)
    }

    pub fn with_product(mut self, product_id: &str) -> Self {
        self.product_id = Some(product_id.to_string());
        self
    }

    // ===== 访问器 =====

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ActionStatus::Completed
    }

    pub fn set_duration_hours(&mut self, hours: f64) -> OmmResult<()> {
        ensure_non_negative("action.duration_hours", hours)?;
        self.duration_hours = hours;
        self.touch();
        Ok(())
    }

    /// 更新进度 (0-100),仅限执行中的工序
    pub fn set_progress(&mut self, progress: f64) -> OmmResult<()> {
        ensure_percentage("action.progress", progress)?;
        if self.status != ActionStatus::InProgress {
            return Err(OmmError::validation(format!(
                "工序 {} 状态为 {}, 不能更新进度",
                self.id, self.status
            )));
        }
        self.progress = progress;
        self.touch();
        Ok(())
    }

    // ===== 需求 =====

    /// 添加需求（重复需求被拒绝）
    pub fn add_requirement(&mut self, requirement: Requirement) -> OmmResult<()> {
        requirement.validate()?;
        if self.requirements.contains(&requirement) {
            return Err(OmmError::already_exists("Requirement", &requirement.to_string()));
        }
        self.requirements.push(requirement);
        self.touch();
        Ok(())
    }

    pub fn remove_requirement(&mut self, requirement: &Requirement) -> OmmResult<()> {
        let index = self
            .requirements
            .iter()
            .position(|r| r == requirement)
            .ok_or_else(|| OmmError::not_found("Requirement", &requirement.to_string()))?;
        self.requirements.remove(index);
        self.touch();
        Ok(())
    }

    pub fn requirements(&self) -> Vec<Requirement> {
        self.requirements.clone()
    }

    pub(crate) fn requirements_ref(&self) -> &[Requirement] {
        &self.requirements
    }

    // ===== 约束 =====

    pub fn add_constraint(&mut self, constraint: Constraint) -> OmmResult<()> {
        self.constraints.add(constraint)?;
        self.touch();
        Ok(())
    }

    pub fn remove_constraint(&mut self, name: &str) -> OmmResult<Constraint> {
        let removed = self.constraints.remove(name)?;
        self.touch();
        Ok(removed)
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.constraints.list()
    }

    // ==========================================
    // crate 内部: 状态与分配
    // ==========================================

    /// 执行状态转换并记录时间戳
    pub(crate) fn apply_status(&mut self, to: ActionStatus) -> OmmResult<ActionStatus> {
        let from = self.status;
        self.status = from.transition(to)?;
        let now = Utc::now();
        match to {
            ActionStatus::InProgress => self.started_at = Some(now),
            ActionStatus::Completed => {
                self.progress = 100.0;
                self.completed_at = Some(now);
            }
            ActionStatus::Cancelled => self.completed_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
        Ok(from)
    }

    pub(crate) fn set_worker(&mut self, worker_id: Option<String>) {
        self.worker_id = worker_id;
        self.touch();
    }

    pub(crate) fn set_resource(&mut self, resource_id: Option<String>) {
        self.resource_id = resource_id;
        self.touch();
    }

    pub(crate) fn set_location(&mut self, location_id: Option<String>) {
        self.location_id = location_id;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Action {
    const ENTITY: &'static str = "Action";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("action.id", &self.id)?;
        ensure_not_blank("action.name", &self.name)?;
        ensure_non_negative("action.duration_hours", self.duration_hours)?;
        ensure_percentage("action.progress", self.progress)?;
        for requirement in &self.requirements {
            requirement.validate()?;
        }
        if self.status == ActionStatus::Completed && self.progress < 100.0 {
            return Err(OmmError::validation(format!(
                "已完成工序 {} 的进度必须为 100",
                self.id
            )));
        }
        self.constraints.validate()
    }
}
