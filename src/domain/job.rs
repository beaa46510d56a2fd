// ==========================================
// 开放制造模型 (OMM) - 作业
// ==========================================
// 作业: 一个或多个产品 + 有序工序序列 + 分配表
// 分配表: action_id → [Allocation]
// 作业状态由工序状态推导,变更入口在编排器
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, EntityMapping};
use crate::domain::types::{new_entity_id, JobPriority, JobStatus};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 资源分配记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub action_id: String,
    pub resource_id: String,
    /// 体积占用量（仅体积型资源）
    pub amount: Option<f64>,
    pub allocated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    product_ids: Vec<String>,
    action_ids: Vec<String>,
    status: JobStatus,
    pub priority: JobPriority,
    allocations: BTreeMap<String, Vec<Allocation>>,
    pub due_date: Option<DateTime<Utc>>,
    pub customer_id: Option<String>,
    hold_reason: Option<String>,
    #[serde(default)]
    resume_reason: Option<String>,
    cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// 创建作业
    ///
    /// # 错误
    /// - 产品列表为空
    /// - 交期早于当前时间
    pub fn new(
        name: &str,
        product_ids: Vec<String>,
        priority: JobPriority,
        due_date: Option<DateTime<Utc>>,
    ) -> OmmResult<Self> {
        let now = Utc::now();
        if let Some(due) = due_date {
            if due < now {
                return Err(OmmError::validation(format!(
                    "作业 {} 的交期 {} 早于当前时间",
                    name,
                    due.to_rfc3339()
                )));
            }
        }
        let job = Self {
            id: new_entity_id(),
            name: name.to_string(),
            product_ids,
            action_ids: Vec::new(),
            status: JobStatus::Planned,
            priority,
            allocations: BTreeMap::new(),
            due_date,
            customer_id: None,
            hold_reason: None,
            resume_reason: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        job.validate()?;
        Ok(job)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    // ===== 访问器 =====

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.product_ids.clone()
    }

    /// 工序 id（按序号排列）
    pub fn action_ids(&self) -> Vec<String> {
        self.action_ids.clone()
    }

    pub fn hold_reason(&self) -> Option<&str> {
        self.hold_reason.as_deref()
    }

    /// 最近一次恢复的原因
    pub fn resume_reason(&self) -> Option<&str> {
        self.resume_reason.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// 分配表副本
    pub fn allocations(&self) -> BTreeMap<String, Vec<Allocation>> {
        self.allocations.clone()
    }

    pub fn allocations_for(&self, action_id: &str) -> Vec<Allocation> {
        self.allocations.get(action_id).cloned().unwrap_or_default()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.values().map(Vec::len).sum()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => now > due && self.status != JobStatus::Completed,
            None => false,
        }
    }

    // ===== 产品 =====

    pub fn add_product(&mut self, product_id: &str) -> OmmResult<()> {
        if self.product_ids.iter().any(|id| id == product_id) {
            return Err(OmmError::already_exists("JobProduct", product_id));
        }
        self.product_ids.push(product_id.to_string());
        self.touch();
        Ok(())
    }

    pub fn remove_product(&mut self, product_id: &str) -> OmmResult<()> {
        if self.product_ids.len() == 1 && self.product_ids[0] == product_id {
            return Err(OmmError::validation(format!(
                "作业 {} 至少需要一个产品",
                self.id
            )));
        }
        let index = self
            .product_ids
            .iter()
            .position(|id| id == product_id)
            .ok_or_else(|| OmmError::not_found("JobProduct", product_id))?;
        self.product_ids.remove(index);
        self.touch();
        Ok(())
    }

    // ==========================================
    // crate 内部: 状态、工序序列、分配表
    // ==========================================

    pub(crate) fn apply_status(&mut self, to: JobStatus, reason: Option<&str>) -> OmmResult<JobStatus> {
        let from = self.status;
        self.status = from.transition(to)?;
        let now = Utc::now();
        match to {
            JobStatus::InProgress => {
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                }
                if from == JobStatus::OnHold {
                    self.resume_reason = reason.map(str::to_string);
                }
                self.hold_reason = None;
            }
            JobStatus::OnHold => {
                self.hold_reason = reason.map(str::to_string);
                self.resume_reason = None;
            }
            JobStatus::Cancelled => {
                self.cancel_reason = reason.map(str::to_string);
                self.completed_at = Some(now);
            }
            JobStatus::Completed => self.completed_at = Some(now),
            JobStatus::Planned => {}
        }
        self.updated_at = now;
        Ok(from)
    }

    pub(crate) fn set_action_order(&mut self, ordered: Vec<String>) {
        self.action_ids = ordered;
        self.touch();
    }

    pub(crate) fn record_allocation(&mut self, allocation: Allocation) {
        self.allocations
            .entry(allocation.action_id.clone())
            .or_default()
            .push(allocation);
        self.touch();
    }

    /// 取出工序的全部分配（从分配表中移除）
    pub(crate) fn take_allocations(&mut self, action_id: &str) -> Vec<Allocation> {
        let taken = self.allocations.remove(action_id).unwrap_or_default();
        if !taken.is_empty() {
            self.touch();
        }
        taken
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Job {
    const ENTITY: &'static str = "Job";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("job.id", &self.id)?;
        ensure_not_blank("job.name", &self.name)?;
        if self.product_ids.is_empty() {
            return Err(OmmError::validation(format!(
                "作业 {} 至少需要一个产品",
                self.id
            )));
        }
        for (action_id, allocations) in &self.allocations {
            for allocation in allocations {
                if &allocation.action_id != action_id {
                    return Err(OmmError::validation(format!(
                        "分配表键 {} 与记录工序 {} 不一致",
                        action_id, allocation.action_id
                    )));
                }
                if let Some(amount) = allocation.amount {
                    ensure_non_negative("allocation.amount", amount)?;
                }
            }
        }
        Ok(())
    }
}
