// ==========================================
// 开放制造模型 (OMM) - 资源容量管理
// ==========================================
// 职责: 资源分配/释放、利用率统计
// 规则:
// - 槽位型: 并发分配数 ≤ 槽位上限,满额时拒绝
// - 体积型: 已占用 + 申请量 ≤ 体积容量
// - 分配写入作业分配表,同时递增资源负载
// - 释放不自动发生,由调用方在工序完成/取消时显式触发
// 红线: 失败的分配不修改任何计数
// ==========================================

use crate::domain::action::Action;
use crate::domain::error::{OmmError, OmmResult};
use crate::domain::job::{Allocation, Job};
use crate::domain::resource::Resource;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 体积比较容差
const VOLUME_EPSILON: f64 = 1e-9;

/// 资源利用率快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUtilization {
    pub resource_id: String,
    pub slot_limit: u32,
    pub current_load: u32,
    /// 槽位利用率 (%)
    pub slot_utilization: f64,
    pub volume_capacity: Option<f64>,
    pub volume_load: f64,
    /// 体积利用率 (%),非体积型资源为 None
    pub volume_utilization: Option<f64>,
}

// ==========================================
// CapacityManager
// ==========================================
pub struct CapacityManager {
    single_occupant_slots: u32,
}

impl CapacityManager {
    /// # 参数
    /// - `single_occupant_slots`: 工具/机械臂未显式设置时的槽位上限
    pub fn new(single_occupant_slots: u32) -> Self {
        Self {
            single_occupant_slots: single_occupant_slots.max(1),
        }
    }

    pub fn slot_limit(&self, resource: &Resource) -> u32 {
        resource.slot_limit(self.single_occupant_slots)
    }

    /// 校验分配是否可行（不修改任何状态）
    pub fn check_allocation(
        &self,
        job: &Job,
        action: &Action,
        resource: &Resource,
        amount: Option<f64>,
    ) -> OmmResult<()> {
        if job
            .allocations_for(&action.id)
            .iter()
            .any(|a| a.resource_id == resource.id)
        {
            return Err(OmmError::already_exists(
                "Allocation",
                &format!("{}→{}", action.id, resource.id),
            ));
        }

        let limit = self.slot_limit(resource);
        if resource.current_load() >= limit {
            return Err(OmmError::CapacityExceeded {
                entity: "Resource".to_string(),
                id: resource.id.clone(),
                requested: 1.0,
                available: 0.0,
            });
        }

        if let Some(requested) = amount {
            if !requested.is_finite() || requested < 0.0 {
                return Err(OmmError::validation(format!(
                    "分配量必须为非负数, 实际={}",
                    requested
                )));
            }
            let capacity = resource.volume_capacity().ok_or_else(|| {
                OmmError::validation(format!("资源 {} 没有体积容量, 不能按量分配", resource.id))
            })?;
            let available = (capacity - resource.volume_load()).max(0.0);
            if requested > available + VOLUME_EPSILON {
                return Err(OmmError::CapacityExceeded {
                    entity: "Resource".to_string(),
                    id: resource.id.clone(),
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    /// 分配资源
    ///
    /// # 错误
    /// - `CapacityExceeded`: 槽位已满或体积不足
    /// - `AlreadyExists`: 该工序已持有该资源
    pub fn allocate(
        &self,
        job: &mut Job,
        action: &Action,
        resource: &mut Resource,
        amount: Option<f64>,
    ) -> OmmResult<Allocation> {
        self.check_allocation(job, action, resource, amount)?;

        resource.occupy(amount);
        let allocation = Allocation {
            action_id: action.id.clone(),
            resource_id: resource.id.clone(),
            amount,
            allocated_at: Utc::now(),
        };
        job.record_allocation(allocation.clone());

        debug!(
            job_id = %job.id,
            action_id = %action.id,
            resource_id = %resource.id,
            load = resource.current_load(),
            limit = self.slot_limit(resource),
            "资源已分配"
        );
        Ok(allocation)
    }

    /// 释放工序持有的全部分配,返回被释放的记录
    pub fn release_action(
        &self,
        job: &mut Job,
        action_id: &str,
        resources: &mut BTreeMap<String, Resource>,
    ) -> Vec<Allocation> {
        let released = job.take_allocations(action_id);
        for allocation in &released {
            match resources.get_mut(&allocation.resource_id) {
                Some(resource) => {
                    resource.vacate(allocation.amount);
                    debug!(
                        job_id = %job.id,
                        action_id,
                        resource_id = %allocation.resource_id,
                        load = resource.current_load(),
                        "资源分配已释放"
                    );
                }
                None => warn!(
                    job_id = %job.id,
                    action_id,
                    resource_id = %allocation.resource_id,
                    "释放分配时资源已不存在"
                ),
            }
        }
        released
    }

    /// 资源记录被整体更新时: 占用计数沿用原记录,新容量不得低于现有占用
    pub fn carry_counters(&self, before: &Resource, draft: &mut Resource) -> OmmResult<()> {
        draft.restore_load_from(before);

        let limit = self.slot_limit(draft);
        if draft.current_load() > limit {
            return Err(OmmError::CapacityExceeded {
                entity: "Resource".to_string(),
                id: draft.id.clone(),
                requested: draft.current_load() as f64,
                available: limit as f64,
            });
        }

        if draft.volume_load() > 0.0 {
            let capacity = draft.volume_capacity().unwrap_or(0.0);
            if draft.volume_load() > capacity + VOLUME_EPSILON {
                return Err(OmmError::CapacityExceeded {
                    entity: "Resource".to_string(),
                    id: draft.id.clone(),
                    requested: draft.volume_load(),
                    available: capacity,
                });
            }
        }
        Ok(())
    }

    /// 利用率快照
    pub fn utilization(&self, resource: &Resource) -> ResourceUtilization {
        let slot_limit = self.slot_limit(resource);
        let volume_capacity = resource.volume_capacity();
        ResourceUtilization {
            resource_id: resource.id.clone(),
            slot_limit,
            current_load: resource.current_load(),
            slot_utilization: resource.current_load() as f64 / slot_limit as f64 * 100.0,
            volume_capacity,
            volume_load: resource.volume_load(),
            volume_utilization: volume_capacity
                .filter(|cap| *cap > 0.0)
                .map(|cap| resource.volume_load() / cap * 100.0),
        }
    }
}

impl Default for CapacityManager {
    fn default() -> Self {
        Self::new(1)
    }
}
