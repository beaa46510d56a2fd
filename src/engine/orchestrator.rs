// ==========================================
// 开放制造模型 (OMM) - 作业编排器
// ==========================================
// 职责: 持有注册表,协调状态机、需求匹配、容量管理与库存台账
// 并发: 注册表位于 Arc<RwLock<_>> 之后
// - 所有变更持有写锁（单一逻辑所有者）
// - 派生读取持有读锁（一致快照）
// - 取消作业/工序时在同一临界区内释放分配
// 事件: 在释放锁之后发布,发布失败不回滚
// ==========================================

use crate::config::{AutoStartPolicy, ConfigManager, ReleasePolicy};
use crate::domain::action::Action;
use crate::domain::actor::Actor;
use crate::domain::error::{OmmError, OmmResult};
use crate::domain::job::{Allocation, Job};
use crate::domain::location::Location;
use crate::domain::mapping::EntityMapping;
use crate::domain::part::Part;
use crate::domain::product::Product;
use crate::domain::resource::Resource;
use crate::domain::route::Route;
use crate::domain::sensor::{SensorReader, SensorReading};
use crate::domain::storage::{Storage, StoredItem};
use crate::domain::types::{ActionStatus, JobPriority, JobStatus, StorageType};
use crate::engine::capacity_manager::{CapacityManager, ResourceUtilization};
use crate::engine::events::{OptionalEventPublisher, OrchestratorEvent, OrchestratorEventType};
use crate::engine::inventory_ledger::{InventoryLedger, StockShortage, Withdrawal};
use crate::engine::registry::Registry;
use crate::engine::requirement_matcher::{MatchOutcome, RequirementMatcher};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

// ==========================================
// JobStartReport - 作业开工结果
// ==========================================

/// 开工时因需求未满足而暂缓的工序
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferredAction {
    pub action_id: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStartReport {
    pub job_id: String,
    pub policy: AutoStartPolicy,
    /// 已自动开工的工序
    pub started_actions: Vec<String>,
    /// 就绪但未能开工的工序
    pub deferred: Vec<DeferredAction>,
}

// ==========================================
// JobOrchestrator - 作业编排器
// ==========================================

#[derive(Clone)]
pub struct JobOrchestrator {
    registry: Arc<RwLock<Registry>>,
    config: Arc<ConfigManager>,
    publisher: OptionalEventPublisher,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - config: 编排策略配置
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::new())),
            config,
            publisher: OptionalEventPublisher::none(),
        }
    }

    /// 创建带事件发布者的编排器
    pub fn with_publisher(config: Arc<ConfigManager>, publisher: OptionalEventPublisher) -> Self {
        Self {
            publisher,
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    // ==========================================
    // 锁与基础设施
    // ==========================================

    fn read(&self) -> OmmResult<RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|e| OmmError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> OmmResult<RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|e| OmmError::LockPoisoned(e.to_string()))
    }

    fn capacity_manager(&self) -> OmmResult<CapacityManager> {
        Ok(CapacityManager::new(self.config.single_occupant_slots()?))
    }

    fn publish(&self, events: Vec<OrchestratorEvent>) {
        if !events.is_empty() {
            self.publisher.publish_all(events);
        }
    }

    // ==========================================
    // 实体登记
    // ==========================================

    pub fn register_actor(&self, actor: Actor) -> OmmResult<String> {
        let id = self.write()?.insert_actor(actor)?;
        debug!(actor_id = %id, "参与方已登记");
        Ok(id)
    }

    pub fn register_location(&self, location: Location) -> OmmResult<String> {
        let id = self.write()?.insert_location(location)?;
        debug!(location_id = %id, "地点已登记");
        Ok(id)
    }

    pub fn register_storage(&self, storage: Storage) -> OmmResult<String> {
        let id = self.write()?.insert_storage(storage)?;
        debug!(storage_id = %id, "仓储已登记");
        Ok(id)
    }

    /// 按配置的零件体积口径创建并登记仓储
    pub fn create_storage(
        &self,
        name: &str,
        storage_type: StorageType,
        max_capacity: f64,
    ) -> OmmResult<String> {
        let mode = self.config.part_volume_mode()?;
        let storage = Storage::new(name, storage_type, max_capacity)?.with_volume_mode(mode)?;
        self.register_storage(storage)
    }

    pub fn register_resource(&self, resource: Resource) -> OmmResult<String> {
        if resource.current_load() > 0 {
            return Err(OmmError::validation(format!(
                "资源 {} 带有未登记的占用, 不能直接登记",
                resource.id
            )));
        }
        let id = self.write()?.insert_resource(resource)?;
        debug!(resource_id = %id, "资源已登记");
        Ok(id)
    }

    /// 登记零件目录条目（用于 BOM 成本计算）
    pub fn register_part(&self, part: Part) -> OmmResult<String> {
        let id = self.write()?.insert_part(part)?;
        debug!(part_id = %id, "零件目录已登记");
        Ok(id)
    }

    pub fn register_product(&self, product: Product) -> OmmResult<String> {
        if !product.action_ids().is_empty() {
            return Err(OmmError::validation(format!(
                "产品 {} 的工序必须通过编排器添加",
                product.id
            )));
        }
        let id = self.write()?.insert_product(product)?;
        debug!(product_id = %id, "产品已登记");
        Ok(id)
    }

    pub fn register_route(&self, route: Route) -> OmmResult<String> {
        let id = self.write()?.insert_route(route)?;
        debug!(route_id = %id, "路线已登记");
        Ok(id)
    }

    /// 登记作业（必须为 PLANNED 且不带工序与分配）
    pub fn register_job(&self, job: Job) -> OmmResult<String> {
        if job.status() != JobStatus::Planned
            || !job.action_ids().is_empty()
            || job.allocation_count() > 0
        {
            return Err(OmmError::validation(format!(
                "作业 {} 必须以 PLANNED 状态、无工序、无分配的形式登记",
                job.id
            )));
        }
        let id = self.write()?.insert_job(job)?;
        info!(job_id = %id, "作业已登记");
        Ok(id)
    }

    /// 创建作业
    pub fn create_job(
        &self,
        name: &str,
        product_ids: Vec<String>,
        priority: JobPriority,
        due_date: Option<DateTime<Utc>>,
    ) -> OmmResult<String> {
        let job = Job::new(name, product_ids, priority, due_date)?;
        self.register_job(job)
    }

    /// 向作业添加工序
    pub fn add_action(&self, job_id: &str, action: Action) -> OmmResult<String> {
        if !matches!(
            action.status(),
            ActionStatus::Draft | ActionStatus::Requested | ActionStatus::Confirmed
        ) {
            return Err(OmmError::validation(format!(
                "工序 {} 状态为 {}, 只能添加未开工的工序",
                action.id,
                action.status()
            )));
        }
        let mut reg = self.write()?;
        let status = reg.job(job_id)?.status();
        if status.is_terminal() {
            return Err(OmmError::validation(format!(
                "作业 {} 状态为 {}, 不能添加工序",
                job_id, status
            )));
        }
        let id = reg.attach_action(job_id, action)?;
        debug!(job_id, action_id = %id, "工序已加入作业");
        Ok(id)
    }

    // ==========================================
    // 实体删除
    // ==========================================

    pub fn remove_actor(&self, actor_id: &str) -> OmmResult<Actor> {
        self.write()?.remove_actor(actor_id)
    }

    pub fn remove_location(&self, location_id: &str) -> OmmResult<Location> {
        self.write()?.remove_location(location_id)
    }

    pub fn remove_storage(&self, storage_id: &str) -> OmmResult<Storage> {
        self.write()?.remove_storage(storage_id)
    }

    pub fn remove_resource(&self, resource_id: &str) -> OmmResult<Resource> {
        self.write()?.remove_resource(resource_id)
    }

    pub fn remove_part(&self, part_id: &str) -> OmmResult<Part> {
        self.write()?.remove_part(part_id)
    }

    pub fn remove_product(&self, product_id: &str) -> OmmResult<Product> {
        self.write()?.remove_product(product_id)
    }

    pub fn remove_route(&self, route_id: &str) -> OmmResult<Route> {
        self.write()?.remove_route(route_id)
    }

    pub fn remove_action(&self, action_id: &str) -> OmmResult<Action> {
        let mut reg = self.write()?;
        if reg.action(action_id)?.status() == ActionStatus::InProgress {
            return Err(OmmError::validation(format!(
                "工序 {} 执行中, 不能删除",
                action_id
            )));
        }
        reg.detach_action(action_id)
    }

    pub fn remove_job(&self, job_id: &str) -> OmmResult<Job> {
        let job = self.write()?.remove_job(job_id)?;
        info!(job_id, "作业已删除");
        Ok(job)
    }

    // ==========================================
    // 查询（返回副本）
    // ==========================================

    pub fn get_actor(&self, id: &str) -> OmmResult<Actor> {
        self.read()?.actor(id).cloned()
    }

    pub fn get_location(&self, id: &str) -> OmmResult<Location> {
        self.read()?.location(id).cloned()
    }

    pub fn get_storage(&self, id: &str) -> OmmResult<Storage> {
        self.read()?.storage(id).cloned()
    }

    pub fn get_resource(&self, id: &str) -> OmmResult<Resource> {
        self.read()?.resource(id).cloned()
    }

    pub fn get_part(&self, id: &str) -> OmmResult<Part> {
        self.read()?.part(id).cloned()
    }

    pub fn get_product(&self, id: &str) -> OmmResult<Product> {
        self.read()?.product(id).cloned()
    }

    pub fn get_action(&self, id: &str) -> OmmResult<Action> {
        self.read()?.action(id).cloned()
    }

    pub fn get_job(&self, id: &str) -> OmmResult<Job> {
        self.read()?.job(id).cloned()
    }

    pub fn get_route(&self, id: &str) -> OmmResult<Route> {
        self.read()?.route(id).cloned()
    }

    /// 全部作业（按优先级降序,同级按 id）
    pub fn list_jobs(&self) -> OmmResult<Vec<Job>> {
        let reg = self.read()?;
        let mut jobs: Vec<Job> = reg.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    /// 作业工序（按序号）
    pub fn job_actions(&self, job_id: &str) -> OmmResult<Vec<Action>> {
        let reg = self.read()?;
        Ok(reg.job_actions(job_id)?.into_iter().cloned().collect())
    }

    pub fn actions_for_resource(&self, resource_id: &str) -> OmmResult<Vec<String>> {
        let reg = self.read()?;
        reg.resource(resource_id)?;
        Ok(reg.actions_for_resource(resource_id))
    }

    pub fn actions_for_worker(&self, worker_id: &str) -> OmmResult<Vec<String>> {
        let reg = self.read()?;
        reg.actor(worker_id)?;
        Ok(reg.actions_for_worker(worker_id))
    }

    pub fn actions_at_location(&self, location_id: &str) -> OmmResult<Vec<String>> {
        Ok(self.read()?.actions_at_location(location_id))
    }

    pub fn actors_at_location(&self, location_id: &str) -> OmmResult<Vec<String>> {
        Ok(self.read()?.actors_at_location(location_id))
    }

    // ==========================================
    // 更新（在副本上执行,成功后提交）
    // ==========================================

    pub fn update_actor<F>(&self, id: &str, mutate: F) -> OmmResult<Actor>
    where
        F: FnOnce(&mut Actor) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update(&mut reg.actors, "Actor", id, |a| &a.id, mutate)
    }

    pub fn update_location<F>(&self, id: &str, mutate: F) -> OmmResult<Location>
    where
        F: FnOnce(&mut Location) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update(&mut reg.locations, "Location", id, |l| &l.id, mutate)
    }

    pub fn update_storage<F>(&self, id: &str, mutate: F) -> OmmResult<Storage>
    where
        F: FnOnce(&mut Storage) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update(&mut reg.storages, "Storage", id, |s| &s.location.id, mutate)
    }

    /// 更新资源属性
    ///
    /// 占用计数沿用原记录; 槽位/体积容量不得低于现有占用
    pub fn update_resource<F>(&self, id: &str, mutate: F) -> OmmResult<Resource>
    where
        F: FnOnce(&mut Resource) -> OmmResult<()>,
    {
        let cm = self.capacity_manager()?;
        let mut reg = self.write()?;
        commit_update_guarded(
            &mut reg.resources,
            "Resource",
            id,
            |r| &r.id,
            mutate,
            |before, draft| cm.carry_counters(before, draft),
        )
    }

    pub fn update_part<F>(&self, id: &str, mutate: F) -> OmmResult<Part>
    where
        F: FnOnce(&mut Part) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update(&mut reg.parts, "Part", id, |p| &p.id, mutate)
    }

    /// 更新产品属性（工序关联由编排器维护,不可修改）
    pub fn update_product<F>(&self, id: &str, mutate: F) -> OmmResult<Product>
    where
        F: FnOnce(&mut Product) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update_guarded(
            &mut reg.products,
            "Product",
            id,
            |p| &p.id,
            mutate,
            |before, draft| {
                if draft.action_ids() != before.action_ids() {
                    return Err(OmmError::validation(format!(
                        "产品 {} 的工序关联不可通过更新入口修改",
                        before.id
                    )));
                }
                Ok(())
            },
        )
    }

    pub fn update_route<F>(&self, id: &str, mutate: F) -> OmmResult<Route>
    where
        F: FnOnce(&mut Route) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        commit_update(&mut reg.routes, "Route", id, |r| &r.id, mutate)
    }

    /// 更新工序属性（序号变化时重排作业工序）
    ///
    /// id、产品归属、状态、时间戳与工人/资源/地点指派不可通过此入口修改,
    /// 需走 transition_action / assign_* 等专用入口
    pub fn update_action<F>(&self, id: &str, mutate: F) -> OmmResult<Action>
    where
        F: FnOnce(&mut Action) -> OmmResult<()>,
    {
        let mut reg = self.write()?;
        let before = reg.action(id)?.clone();
        let mut draft = before.clone();
        mutate(&mut draft)?;
        ensure_action_patch(&before, &draft)?;
        draft.validate()?;
        let resequenced = draft.sequence != before.sequence;
        *reg.action_mut(id)? = draft.clone();
        if resequenced {
            reg.resequence(id)?;
        }
        Ok(draft)
    }

    // ==========================================
    // 分配关系（工人/资源/地点）
    // ==========================================

    pub fn assign_worker(&self, action_id: &str, worker_id: &str) -> OmmResult<()> {
        self.write()?.assign_worker(action_id, worker_id)?;
        debug!(action_id, worker_id, "工人已指派");
        Ok(())
    }

    pub fn unassign_worker(&self, action_id: &str) -> OmmResult<String> {
        self.write()?.unassign_worker(action_id)
    }

    pub fn assign_resource(&self, action_id: &str, resource_id: &str) -> OmmResult<()> {
        self.write()?.assign_resource(action_id, resource_id)?;
        debug!(action_id, resource_id, "资源已指派");
        Ok(())
    }

    pub fn unassign_resource(&self, action_id: &str) -> OmmResult<String> {
        self.write()?.unassign_resource(action_id)
    }

    pub fn assign_location(&self, action_id: &str, location_id: &str) -> OmmResult<()> {
        self.write()?.assign_location(action_id, location_id)?;
        debug!(action_id, location_id, "地点已指派");
        Ok(())
    }

    // ==========================================
    // 需求匹配
    // ==========================================

    /// 检查工序需求（只读,不修改库存）
    pub fn check_requirements(&self, action_id: &str) -> OmmResult<MatchOutcome> {
        let reg = self.read()?;
        let action = reg.action(action_id)?;
        let ctx = reg.match_context(action);
        RequirementMatcher::check(action, &ctx)
    }

    // ==========================================
    // 工序生命周期
    // ==========================================

    /// 工序状态转换
    ///
    /// # 规则
    /// - → IN_PROGRESS: 作业执行中、前序工序已完成、需求全部满足
    /// - → COMPLETED: ON_ACTION_END 策略下释放分配
    /// - → CANCELLED: 总是释放分配
    ///
    /// # 错误
    /// - `InvalidTransition`: 不存在该边
    /// - `RequirementUnsatisfied`: 需求未满足（携带缺失列表）
    #[instrument(skip(self))]
    pub fn transition_action(&self, action_id: &str, to: ActionStatus) -> OmmResult<()> {
        let release_policy = self.config.release_policy()?;
        let cm = self.capacity_manager()?;
        let events = {
            let mut reg = self.write()?;
            let from = reg.action(action_id)?.status();
            from.transition(to)?;
            if to == ActionStatus::InProgress {
                ensure_startable(&reg, action_id)?;
            }
            let mut events = Vec::new();
            apply_action_status(&mut reg, action_id, to, &mut events)?;
            let release = match to {
                ActionStatus::Cancelled => true,
                ActionStatus::Completed => release_policy == ReleasePolicy::OnActionEnd,
                _ => false,
            };
            if release {
                release_locked(&mut reg, &cm, action_id, &mut events)?;
            }
            events
        };
        self.publish(events);
        Ok(())
    }

    /// 开工工序（REQUESTED 先自动确认）
    #[instrument(skip(self))]
    pub fn start_action(&self, action_id: &str) -> OmmResult<()> {
        let events = {
            let mut reg = self.write()?;
            let mut events = Vec::new();
            start_locked(&mut reg, action_id, &mut events)?;
            events
        };
        self.publish(events);
        Ok(())
    }

    pub fn confirm_action(&self, action_id: &str) -> OmmResult<()> {
        self.transition_action(action_id, ActionStatus::Confirmed)
    }

    pub fn complete_action(&self, action_id: &str) -> OmmResult<()> {
        self.transition_action(action_id, ActionStatus::Completed)
    }

    pub fn cancel_action(&self, action_id: &str) -> OmmResult<()> {
        self.transition_action(action_id, ActionStatus::Cancelled)
    }

    /// 就绪工序: 状态为 REQUESTED/CONFIRMED,且不存在未完成的更小序号工序
    pub fn get_ready_actions(&self, job_id: &str) -> OmmResult<Vec<Action>> {
        let reg = self.read()?;
        ready_action_ids(&reg, job_id)?
            .iter()
            .map(|id| reg.action(id).cloned())
            .collect()
    }

    /// 未完成工序（非终态）
    pub fn get_incomplete_actions(&self, job_id: &str) -> OmmResult<Vec<Action>> {
        let reg = self.read()?;
        Ok(reg
            .job_actions(job_id)?
            .into_iter()
            .filter(|a| !a.status().is_terminal())
            .cloned()
            .collect())
    }

    pub fn get_in_progress_actions(&self, job_id: &str) -> OmmResult<Vec<Action>> {
        let reg = self.read()?;
        Ok(reg
            .job_actions(job_id)?
            .into_iter()
            .filter(|a| a.status() == ActionStatus::InProgress)
            .cloned()
            .collect())
    }

    // ==========================================
    // 作业生命周期
    // ==========================================

    /// 作业开工
    ///
    /// PLANNED → IN_PROGRESS,然后按开工策略自动开工就绪工序:
    /// - FIRST_READY: 仅尝试第一个就绪工序
    /// - ALL_READY: 尝试全部就绪工序
    ///
    /// 需求未满足的工序记入 deferred,不影响作业开工
    #[instrument(skip(self))]
    pub fn start_job(&self, job_id: &str) -> OmmResult<JobStartReport> {
        let policy = self.config.auto_start_policy()?;
        let (report, events) = {
            let mut reg = self.write()?;
            let status = reg.job(job_id)?.status();
            if status != JobStatus::Planned {
                return Err(OmmError::invalid_transition(
                    JobStatus::NAME,
                    status,
                    JobStatus::InProgress,
                ));
            }
            reg.job_mut(job_id)?.apply_status(JobStatus::InProgress, None)?;
            let mut events = vec![OrchestratorEvent::job(
                OrchestratorEventType::JobStarted,
                job_id,
                None,
            )];

            // ==========================================
            // 按策略自动开工就绪工序
            // ==========================================
            let mut candidates = ready_action_ids(&reg, job_id)?;
            if policy == AutoStartPolicy::FirstReady {
                candidates.truncate(1);
            }

            let mut started_actions = Vec::new();
            let mut deferred = Vec::new();
            for action_id in candidates {
                match start_locked(&mut reg, &action_id, &mut events) {
                    Ok(()) => started_actions.push(action_id),
                    Err(OmmError::RequirementUnsatisfied { missing, .. }) => {
                        debug!(job_id, action_id = %action_id, ?missing, "工序需求未满足, 暂缓开工");
                        deferred.push(DeferredAction { action_id, missing });
                    }
                    Err(err) => {
                        warn!(job_id, action_id = %action_id, error = %err, "工序自动开工失败");
                        deferred.push(DeferredAction {
                            action_id,
                            missing: vec![err.to_string()],
                        });
                    }
                }
            }

            info!(
                job_id,
                policy = ?policy,
                started = started_actions.len(),
                deferred = deferred.len(),
                "作业已开工"
            );
            (
                JobStartReport {
                    job_id: job_id.to_string(),
                    policy,
                    started_actions,
                    deferred,
                },
                events,
            )
        };
        self.publish(events);
        Ok(report)
    }

    /// 挂起作业（需为 IN_PROGRESS）
    #[instrument(skip(self))]
    pub fn put_on_hold(&self, job_id: &str, reason: &str) -> OmmResult<()> {
        self.write()?
            .job_mut(job_id)?
            .apply_status(JobStatus::OnHold, Some(reason))?;
        info!(job_id, reason, "作业已挂起");
        self.publish(vec![OrchestratorEvent::job(
            OrchestratorEventType::JobHeld,
            job_id,
            Some(reason.to_string()),
        )]);
        Ok(())
    }

    /// 恢复作业（需为 ON_HOLD）
    #[instrument(skip(self))]
    pub fn resume_job(&self, job_id: &str, reason: &str) -> OmmResult<()> {
        let mut reg = self.write()?;
        let status = reg.job(job_id)?.status();
        if status != JobStatus::OnHold {
            return Err(OmmError::invalid_transition(
                JobStatus::NAME,
                status,
                JobStatus::InProgress,
            ));
        }
        reg.job_mut(job_id)?.apply_status(JobStatus::InProgress, Some(reason))?;
        drop(reg);
        info!(job_id, reason, "作业已恢复");
        self.publish(vec![OrchestratorEvent::job(
            OrchestratorEventType::JobResumed,
            job_id,
            Some(reason.to_string()),
        )]);
        Ok(())
    }

    /// 取消作业
    ///
    /// 同一临界区内: 释放全部分配、取消全部未终结工序、作业转 CANCELLED
    ///
    /// # 返回
    /// 被释放的分配记录
    #[instrument(skip(self))]
    pub fn cancel_job(&self, job_id: &str, reason: &str) -> OmmResult<Vec<Allocation>> {
        let cm = self.capacity_manager()?;
        let (released, events) = {
            let mut reg = self.write()?;
            let job = reg.job(job_id)?;
            job.status().transition(JobStatus::Cancelled)?;
            let action_ids = job.action_ids();

            let mut events = Vec::new();
            let mut released = Vec::new();
            for action_id in &action_ids {
                released.extend(release_locked(&mut reg, &cm, action_id, &mut events)?);
                if !reg.action(action_id)?.status().is_terminal() {
                    apply_action_status(&mut reg, action_id, ActionStatus::Cancelled, &mut events)?;
                }
            }
            reg.job_mut(job_id)?
                .apply_status(JobStatus::Cancelled, Some(reason))?;
            events.push(OrchestratorEvent::job(
                OrchestratorEventType::JobCancelled,
                job_id,
                Some(reason.to_string()),
            ));
            info!(job_id, reason, released = released.len(), "作业已取消");
            (released, events)
        };
        self.publish(events);
        Ok(released)
    }

    /// 完工作业
    ///
    /// # 错误
    /// - `InvalidTransition`: 作业不在 IN_PROGRESS
    /// - `IncompleteActions`: 存在未完成工序
    #[instrument(skip(self))]
    pub fn complete_job(&self, job_id: &str) -> OmmResult<Vec<Allocation>> {
        let cm = self.capacity_manager()?;
        let (released, events) = {
            let mut reg = self.write()?;
            let job = reg.job(job_id)?;
            job.status().transition(JobStatus::Completed)?;

            let remaining: Vec<String> = reg
                .job_actions(job_id)?
                .into_iter()
                .filter(|a| a.status() != ActionStatus::Completed)
                .map(|a| a.id.clone())
                .collect();
            if !remaining.is_empty() {
                return Err(OmmError::IncompleteActions {
                    job_id: job_id.to_string(),
                    remaining,
                });
            }

            let mut events = Vec::new();
            let mut released = Vec::new();
            let allocated: Vec<String> = reg.job(job_id)?.allocations().into_keys().collect();
            for action_id in allocated {
                released.extend(release_locked(&mut reg, &cm, &action_id, &mut events)?);
            }
            reg.job_mut(job_id)?.apply_status(JobStatus::Completed, None)?;
            events.push(OrchestratorEvent::job(
                OrchestratorEventType::JobCompleted,
                job_id,
                None,
            ));
            info!(job_id, released = released.len(), "作业已完工");
            (released, events)
        };
        self.publish(events);
        Ok(released)
    }

    // ==========================================
    // 派生指标（一致快照）
    // ==========================================

    /// 进度 = 已完成工序数 / 工序总数 × 100（无工序时为 0）
    pub fn get_progress(&self, job_id: &str) -> OmmResult<f64> {
        let reg = self.read()?;
        let actions = reg.job_actions(job_id)?;
        if actions.is_empty() {
            return Ok(0.0);
        }
        let completed = actions.iter().filter(|a| a.is_completed()).count();
        Ok(completed as f64 / actions.len() as f64 * 100.0)
    }

    /// 预计剩余工时 = 未完成（且未取消）工序的工时之和,不考虑并行
    pub fn get_estimated_completion_time(&self, job_id: &str) -> OmmResult<f64> {
        let reg = self.read()?;
        Ok(reg
            .job_actions(job_id)?
            .into_iter()
            .filter(|a| !a.status().is_terminal())
            .map(|a| a.duration_hours())
            .sum())
    }

    // ==========================================
    // 资源分配
    // ==========================================

    /// 为工序分配资源
    ///
    /// # 错误
    /// - `CapacityExceeded`: 槽位已满或体积不足
    /// - `AlreadyExists`: 该工序已持有该资源
    #[instrument(skip(self))]
    pub fn allocate_resource(
        &self,
        action_id: &str,
        resource_id: &str,
        amount: Option<f64>,
    ) -> OmmResult<Allocation> {
        let cm = self.capacity_manager()?;
        let (allocation, job_id) = {
            let mut guard = self.write()?;
            let reg = &mut *guard;
            let job_id = reg
                .job_of(action_id)
                .ok_or_else(|| OmmError::not_found("Action", action_id))?
                .to_string();
            let action = reg
                .actions
                .get(action_id)
                .ok_or_else(|| OmmError::not_found("Action", action_id))?;
            if action.status().is_terminal() {
                return Err(OmmError::validation(format!(
                    "工序 {} 状态为 {}, 不能分配资源",
                    action_id,
                    action.status()
                )));
            }
            let job = reg
                .jobs
                .get_mut(&job_id)
                .ok_or_else(|| OmmError::not_found("Job", &job_id))?;
            if job.status().is_terminal() {
                return Err(OmmError::validation(format!(
                    "作业 {} 状态为 {}, 不能分配资源",
                    job_id,
                    job.status()
                )));
            }
            let resource = reg
                .resources
                .get_mut(resource_id)
                .ok_or_else(|| OmmError::not_found("Resource", resource_id))?;
            (cm.allocate(job, action, resource, amount)?, job_id)
        };
        info!(job_id = %job_id, action_id, resource_id, ?amount, "资源分配完成");
        self.publish(vec![OrchestratorEvent::action(
            OrchestratorEventType::ResourceAllocated,
            Some(&job_id),
            action_id,
            Some(resource_id),
            amount.map(|a| a.to_string()),
        )]);
        Ok(allocation)
    }

    /// 显式释放工序持有的全部分配
    pub fn release_action_allocations(&self, action_id: &str) -> OmmResult<Vec<Allocation>> {
        let cm = self.capacity_manager()?;
        let (released, events) = {
            let mut reg = self.write()?;
            reg.action(action_id)?;
            let mut events = Vec::new();
            let released = release_locked(&mut reg, &cm, action_id, &mut events)?;
            (released, events)
        };
        self.publish(events);
        Ok(released)
    }

    pub fn resource_utilization(&self, resource_id: &str) -> OmmResult<ResourceUtilization> {
        let cm = self.capacity_manager()?;
        let reg = self.read()?;
        Ok(cm.utilization(reg.resource(resource_id)?))
    }

    pub fn job_allocations(&self, job_id: &str) -> OmmResult<BTreeMap<String, Vec<Allocation>>> {
        Ok(self.read()?.job(job_id)?.allocations())
    }

    // ==========================================
    // 仓储与库存
    // ==========================================

    pub fn add_item_to_storage(&self, storage_id: &str, item: StoredItem) -> OmmResult<()> {
        let mut reg = self.write()?;
        let storage = reg.storage_mut(storage_id)?;
        storage.add_item(item)?;
        debug!(
            storage_id,
            current = storage.current_capacity(),
            max = storage.max_capacity(),
            "入库完成"
        );
        Ok(())
    }

    pub fn remove_item_from_storage(&self, storage_id: &str, item_id: &str) -> OmmResult<StoredItem> {
        let mut reg = self.write()?;
        let item = reg.storage_mut(storage_id)?.remove_item(item_id)?;
        debug!(storage_id, item_id, "出库完成");
        Ok(item)
    }

    pub fn transfer_item(&self, from_id: &str, to_id: &str, item_id: &str) -> OmmResult<()> {
        let mut reg = self.write()?;
        InventoryLedger::transfer_item(&mut reg.storages, from_id, to_id, item_id)
    }

    /// 扣减零件（需求检查通过后的提交阶段）
    pub fn withdraw_part(&self, part_name: &str, quantity: f64) -> OmmResult<Vec<Withdrawal>> {
        let mut reg = self.write()?;
        InventoryLedger::withdraw_part(&mut reg.storages, part_name, quantity)
    }

    pub fn total_part_quantity(&self, part_name: &str) -> OmmResult<f64> {
        Ok(InventoryLedger::total_quantity(&self.read()?.storages, part_name))
    }

    pub fn parts_below_min_stock(&self) -> OmmResult<Vec<StockShortage>> {
        Ok(InventoryLedger::parts_below_min_stock(&self.read()?.storages))
    }

    /// 产品 BOM 成本（按零件目录）
    pub fn product_cost(&self, product_id: &str) -> OmmResult<f64> {
        let reg = self.read()?;
        reg.product(product_id)?.calculate_total_cost(&reg.parts)
    }

    // ==========================================
    // 传感器
    // ==========================================

    /// 读取传感器（锁外调用外部读取器,不校验量程/告警阈值）
    pub fn read_sensor(
        &self,
        resource_id: &str,
        sensor_id: &str,
        reader: &dyn SensorReader,
    ) -> OmmResult<SensorReading> {
        let sensor = self.read()?.resource(resource_id)?.sensor(sensor_id)?;
        reader.read(&sensor)
    }

    // ==========================================
    // 一致性校验
    // ==========================================

    /// 校验作业与注册表的一致性,返回发现的问题（空表示一致）
    pub fn verify_job_consistency(&self, job_id: &str) -> OmmResult<Vec<String>> {
        let cm = self.capacity_manager()?;
        let reg = self.read()?;
        let job = reg.job(job_id)?;
        let mut issues = Vec::new();

        for product_id in job.product_ids() {
            if reg.product(&product_id).is_err() {
                issues.push(format!("产品 {} 未登记", product_id));
            }
        }

        let mut last_sequence = 0;
        for action_id in job.action_ids() {
            let Ok(action) = reg.action(&action_id) else {
                issues.push(format!("工序 {} 未登记", action_id));
                continue;
            };
            if reg.job_of(&action_id) != Some(job_id) {
                issues.push(format!("工序 {} 的作业索引不一致", action_id));
            }
            if action.sequence < last_sequence {
                issues.push(format!("工序 {} 未按序号排列", action_id));
            }
            last_sequence = action.sequence;
            if action.status() == ActionStatus::InProgress
                && !matches!(job.status(), JobStatus::InProgress | JobStatus::OnHold)
            {
                issues.push(format!(
                    "工序 {} 执行中, 但作业状态为 {}",
                    action_id,
                    job.status()
                ));
            }
        }

        if job.status() == JobStatus::Completed
            && reg.job_actions(job_id).map_or(true, |actions| {
                actions.iter().any(|a| a.status() != ActionStatus::Completed)
            })
        {
            issues.push("作业已完工, 但存在未完成工序".to_string());
        }

        for (action_id, allocations) in job.allocations() {
            if !job.action_ids().contains(&action_id) {
                issues.push(format!("分配表引用了不属于作业的工序 {}", action_id));
            }
            for allocation in allocations {
                match reg.resource(&allocation.resource_id) {
                    Ok(resource) => {
                        if resource.current_load() == 0
                            || resource.current_load() > cm.slot_limit(resource)
                        {
                            issues.push(format!(
                                "资源 {} 的占用 {} 与分配表不一致",
                                resource.id,
                                resource.current_load()
                            ));
                        }
                    }
                    Err(_) => issues.push(format!(
                        "分配引用了未登记的资源 {}",
                        allocation.resource_id
                    )),
                }
            }
        }

        if !issues.is_empty() {
            warn!(job_id, issues = issues.len(), "作业一致性校验发现问题");
        }
        Ok(issues)
    }
}

// ==========================================
// 临界区内的辅助函数（调用方持有写锁）
// ==========================================

/// 在副本上执行修改,成功且 id 未变、校验通过时提交
fn commit_update<T, K, F>(
    map: &mut BTreeMap<String, T>,
    entity: &str,
    id: &str,
    key: K,
    mutate: F,
) -> OmmResult<T>
where
    T: Clone + EntityMapping,
    K: Fn(&T) -> &String,
    F: FnOnce(&mut T) -> OmmResult<()>,
{
    commit_update_guarded(map, entity, id, key, mutate, |_, _| Ok(()))
}

/// 同 commit_update,提交前由 guard 对照原记录修正或拒绝副本
fn commit_update_guarded<T, K, F, G>(
    map: &mut BTreeMap<String, T>,
    entity: &str,
    id: &str,
    key: K,
    mutate: F,
    guard: G,
) -> OmmResult<T>
where
    T: Clone + EntityMapping,
    K: Fn(&T) -> &String,
    F: FnOnce(&mut T) -> OmmResult<()>,
    G: FnOnce(&T, &mut T) -> OmmResult<()>,
{
    let current = map.get(id).ok_or_else(|| OmmError::not_found(entity, id))?;
    let mut draft = current.clone();
    mutate(&mut draft)?;
    if key(&draft) != id {
        return Err(OmmError::validation(format!("{} 的 id 不可修改: {}", entity, id)));
    }
    guard(current, &mut draft)?;
    draft.validate()?;
    map.insert(id.to_string(), draft.clone());
    Ok(draft)
}

/// 工序更新只允许修改描述性属性
fn ensure_action_patch(before: &Action, draft: &Action) -> OmmResult<()> {
    let locked_changed = draft.id != before.id
        || draft.product_id != before.product_id
        || draft.status() != before.status()
        || draft.started_at != before.started_at
        || draft.completed_at != before.completed_at
        || draft.worker_id() != before.worker_id()
        || draft.resource_id() != before.resource_id()
        || draft.location_id() != before.location_id();
    if locked_changed {
        return Err(OmmError::validation(format!(
            "工序 {} 的 id、产品归属、状态与指派关系不可通过更新入口修改",
            before.id
        )));
    }
    if draft.progress() != before.progress() && before.status() != ActionStatus::InProgress {
        return Err(OmmError::validation(format!(
            "工序 {} 状态为 {}, 不能更新进度",
            before.id,
            before.status()
        )));
    }
    Ok(())
}

/// 就绪工序 id（按序号）
fn ready_action_ids(reg: &Registry, job_id: &str) -> OmmResult<Vec<String>> {
    let actions = reg.job_actions(job_id)?;
    Ok(actions
        .iter()
        .filter(|action| is_ready(&actions, action))
        .map(|action| action.id.clone())
        .collect())
}

/// 状态为 REQUESTED/CONFIRMED,且所有更小序号的兄弟工序已完成或已取消
fn is_ready(siblings: &[&Action], action: &Action) -> bool {
    matches!(
        action.status(),
        ActionStatus::Requested | ActionStatus::Confirmed
    ) && siblings
        .iter()
        .filter(|other| other.sequence < action.sequence)
        .all(|other| other.status().is_terminal())
}

/// 开工前置条件: 作业执行中、工序就绪、需求满足
fn ensure_startable(reg: &Registry, action_id: &str) -> OmmResult<()> {
    let action = reg.action(action_id)?;
    let job_id = reg
        .job_of(action_id)
        .ok_or_else(|| OmmError::not_found("Job", action_id))?;
    let job = reg.job(job_id)?;
    if job.status() != JobStatus::InProgress {
        return Err(OmmError::validation(format!(
            "作业 {} 状态为 {}, 工序 {} 不能开工",
            job_id,
            job.status(),
            action_id
        )));
    }

    let siblings = reg.job_actions(job_id)?;
    if let Some(blocking) = siblings
        .iter()
        .find(|other| other.sequence < action.sequence && !other.status().is_terminal())
    {
        return Err(OmmError::validation(format!(
            "工序 {} 的前序工序 {} 尚未完成",
            action_id, blocking.id
        )));
    }

    let ctx = reg.match_context(action);
    let outcome = RequirementMatcher::check(action, &ctx)?;
    if !outcome.satisfied {
        return Err(OmmError::RequirementUnsatisfied {
            action_id: action_id.to_string(),
            missing: outcome.missing,
        });
    }
    Ok(())
}

/// 开工: REQUESTED 先确认,前置条件全部通过后才修改状态
fn start_locked(reg: &mut Registry, action_id: &str, events: &mut Vec<OrchestratorEvent>) -> OmmResult<()> {
    let status = reg.action(action_id)?.status();
    let path: &[ActionStatus] = match status {
        ActionStatus::Requested => &[ActionStatus::Confirmed, ActionStatus::InProgress],
        ActionStatus::Confirmed => &[ActionStatus::InProgress],
        other => {
            return Err(OmmError::invalid_transition(
                ActionStatus::NAME,
                other,
                ActionStatus::InProgress,
            ))
        }
    };
    ensure_startable(reg, action_id)?;
    for to in path {
        apply_action_status(reg, action_id, *to, events)?;
    }
    Ok(())
}

fn apply_action_status(
    reg: &mut Registry,
    action_id: &str,
    to: ActionStatus,
    events: &mut Vec<OrchestratorEvent>,
) -> OmmResult<()> {
    let from = reg.action_mut(action_id)?.apply_status(to)?;
    let job_id = reg.job_of(action_id).map(str::to_string);
    info!(action_id, job_id = ?job_id, from = %from, to = %to, "工序状态变更");
    events.push(OrchestratorEvent::action(
        OrchestratorEventType::ActionStatusChanged,
        job_id.as_deref(),
        action_id,
        None,
        Some(format!("{}→{}", from, to)),
    ));
    Ok(())
}

fn release_locked(
    reg: &mut Registry,
    cm: &CapacityManager,
    action_id: &str,
    events: &mut Vec<OrchestratorEvent>,
) -> OmmResult<Vec<Allocation>> {
    let Some(job_id) = reg.job_of(action_id).map(str::to_string) else {
        return Ok(Vec::new());
    };
    let job = reg
        .jobs
        .get_mut(&job_id)
        .ok_or_else(|| OmmError::not_found("Job", &job_id))?;
    let released = cm.release_action(job, action_id, &mut reg.resources);
    for allocation in &released {
        events.push(OrchestratorEvent::action(
            OrchestratorEventType::AllocationReleased,
            Some(&job_id),
            action_id,
            Some(&allocation.resource_id),
            None,
        ));
    }
    Ok(released)
}
