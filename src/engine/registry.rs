// ==========================================
// 开放制造模型 (OMM) - 实体注册表与关系索引
// ==========================================
// 职责: 按 id 持有全部实体（arena）,并维护关系索引
// - resource → actions / worker → actions / location → actions
// - action → job
// 说明: 实体之间只保存 id,不互相持有引用
// 红线: 注册表本身不加锁,由编排器统一加锁访问
// ==========================================

use crate::domain::action::Action;
use crate::domain::actor::Actor;
use crate::domain::error::{OmmError, OmmResult};
use crate::domain::job::Job;
use crate::domain::location::Location;
use crate::domain::part::Part;
use crate::domain::product::Product;
use crate::domain::resource::Resource;
use crate::domain::route::Route;
use crate::domain::storage::Storage;
use crate::domain::types::ActionStatus;
use crate::engine::requirement_matcher::MatchContext;
use std::collections::{BTreeMap, BTreeSet};

/// 按 id 取实体
fn fetch<'a, T>(map: &'a BTreeMap<String, T>, entity: &str, id: &str) -> OmmResult<&'a T> {
    map.get(id).ok_or_else(|| OmmError::not_found(entity, id))
}

fn fetch_mut<'a, T>(map: &'a mut BTreeMap<String, T>, entity: &str, id: &str) -> OmmResult<&'a mut T> {
    map.get_mut(id).ok_or_else(|| OmmError::not_found(entity, id))
}

/// 插入实体（id 重复则拒绝）
fn insert_unique<T>(map: &mut BTreeMap<String, T>, entity: &str, id: &str, value: T) -> OmmResult<()> {
    if map.contains_key(id) {
        return Err(OmmError::already_exists(entity, id));
    }
    map.insert(id.to_string(), value);
    Ok(())
}

fn index_add(index: &mut BTreeMap<String, BTreeSet<String>>, key: &str, action_id: &str) {
    index
        .entry(key.to_string())
        .or_default()
        .insert(action_id.to_string());
}

fn index_remove(index: &mut BTreeMap<String, BTreeSet<String>>, key: &str, action_id: &str) {
    if let Some(set) = index.get_mut(key) {
        set.remove(action_id);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

// ==========================================
// Registry
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub(crate) actors: BTreeMap<String, Actor>,
    pub(crate) locations: BTreeMap<String, Location>,
    pub(crate) storages: BTreeMap<String, Storage>,
    pub(crate) resources: BTreeMap<String, Resource>,
    pub(crate) parts: BTreeMap<String, Part>,
    pub(crate) products: BTreeMap<String, Product>,
    pub(crate) actions: BTreeMap<String, Action>,
    pub(crate) jobs: BTreeMap<String, Job>,
    pub(crate) routes: BTreeMap<String, Route>,

    // ===== 关系索引 =====
    resource_actions: BTreeMap<String, BTreeSet<String>>,
    worker_actions: BTreeMap<String, BTreeSet<String>>,
    location_actions: BTreeMap<String, BTreeSet<String>>,
    action_job: BTreeMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn actor(&self, id: &str) -> OmmResult<&Actor> {
        fetch(&self.actors, "Actor", id)
    }

    pub fn location(&self, id: &str) -> OmmResult<&Location> {
        fetch(&self.locations, "Location", id)
    }

    pub fn storage(&self, id: &str) -> OmmResult<&Storage> {
        fetch(&self.storages, "Storage", id)
    }

    pub fn storage_mut(&mut self, id: &str) -> OmmResult<&mut Storage> {
        fetch_mut(&mut self.storages, "Storage", id)
    }

    pub fn resource(&self, id: &str) -> OmmResult<&Resource> {
        fetch(&self.resources, "Resource", id)
    }

    pub fn part(&self, id: &str) -> OmmResult<&Part> {
        fetch(&self.parts, "Part", id)
    }

    pub fn product(&self, id: &str) -> OmmResult<&Product> {
        fetch(&self.products, "Product", id)
    }

    pub fn action(&self, id: &str) -> OmmResult<&Action> {
        fetch(&self.actions, "Action", id)
    }

    pub fn action_mut(&mut self, id: &str) -> OmmResult<&mut Action> {
        fetch_mut(&mut self.actions, "Action", id)
    }

    pub fn job(&self, id: &str) -> OmmResult<&Job> {
        fetch(&self.jobs, "Job", id)
    }

    pub fn job_mut(&mut self, id: &str) -> OmmResult<&mut Job> {
        fetch_mut(&mut self.jobs, "Job", id)
    }

    pub fn route(&self, id: &str) -> OmmResult<&Route> {
        fetch(&self.routes, "Route", id)
    }

    /// 工序所属作业 id
    pub fn job_of(&self, action_id: &str) -> Option<&str> {
        self.action_job.get(action_id).map(String::as_str)
    }

    /// 作业工序（按序号排列）
    pub fn job_actions(&self, job_id: &str) -> OmmResult<Vec<&Action>> {
        let job = self.job(job_id)?;
        job.action_ids()
            .iter()
            .map(|id| self.action(id))
            .collect()
    }

    pub fn actions_for_resource(&self, resource_id: &str) -> Vec<String> {
        self.resource_actions
            .get(resource_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn actions_for_worker(&self, worker_id: &str) -> Vec<String> {
        self.worker_actions
            .get(worker_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn actions_at_location(&self, location_id: &str) -> Vec<String> {
        self.location_actions
            .get(location_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 关联到地点的参与方
    pub fn actors_at_location(&self, location_id: &str) -> Vec<String> {
        self.actors
            .values()
            .filter(|actor| actor.is_at(location_id))
            .map(|actor| actor.id.clone())
            .collect()
    }

    fn location_exists(&self, id: &str) -> bool {
        self.locations.contains_key(id) || self.storages.contains_key(id)
    }

    /// 构造工序的需求匹配上下文
    ///
    /// 候选资源 = 指派资源 + 作业分配表中该工序的全部资源;
    /// 可达仓储 = 全部已登记仓储; 产品范围 = 所属作业的产品
    pub fn match_context(&self, action: &Action) -> MatchContext<'_> {
        let mut ctx = MatchContext::new();
        ctx.worker = action.worker_id().and_then(|id| self.actors.get(id));
        if let Some(resource) = action.resource_id().and_then(|id| self.resources.get(id)) {
            ctx.push_resource(resource);
        }
        ctx.storages = self.storages.values().collect();
        if let Some(job) = self.job_of(&action.id).and_then(|id| self.jobs.get(id)) {
            for allocation in job.allocations_for(&action.id) {
                if let Some(resource) = self.resources.get(&allocation.resource_id) {
                    ctx.push_resource(resource);
                }
            }
            ctx.products = job
                .product_ids()
                .iter()
                .filter_map(|id| self.products.get(id))
                .collect();
        }
        ctx
    }

    // ==========================================
    // 登记
    // ==========================================

    pub fn insert_actor(&mut self, actor: Actor) -> OmmResult<String> {
        let id = actor.id.clone();
        insert_unique(&mut self.actors, "Actor", &id, actor)?;
        Ok(id)
    }

    pub fn insert_location(&mut self, location: Location) -> OmmResult<String> {
        let id = location.id.clone();
        if self.storages.contains_key(&id) {
            return Err(OmmError::already_exists("Location", &id));
        }
        insert_unique(&mut self.locations, "Location", &id, location)?;
        Ok(id)
    }

    pub fn insert_storage(&mut self, storage: Storage) -> OmmResult<String> {
        let id = storage.id().to_string();
        if self.locations.contains_key(&id) {
            return Err(OmmError::already_exists("Storage", &id));
        }
        insert_unique(&mut self.storages, "Storage", &id, storage)?;
        Ok(id)
    }

    pub fn insert_resource(&mut self, resource: Resource) -> OmmResult<String> {
        let id = resource.id.clone();
        insert_unique(&mut self.resources, "Resource", &id, resource)?;
        Ok(id)
    }

    pub fn insert_part(&mut self, part: Part) -> OmmResult<String> {
        let id = part.id.clone();
        insert_unique(&mut self.parts, "Part", &id, part)?;
        Ok(id)
    }

    pub fn insert_product(&mut self, product: Product) -> OmmResult<String> {
        let id = product.id.clone();
        insert_unique(&mut self.products, "Product", &id, product)?;
        Ok(id)
    }

    pub fn insert_route(&mut self, route: Route) -> OmmResult<String> {
        let id = route.id.clone();
        insert_unique(&mut self.routes, "Route", &id, route)?;
        Ok(id)
    }

    /// 登记作业（产品必须已登记）
    pub fn insert_job(&mut self, job: Job) -> OmmResult<String> {
        for product_id in job.product_ids() {
            self.product(&product_id)?;
        }
        let id = job.id.clone();
        insert_unique(&mut self.jobs, "Job", &id, job)?;
        Ok(id)
    }

    /// 将工序加入作业,并按 (sequence, 加入顺序) 重排
    pub fn attach_action(&mut self, job_id: &str, action: Action) -> OmmResult<String> {
        self.job(job_id)?;
        if self.actions.contains_key(&action.id) {
            return Err(OmmError::already_exists("Action", &action.id));
        }
        if let Some(product_id) = &action.product_id {
            self.product(product_id)?;
        }
        if action.worker_id().is_some() || action.resource_id().is_some() || action.location_id().is_some() {
            return Err(OmmError::validation(format!(
                "工序 {} 的分配必须通过编排器登记",
                action.id
            )));
        }

        let action_id = action.id.clone();
        let product_id = action.product_id.clone();
        self.actions.insert(action_id.clone(), action);
        self.action_job.insert(action_id.clone(), job_id.to_string());

        let ordered = self.ordered_ids(
            self.job(job_id)?
                .action_ids()
                .into_iter()
                .chain(std::iter::once(action_id.clone()))
                .collect(),
        );
        self.job_mut(job_id)?.set_action_order(ordered);

        if let Some(product_id) = product_id {
            let product = fetch_mut(&mut self.products, "Product", &product_id)?;
            product.attach_action(&action_id)?;
            let current = product.action_ids();
            let ordered = self.ordered_ids(current);
            fetch_mut(&mut self.products, "Product", &product_id)?.set_action_order(ordered);
        }
        Ok(action_id)
    }

    /// 工序序号变更后重排所属作业与产品的工序列表
    pub fn resequence(&mut self, action_id: &str) -> OmmResult<()> {
        let product_id = self.action(action_id)?.product_id.clone();
        if let Some(job_id) = self.job_of(action_id).map(str::to_string) {
            let ordered = self.ordered_ids(self.job(&job_id)?.action_ids());
            self.job_mut(&job_id)?.set_action_order(ordered);
        }
        if let Some(product_id) = product_id {
            let ordered = self.ordered_ids(self.product(&product_id)?.action_ids());
            fetch_mut(&mut self.products, "Product", &product_id)?.set_action_order(ordered);
        }
        Ok(())
    }

    /// 按序号稳定排序工序 id
    fn ordered_ids(&self, ids: Vec<String>) -> Vec<String> {
        let mut keyed: Vec<(u32, usize, String)> = ids
            .into_iter()
            .enumerate()
            .map(|(pos, id)| {
                let sequence = self.actions.get(&id).map_or(u32::MAX, |a| a.sequence);
                (sequence, pos, id)
            })
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, _, id)| id).collect()
    }

    // ==========================================
    // 分配关系
    // ==========================================

    pub fn assign_worker(&mut self, action_id: &str, worker_id: &str) -> OmmResult<()> {
        let worker = self.actor(worker_id)?;
        if !worker.is_worker() {
            return Err(OmmError::validation(format!(
                "参与方 {} 不是工人",
                worker_id
            )));
        }
        let previous = self.action(action_id)?.worker_id().map(str::to_string);
        if previous.as_deref() == Some(worker_id) {
            return Err(OmmError::already_exists("WorkerAssignment", action_id));
        }
        if let Some(prev) = previous {
            index_remove(&mut self.worker_actions, &prev, action_id);
        }
        index_add(&mut self.worker_actions, worker_id, action_id);
        self.action_mut(action_id)?.set_worker(Some(worker_id.to_string()));
        Ok(())
    }

    pub fn unassign_worker(&mut self, action_id: &str) -> OmmResult<String> {
        let previous = self
            .action(action_id)?
            .worker_id()
            .map(str::to_string)
            .ok_or_else(|| OmmError::not_found("WorkerAssignment", action_id))?;
        index_remove(&mut self.worker_actions, &previous, action_id);
        self.action_mut(action_id)?.set_worker(None);
        Ok(previous)
    }

    pub fn assign_resource(&mut self, action_id: &str, resource_id: &str) -> OmmResult<()> {
        self.resource(resource_id)?;
        let previous = self.action(action_id)?.resource_id().map(str::to_string);
        if previous.as_deref() == Some(resource_id) {
            return Err(OmmError::already_exists("ResourceAssignment", action_id));
        }
        if let Some(prev) = previous {
            index_remove(&mut self.resource_actions, &prev, action_id);
        }
        index_add(&mut self.resource_actions, resource_id, action_id);
        self.action_mut(action_id)?.set_resource(Some(resource_id.to_string()));
        Ok(())
    }

    pub fn unassign_resource(&mut self, action_id: &str) -> OmmResult<String> {
        let previous = self
            .action(action_id)?
            .resource_id()
            .map(str::to_string)
            .ok_or_else(|| OmmError::not_found("ResourceAssignment", action_id))?;
        index_remove(&mut self.resource_actions, &previous, action_id);
        self.action_mut(action_id)?.set_resource(None);
        Ok(previous)
    }

    pub fn assign_location(&mut self, action_id: &str, location_id: &str) -> OmmResult<()> {
        if !self.location_exists(location_id) {
            return Err(OmmError::not_found("Location", location_id));
        }
        let previous = self.action(action_id)?.location_id().map(str::to_string);
        if previous.as_deref() == Some(location_id) {
            return Err(OmmError::already_exists("LocationAssignment", action_id));
        }
        if let Some(prev) = previous {
            index_remove(&mut self.location_actions, &prev, action_id);
        }
        index_add(&mut self.location_actions, location_id, action_id);
        self.action_mut(action_id)?.set_location(Some(location_id.to_string()));
        Ok(())
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除参与方（指派给执行中工序时拒绝）,同时解除其工序分配
    pub fn remove_actor(&mut self, actor_id: &str) -> OmmResult<Actor> {
        if let Some(running) = self
            .actions_for_worker(actor_id)
            .into_iter()
            .find(|id| {
                self.actions
                    .get(id)
                    .map_or(false, |action| action.status() == ActionStatus::InProgress)
            })
        {
            return Err(OmmError::validation(format!(
                "参与方 {} 仍指派给执行中的工序 {}, 不能删除",
                actor_id, running
            )));
        }
        let actor = self
            .actors
            .remove(actor_id)
            .ok_or_else(|| OmmError::not_found("Actor", actor_id))?;
        if let Some(action_ids) = self.worker_actions.remove(actor_id) {
            for action_id in action_ids {
                if let Some(action) = self.actions.get_mut(&action_id) {
                    action.set_worker(None);
                }
            }
        }
        Ok(actor)
    }

    /// 删除资源（持有分配时拒绝）,同时解除其工序分配
    pub fn remove_resource(&mut self, resource_id: &str) -> OmmResult<Resource> {
        let load = self.resource(resource_id)?.current_load();
        if load > 0 {
            return Err(OmmError::validation(format!(
                "资源 {} 仍有 {} 个分配, 不能删除",
                resource_id, load
            )));
        }
        let resource = self
            .resources
            .remove(resource_id)
            .ok_or_else(|| OmmError::not_found("Resource", resource_id))?;
        if let Some(action_ids) = self.resource_actions.remove(resource_id) {
            for action_id in action_ids {
                if let Some(action) = self.actions.get_mut(&action_id) {
                    action.set_resource(None);
                }
            }
        }
        Ok(resource)
    }

    pub fn remove_location(&mut self, location_id: &str) -> OmmResult<Location> {
        let location = self
            .locations
            .remove(location_id)
            .ok_or_else(|| OmmError::not_found("Location", location_id))?;
        self.detach_location_actions(location_id);
        Ok(location)
    }

    pub fn remove_storage(&mut self, storage_id: &str) -> OmmResult<Storage> {
        let storage = self
            .storages
            .remove(storage_id)
            .ok_or_else(|| OmmError::not_found("Storage", storage_id))?;
        self.detach_location_actions(storage_id);
        Ok(storage)
    }

    fn detach_location_actions(&mut self, location_id: &str) {
        if let Some(action_ids) = self.location_actions.remove(location_id) {
            for action_id in action_ids {
                if let Some(action) = self.actions.get_mut(&action_id) {
                    action.set_location(None);
                }
            }
        }
    }

    pub fn remove_part(&mut self, part_id: &str) -> OmmResult<Part> {
        self.parts
            .remove(part_id)
            .ok_or_else(|| OmmError::not_found("Part", part_id))
    }

    /// 删除产品（仍被作业引用时拒绝）
    pub fn remove_product(&mut self, product_id: &str) -> OmmResult<Product> {
        if let Some(job) = self
            .jobs
            .values()
            .find(|job| job.product_ids().iter().any(|id| id == product_id))
        {
            return Err(OmmError::validation(format!(
                "产品 {} 仍被作业 {} 引用",
                product_id, job.id
            )));
        }
        let product = self
            .products
            .remove(product_id)
            .ok_or_else(|| OmmError::not_found("Product", product_id))?;
        for action_id in product.action_ids() {
            if let Some(action) = self.actions.get_mut(&action_id) {
                action.product_id = None;
            }
        }
        Ok(product)
    }

    pub fn remove_route(&mut self, route_id: &str) -> OmmResult<Route> {
        self.routes
            .remove(route_id)
            .ok_or_else(|| OmmError::not_found("Route", route_id))
    }

    /// 删除前置校验（不修改任何状态）
    fn ensure_detachable(&self, action_id: &str) -> OmmResult<()> {
        let action = self.action(action_id)?;
        if let Some(job_id) = self.job_of(action_id) {
            if !self.job(job_id)?.allocations_for(action_id).is_empty() {
                return Err(OmmError::validation(format!(
                    "工序 {} 仍持有资源分配, 不能删除",
                    action_id
                )));
            }
        }
        if let Some(product) = action
            .product_id
            .as_ref()
            .and_then(|id| self.products.get(id))
        {
            if !product.action_ids().iter().any(|id| id == action_id) {
                return Err(OmmError::not_found("ProductAction", action_id));
            }
        }
        Ok(())
    }

    /// 从作业中删除工序（持有分配时拒绝）
    pub fn detach_action(&mut self, action_id: &str) -> OmmResult<Action> {
        self.ensure_detachable(action_id)?;
        let job_id = self.job_of(action_id).map(str::to_string);
        let action = self
            .actions
            .remove(action_id)
            .ok_or_else(|| OmmError::not_found("Action", action_id))?;

        if let Some(worker_id) = action.worker_id() {
            index_remove(&mut self.worker_actions, worker_id, action_id);
        }
        if let Some(resource_id) = action.resource_id() {
            index_remove(&mut self.resource_actions, resource_id, action_id);
        }
        if let Some(location_id) = action.location_id() {
            index_remove(&mut self.location_actions, location_id, action_id);
        }
        if let Some(product_id) = &action.product_id {
            if let Some(product) = self.products.get_mut(product_id) {
                product.detach_action(action_id)?;
            }
        }
        if let Some(job_id) = job_id {
            self.action_job.remove(action_id);
            let job = self.job_mut(&job_id)?;
            let remaining: Vec<String> = job
                .action_ids()
                .into_iter()
                .filter(|id| id != action_id)
                .collect();
            job.set_action_order(remaining);
        }
        Ok(action)
    }

    /// 删除作业及其全部工序（执行中/挂起的作业需先取消或完工）
    pub fn remove_job(&mut self, job_id: &str) -> OmmResult<Job> {
        let job = self.job(job_id)?;
        if job.allocation_count() > 0 {
            return Err(OmmError::validation(format!(
                "作业 {} 仍持有资源分配, 不能删除",
                job_id
            )));
        }
        if matches!(
            job.status(),
            crate::domain::types::JobStatus::InProgress | crate::domain::types::JobStatus::OnHold
        ) {
            return Err(OmmError::validation(format!(
                "作业 {} 状态为 {}, 需先取消或完工",
                job_id,
                job.status()
            )));
        }
        // 先整体校验,任何一道工序不可删除时作业保持原状
        let action_ids = job.action_ids();
        for action_id in &action_ids {
            self.ensure_detachable(action_id)?;
        }
        for action_id in &action_ids {
            self.detach_action(action_id)?;
        }
        self.jobs
            .remove(job_id)
            .ok_or_else(|| OmmError::not_found("Job", job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::ResourceVariant;
    use crate::domain::types::{ActionType, JobPriority};

    fn registry_with_job() -> Registry {
        let mut registry = Registry::new();
        registry
            .insert_product(Product::new("Widget", None).unwrap().with_id("PRD-1"))
            .unwrap();
        registry
            .insert_job(
                Job::new("Order", vec!["PRD-1".into()], JobPriority::Medium, None)
                    .unwrap()
                    .with_id("J-1"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_actions_ordered_by_sequence() {
        let mut registry = registry_with_job();
        for (id, seq) in [("A-3", 3), ("A-1", 1), ("A-2", 2)] {
            let action = Action::new(id, ActionType::Process, seq, 1.0).unwrap().with_id(id);
            registry.attach_action("J-1", action).unwrap();
        }
        assert_eq!(registry.job("J-1").unwrap().action_ids(), vec!["A-1", "A-2", "A-3"]);
        assert_eq!(registry.job_of("A-2"), Some("J-1"));
    }

    #[test]
    fn test_resource_index_follows_reassignment() {
        let mut registry = registry_with_job();
        let action = Action::new("Cut", ActionType::Machining, 1, 1.0).unwrap().with_id("A-1");
        registry.attach_action("J-1", action).unwrap();
        for id in ["R-1", "R-2"] {
            registry
                .insert_resource(Resource::new(id, ResourceVariant::machine("Saw")).unwrap().with_id(id))
                .unwrap();
        }

        registry.assign_resource("A-1", "R-1").unwrap();
        assert!(matches!(
            registry.assign_resource("A-1", "R-1"),
            Err(OmmError::AlreadyExists { .. })
        ));
        registry.assign_resource("A-1", "R-2").unwrap();
        assert!(registry.actions_for_resource("R-1").is_empty());
        assert_eq!(registry.actions_for_resource("R-2"), vec!["A-1"]);

        registry.remove_resource("R-2").unwrap();
        assert_eq!(registry.action("A-1").unwrap().resource_id(), None);
    }

    #[test]
    fn test_duplicate_ids_rejected_per_collection() {
        let mut registry = registry_with_job();
        let dup = registry.insert_product(Product::new("Other", None).unwrap().with_id("PRD-1"));
        assert!(matches!(dup, Err(OmmError::AlreadyExists { .. })));
        assert!(matches!(
            registry.assign_worker("A-404", "W-404"),
            Err(OmmError::NotFound { .. })
        ));
    }

    #[test]
    fn test_worker_on_running_action_cannot_be_removed() {
        let mut registry = registry_with_job();
        let action = Action::new("Fit", ActionType::Assembly, 1, 1.0).unwrap().with_id("A-1");
        registry.attach_action("J-1", action).unwrap();
        registry
            .insert_actor(Actor::worker("Fitter").unwrap().with_id("W-1"))
            .unwrap();
        registry.assign_worker("A-1", "W-1").unwrap();
        let running = registry.action_mut("A-1").unwrap();
        running.apply_status(ActionStatus::Confirmed).unwrap();
        running.apply_status(ActionStatus::InProgress).unwrap();

        assert!(matches!(
            registry.remove_actor("W-1"),
            Err(OmmError::ValidationError(_))
        ));
        assert_eq!(registry.action("A-1").unwrap().worker_id(), Some("W-1"));
        assert_eq!(registry.actions_for_worker("W-1"), vec!["A-1"]);

        registry
            .action_mut("A-1")
            .unwrap()
            .apply_status(ActionStatus::Completed)
            .unwrap();
        registry.remove_actor("W-1").unwrap();
        assert_eq!(registry.action("A-1").unwrap().worker_id(), None);
    }

    #[test]
    fn test_failed_job_removal_leaves_every_action() {
        let mut registry = registry_with_job();
        for (id, seq) in [("A-1", 1), ("A-2", 2)] {
            let action = Action::new(id, ActionType::Process, seq, 1.0)
                .unwrap()
                .with_id(id)
                .with_product("PRD-1");
            registry.attach_action("J-1", action).unwrap();
        }
        // 产品侧已丢失 A-2 的关联
        registry
            .products
            .get_mut("PRD-1")
            .unwrap()
            .detach_action("A-2")
            .unwrap();

        assert!(matches!(
            registry.remove_job("J-1"),
            Err(OmmError::NotFound { .. })
        ));
        assert!(registry.action("A-1").is_ok());
        assert_eq!(registry.job("J-1").unwrap().action_ids(), vec!["A-1", "A-2"]);
        assert_eq!(registry.product("PRD-1").unwrap().action_ids(), vec!["A-1"]);
    }
}
