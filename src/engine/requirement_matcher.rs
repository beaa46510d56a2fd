// ==========================================
// 开放制造模型 (OMM) - 需求匹配器
// ==========================================
// 职责: 判定工序的全部需求是否被候选分配满足
// 规则:
// - 逐条独立判定,不短路,一次性报告全部缺失项
// - 只在需求格式非法时报错,"不满足" 不是错误
// - 检查阶段不修改库存（检查与扣减分离）
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::action::Action;
use crate::domain::actor::Actor;
use crate::domain::error::OmmResult;
use crate::domain::product::Product;
use crate::domain::requirement::Requirement;
use crate::domain::resource::Resource;
use crate::domain::storage::{ItemKind, Storage};
use crate::domain::types::RequirementKind;
use serde::Serialize;

/// 匹配上下文（候选分配 + 可达范围）
#[derive(Debug, Clone, Default)]
pub struct MatchContext<'a> {
    /// 分配的工人
    pub worker: Option<&'a Actor>,
    /// 候选资源（指派资源 + 分配表中的资源）
    pub resources: Vec<&'a Resource>,
    /// 可达仓储
    pub storages: Vec<&'a Storage>,
    /// 范围内的产品
    pub products: Vec<&'a Product>,
}

impl<'a> MatchContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker: &'a Actor) -> Self {
        self.worker = Some(worker);
        self
    }

    /// 追加候选资源（同 id 不重复加入）
    pub fn with_resource(mut self, resource: &'a Resource) -> Self {
        self.push_resource(resource);
        self
    }

    pub fn push_resource(&mut self, resource: &'a Resource) {
        if !self.resources.iter().any(|r| r.id == resource.id) {
            self.resources.push(resource);
        }
    }

    pub fn with_storage(mut self, storage: &'a Storage) -> Self {
        self.storages.push(storage);
        self
    }

    pub fn with_product(mut self, product: &'a Product) -> Self {
        self.products.push(product);
        self
    }
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    pub satisfied: bool,
    pub missing: Vec<String>,
}

impl MatchOutcome {
    /// 转为 (satisfied, missing) 元组
    pub fn into_pair(self) -> (bool, Vec<String>) {
        (self.satisfied, self.missing)
    }
}

// ==========================================
// RequirementMatcher - 纯函数工具类
// ==========================================
pub struct RequirementMatcher;

impl RequirementMatcher {
    /// 判定工序全部需求
    pub fn check(action: &Action, ctx: &MatchContext<'_>) -> OmmResult<MatchOutcome> {
        Self::check_all(action.requirements_ref(), ctx)
    }

    /// 判定需求列表
    pub fn check_all(requirements: &[Requirement], ctx: &MatchContext<'_>) -> OmmResult<MatchOutcome> {
        let mut missing = Vec::new();
        for requirement in requirements {
            if !Self::check_requirement(requirement, ctx)? {
                missing.push(requirement.to_string());
            }
        }
        Ok(MatchOutcome {
            satisfied: missing.is_empty(),
            missing,
        })
    }

    /// 判定单条需求
    pub fn check_requirement(requirement: &Requirement, ctx: &MatchContext<'_>) -> OmmResult<bool> {
        requirement.validate()?;
        let specs = requirement.text_specs();

        let satisfied = match requirement.kind {
            RequirementKind::Worker => Self::worker_satisfies(ctx.worker, &specs),
            RequirementKind::Part => match requirement.part_request() {
                Some((name, quantity)) => Self::stock_satisfies(&ctx.storages, name, quantity),
                None => false,
            },
            RequirementKind::Product => Self::product_in_scope(ctx, specs.first().map(String::as_str)),
            kind => Self::resource_satisfies(&ctx.resources, kind, &specs),
        };
        Ok(satisfied)
    }

    /// 工人: 已分配,且规格为空或角色/授权标签与规格相交
    fn worker_satisfies(worker: Option<&Actor>, specs: &[String]) -> bool {
        match worker {
            Some(worker) if worker.is_worker() => specs.is_empty() || worker.covers_any(specs),
            _ => false,
        }
    }

    /// 资源: 任一候选资源为同变体,且规格为空或任一规格匹配其类型名/能力
    fn resource_satisfies(resources: &[&Resource], kind: RequirementKind, specs: &[String]) -> bool {
        resources.iter().any(|resource| {
            kind.resource_type() == Some(resource.resource_type())
                && (specs.is_empty() || specs.iter().any(|spec| resource.matches_spec(spec)))
        })
    }

    /// 零件: 可达仓储中同名零件数量之和 ≥ 需求数量（未给数量时 > 0）
    fn stock_satisfies(storages: &[&Storage], part_name: &str, quantity: Option<f64>) -> bool {
        let on_hand: f64 = storages.iter().map(|s| s.quantity_of(part_name)).sum();
        match quantity {
            Some(required) => on_hand >= required,
            None => on_hand > 0.0,
        }
    }

    /// 产品: 范围内存在（按 id 或名称）,包括仓储中的产品
    fn product_in_scope(ctx: &MatchContext<'_>, id_or_name: Option<&str>) -> bool {
        match id_or_name {
            None => {
                !ctx.products.is_empty()
                    || ctx
                        .storages
                        .iter()
                        .any(|s| !s.items_by_kind(ItemKind::Product).is_empty())
            }
            Some(key) => {
                ctx.products.iter().any(|p| p.id == key || p.name == key)
                    || ctx.storages.iter().any(|s| s.holds_product(key))
            }
        }
    }
}
