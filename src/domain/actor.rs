// ==========================================
// 开放制造模型 (OMM) - 参与方 / 工人
// ==========================================
// Actor: 干系人,关联若干地点
// Worker: Actor + 角色 → 授权能力/资源类型标签
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_not_blank, EntityMapping};
use crate::domain::resource::Resource;
use crate::domain::types::new_entity_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 工人档案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub roles: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorKind {
    Stakeholder,
    Worker(WorkerProfile),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    location_ids: BTreeSet<String>,
    kind: ActorKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    pub fn stakeholder(name: &str) -> OmmResult<Self> {
        Self::build(name, ActorKind::Stakeholder)
    }

    pub fn worker(name: &str) -> OmmResult<Self> {
        Self::build(name, ActorKind::Worker(WorkerProfile::default()))
    }

    fn build(name: &str, kind: ActorKind) -> OmmResult<Self> {
        ensure_not_blank("actor.name", name)?;
        let now = Utc::now();
        Ok(Self {
            id: new_entity_id(),
            name: name.to_string(),
            contact: None,
            location_ids: BTreeSet::new(),
            kind,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// 链式添加角色（测试/构建用）
    pub fn with_role(mut self, role: &str, tags: &[&str]) -> OmmResult<Self> {
        self.add_role(role, tags.iter().map(|t| t.to_string()).collect())?;
        Ok(self)
    }

    pub fn kind(&self) -> &ActorKind {
        &self.kind
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.kind, ActorKind::Worker(_))
    }

    // ===== 地点 =====

    pub fn add_location(&mut self, location_id: &str) -> OmmResult<()> {
        if !self.location_ids.insert(location_id.to_string()) {
            return Err(OmmError::already_exists("ActorLocation", location_id));
        }
        self.touch();
        Ok(())
    }

    pub fn remove_location(&mut self, location_id: &str) -> OmmResult<()> {
        if !self.location_ids.remove(location_id) {
            return Err(OmmError::not_found("ActorLocation", location_id));
        }
        self.touch();
        Ok(())
    }

    pub fn locations(&self) -> Vec<String> {
        self.location_ids.iter().cloned().collect()
    }

    pub fn is_at(&self, location_id: &str) -> bool {
        self.location_ids.contains(location_id)
    }

    // ==========================================
    // 角色（仅工人）
    // ==========================================

    /// 添加角色,已存在时合并授权标签
    pub fn add_role(&mut self, role: &str, tags: BTreeSet<String>) -> OmmResult<()> {
        ensure_not_blank("worker.role", role)?;
        let id = self.id.clone();
        let profile = self.profile_mut()?;
        profile.roles.entry(role.to_string()).or_default().extend(tags);
        tracing::debug!(actor_id = %id, role, "工人角色已更新");
        self.touch();
        Ok(())
    }

    pub fn remove_role(&mut self, role: &str) -> OmmResult<BTreeSet<String>> {
        let profile = self.profile_mut()?;
        let tags = profile
            .roles
            .remove(role)
            .ok_or_else(|| OmmError::not_found("WorkerRole", role))?;
        self.touch();
        Ok(tags)
    }

    /// 角色映射副本（非工人为空）
    pub fn roles(&self) -> BTreeMap<String, BTreeSet<String>> {
        match &self.kind {
            ActorKind::Worker(profile) => profile.roles.clone(),
            ActorKind::Stakeholder => BTreeMap::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        match &self.kind {
            ActorKind::Worker(profile) => profile.roles.contains_key(role),
            ActorKind::Stakeholder => false,
        }
    }

    /// 角色名或任一授权标签与给定规格相交
    pub fn covers_any(&self, specs: &[String]) -> bool {
        let ActorKind::Worker(profile) = &self.kind else {
            return false;
        };
        profile.roles.iter().any(|(role, tags)| {
            specs.iter().any(|spec| {
                role.eq_ignore_ascii_case(spec) || tags.iter().any(|t| t.eq_ignore_ascii_case(spec))
            })
        })
    }

    /// 是否有权操作该资源（标签匹配资源类型、型号或能力）
    pub fn can_work_with(&self, resource: &Resource) -> bool {
        let ActorKind::Worker(profile) = &self.kind else {
            return false;
        };
        let resource_type = resource.resource_type();
        profile.roles.values().flatten().any(|tag| {
            resource_type.as_str().eq_ignore_ascii_case(tag) || resource.matches_spec(tag)
        })
    }

    fn profile_mut(&mut self) -> OmmResult<&mut WorkerProfile> {
        match &mut self.kind {
            ActorKind::Worker(profile) => Ok(profile),
            ActorKind::Stakeholder => Err(OmmError::validation(format!(
                "参与方 {} 不是工人, 不能分配角色",
                self.id
            ))),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Actor {
    const ENTITY: &'static str = "Actor";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("actor.id", &self.id)?;
        ensure_not_blank("actor.name", &self.name)?;
        if let ActorKind::Worker(profile) = &self.kind {
            for role in profile.roles.keys() {
                ensure_not_blank("worker.role", role)?;
            }
        }
        Ok(())
    }
}
