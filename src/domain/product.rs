// ==========================================
// 开放制造模型 (OMM) - 产品
// ==========================================
// 产品: 物料清单 (part_id → 数量)、工序列表、生产状态、交期
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, EntityMapping};
use crate::domain::part::Part;
use crate::domain::types::{new_entity_id, ProductionState};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    bill_of_materials: BTreeMap<String, f64>,
    action_ids: Vec<String>,
    state: ProductionState,
    volume: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 创建产品（交期不得早于当前时间）
    pub fn new(name: &str, due_date: Option<DateTime<Utc>>) -> OmmResult<Self> {
        let now = Utc::now();
        if let Some(due) = due_date {
            if due < now {
                return Err(OmmError::validation(format!(
                    "产品 {} 的交期 {} 早于当前时间",
                    name,
                    due.to_rfc3339()
                )));
            }
        }
        let product = Self {
            id: new_entity_id(),
            name: name.to_string(),
            description: None,
            bill_of_materials: BTreeMap::new(),
            action_ids: Vec::new(),
            state: ProductionState::New,
            volume: 0.0,
            due_date,
            customer_id: None,
            created_at: now,
            updated_at: now,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_volume(mut self, volume: f64) -> OmmResult<Self> {
        ensure_non_negative("product.volume", volume)?;
        self.volume = volume;
        Ok(self)
    }

    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn state(&self) -> ProductionState {
        self.state
    }

    // ==========================================
    // 物料清单
    // ==========================================

    /// 添加 BOM 行（同一零件重复添加被拒绝）
    pub fn add_bom_line(&mut self, part_id: &str, quantity: f64) -> OmmResult<()> {
        ensure_bom_quantity(quantity)?;
        if self.bill_of_materials.contains_key(part_id) {
            return Err(OmmError::already_exists("BomLine", part_id));
        }
        self.bill_of_materials.insert(part_id.to_string(), quantity);
        self.touch();
        Ok(())
    }

    pub fn update_bom_quantity(&mut self, part_id: &str, quantity: f64) -> OmmResult<()> {
        ensure_bom_quantity(quantity)?;
        let line = self
            .bill_of_materials
            .get_mut(part_id)
            .ok_or_else(|| OmmError::not_found("BomLine", part_id))?;
        *line = quantity;
        self.touch();
        Ok(())
    }

    pub fn remove_bom_line(&mut self, part_id: &str) -> OmmResult<f64> {
        let quantity = self
            .bill_of_materials
            .remove(part_id)
            .ok_or_else(|| OmmError::not_found("BomLine", part_id))?;
        self.touch();
        Ok(quantity)
    }

    pub fn bill_of_materials(&self) -> BTreeMap<String, f64> {
        self.bill_of_materials.clone()
    }

    /// 按零件目录计算物料总成本
    pub fn calculate_total_cost(&self, catalogue: &BTreeMap<String, Part>) -> OmmResult<f64> {
        self.bill_of_materials
            .iter()
            .map(|(part_id, quantity)| {
                catalogue
                    .get(part_id)
                    .map(|part| part.cost() * quantity)
                    .ok_or_else(|| OmmError::not_found("Part", part_id))
            })
            .sum()
    }

    // ==========================================
    // 工序关联（顺序由编排器按 sequence 维护）
    // ==========================================

    pub(crate) fn attach_action(&mut self, action_id: &str) -> OmmResult<()> {
        if self.action_ids.iter().any(|id| id == action_id) {
            return Err(OmmError::already_exists("ProductAction", action_id));
        }
        self.action_ids.push(action_id.to_string());
        self.touch();
        Ok(())
    }

    pub(crate) fn detach_action(&mut self, action_id: &str) -> OmmResult<()> {
        let index = self
            .action_ids
            .iter()
            .position(|id| id == action_id)
            .ok_or_else(|| OmmError::not_found("ProductAction", action_id))?;
        self.action_ids.remove(index);
        self.touch();
        Ok(())
    }

    pub(crate) fn set_action_order(&mut self, ordered: Vec<String>) {
        self.action_ids = ordered;
    }

    pub fn action_ids(&self) -> Vec<String> {
        self.action_ids.clone()
    }

    pub fn transition_state(&mut self, to: ProductionState) -> OmmResult<()> {
        self.state = self.state.transition(to)?;
        self.touch();
        Ok(())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => now > due && self.state != ProductionState::Finished,
            None => false,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn ensure_bom_quantity(quantity: f64) -> OmmResult<()> {
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(OmmError::validation(format!(
            "BOM 数量必须为正数, 实际={}",
            quantity
        )));
    }
    Ok(())
}

impl EntityMapping for Product {
    const ENTITY: &'static str = "Product";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("product.id", &self.id)?;
        ensure_not_blank("product.name", &self.name)?;
        ensure_non_negative("product.volume", self.volume)?;
        for quantity in self.bill_of_materials.values() {
            ensure_bom_quantity(*quantity)?;
        }
        Ok(())
    }
}
