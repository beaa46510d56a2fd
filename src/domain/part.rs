// ==========================================
// 开放制造模型 (OMM) - 零件
// ==========================================
// 零件: 数量、体积、生产状态、单价、最低库存
// 约束: 数量/体积/单价/最低库存均为非负数
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, EntityMapping};
use crate::domain::types::{new_entity_id, PartType, ProductionState};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 零件在仓储中的体积计量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartVolumeMode {
    /// `volume` 表示整批体积
    PerBatch,
    /// `volume` 表示单件体积,占用 = volume × quantity
    PerUnit,
}

impl PartVolumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartVolumeMode::PerBatch => "PER_BATCH",
            PartVolumeMode::PerUnit => "PER_UNIT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PER_BATCH" => Some(PartVolumeMode::PerBatch),
            "PER_UNIT" => Some(PartVolumeMode::PerUnit),
            _ => None,
        }
    }
}

impl Default for PartVolumeMode {
    fn default() -> Self {
        PartVolumeMode::PerBatch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub part_type: PartType,
    quantity: f64,
    volume: f64,
    cost: f64,
    min_stock_level: f64,
    state: ProductionState,
    pub supplier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Part {
    /// 创建零件
    ///
    /// 外购件初始状态为 FINISHED, 在制品为 WORK_IN_PROGRESS, 原材料为 RAW
    pub fn new(
        name: &str,
        part_type: PartType,
        quantity: f64,
        volume: f64,
        cost: f64,
    ) -> OmmResult<Self> {
        let state = match part_type {
            PartType::RawMaterial => ProductionState::Raw,
            PartType::PurchasedComponent => ProductionState::Finished,
            PartType::WorkInProgress => ProductionState::WorkInProgress,
        };
        let now = Utc::now();
        let part = Self {
            id: new_entity_id(),
            name: name.to_string(),
            part_type,
            quantity,
            volume,
            cost,
            min_stock_level: 0.0,
            state,
            supplier: None,
            created_at: now,
            updated_at: now,
        };
        part.validate()?;
        Ok(part)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_min_stock_level(mut self, level: f64) -> OmmResult<Self> {
        ensure_non_negative("part.min_stock_level", level)?;
        self.min_stock_level = level;
        Ok(self)
    }

    pub fn with_supplier(mut self, supplier: &str) -> Self {
        self.supplier = Some(supplier.to_string());
        self
    }

    // ===== 访问器 =====

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn min_stock_level(&self) -> f64 {
        self.min_stock_level
    }

    pub fn state(&self) -> ProductionState {
        self.state
    }

    /// 仓储占用体积
    pub fn footprint(&self, mode: PartVolumeMode) -> f64 {
        match mode {
            PartVolumeMode::PerBatch => self.volume,
            PartVolumeMode::PerUnit => self.volume * self.quantity,
        }
    }

    /// 调整数量（结果不得为负）
    pub fn adjust_quantity(&mut self, delta: f64) -> OmmResult<f64> {
        let next = self.quantity + delta;
        if !next.is_finite() || next < 0.0 {
            return Err(OmmError::validation(format!(
                "零件 {} 数量不足: 当前={}, 调整={}",
                self.id, self.quantity, delta
            )));
        }
        self.quantity = next;
        self.touch();
        Ok(next)
    }

    pub fn set_cost(&mut self, cost: f64) -> OmmResult<()> {
        ensure_non_negative("part.cost", cost)?;
        self.cost = cost;
        self.touch();
        Ok(())
    }

    pub fn set_min_stock_level(&mut self, level: f64) -> OmmResult<()> {
        ensure_non_negative("part.min_stock_level", level)?;
        self.min_stock_level = level;
        self.touch();
        Ok(())
    }

    /// 是否低于最低库存（告警由调用方负责）
    pub fn is_below_min_stock(&self) -> bool {
        self.quantity < self.min_stock_level
    }

    /// 库存价值 = 数量 × 单价
    pub fn calculate_value(&self) -> f64 {
        self.quantity * self.cost
    }

    /// 生产状态转换
    pub fn transition_state(&mut self, to: ProductionState) -> OmmResult<()> {
        self.state = self.state.transition(to)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Part {
    const ENTITY: &'static str = "Part";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("part.id", &self.id)?;
        ensure_not_blank("part.name", &self.name)?;
        ensure_non_negative("part.quantity", self.quantity)?;
        ensure_non_negative("part.volume", self.volume)?;
        ensure_non_negative("part.cost", self.cost)?;
        ensure_non_negative("part.min_stock_level", self.min_stock_level)
    }
}
