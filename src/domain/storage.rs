// ==========================================
// 开放制造模型 (OMM) - 仓储台账
// ==========================================
// 仓储 = 地点 + 物料台账 (id → 零件|产品) + 体积容量
// 不变量: current_capacity == Σ 条目占用体积 ≤ max_capacity
// 失败的变更不生效,台账保持原状态
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::location::Location;
use crate::domain::mapping::{ensure_non_negative, EntityMapping};
use crate::domain::part::{Part, PartVolumeMode};
use crate::domain::product::Product;
use crate::domain::types::{LocationType, StorageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 容差（浮点累加误差）
const CAPACITY_EPSILON: f64 = 1e-9;

/// 台账条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoredItem {
    Part(Part),
    Product(Product),
}

/// 条目类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Part,
    Product,
}

impl StoredItem {
    pub fn id(&self) -> &str {
        match self {
            StoredItem::Part(part) => &part.id,
            StoredItem::Product(product) => &product.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StoredItem::Part(part) => &part.name,
            StoredItem::Product(product) => &product.name,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            StoredItem::Part(_) => ItemKind::Part,
            StoredItem::Product(_) => ItemKind::Product,
        }
    }

    /// 占用体积
    pub fn footprint(&self, mode: PartVolumeMode) -> f64 {
        match self {
            StoredItem::Part(part) => part.footprint(mode),
            StoredItem::Product(product) => product.volume(),
        }
    }

    fn validate(&self) -> OmmResult<()> {
        match self {
            StoredItem::Part(part) => part.validate(),
            StoredItem::Product(product) => product.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub location: Location,
    pub storage_type: StorageType,
    max_capacity: f64,
    current_capacity: f64,
    items: BTreeMap<String, StoredItem>,
    volume_mode: PartVolumeMode,
}

impl Storage {
    pub fn new(name: &str, storage_type: StorageType, max_capacity: f64) -> OmmResult<Self> {
        ensure_non_negative("storage.max_capacity", max_capacity)?;
        Ok(Self {
            location: Location::new(name, LocationType::Internal)?,
            storage_type,
            max_capacity,
            current_capacity: 0.0,
            items: BTreeMap::new(),
            volume_mode: PartVolumeMode::default(),
        })
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.location.id = id.to_string();
        self
    }

    /// 设置零件体积计量方式（仅限空仓储）
    pub fn with_volume_mode(mut self, mode: PartVolumeMode) -> OmmResult<Self> {
        if !self.items.is_empty() {
            return Err(OmmError::validation(format!(
                "仓储 {} 非空, 不能切换体积计量方式",
                self.id()
            )));
        }
        self.volume_mode = mode;
        Ok(self)
    }

    // ===== 访问器 =====

    pub fn id(&self) -> &str {
        &self.location.id
    }

    pub fn name(&self) -> &str {
        &self.location.name
    }

    pub fn max_capacity(&self) -> f64 {
        self.max_capacity
    }

    pub fn current_capacity(&self) -> f64 {
        self.current_capacity
    }

    pub fn volume_mode(&self) -> PartVolumeMode {
        self.volume_mode
    }

    pub fn available_capacity(&self) -> f64 {
        (self.max_capacity - self.current_capacity).max(0.0)
    }

    /// 利用率 (%)
    pub fn utilization(&self) -> f64 {
        if self.max_capacity <= 0.0 {
            return 0.0;
        }
        self.current_capacity / self.max_capacity * 100.0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    // ==========================================
    // 台账操作
    // ==========================================

    /// 入库
    ///
    /// # 错误
    /// - `AlreadyExists`: 同 id 条目已在台账中
    /// - `CapacityExceeded`: 入库后体积超过上限
    pub fn add_item(&mut self, item: StoredItem) -> OmmResult<()> {
        item.validate()?;
        if self.items.contains_key(item.id()) {
            return Err(OmmError::already_exists("StoredItem", item.id()));
        }
        let footprint = item.footprint(self.volume_mode);
        self.ensure_fits(footprint)?;

        self.items.insert(item.id().to_string(), item);
        self.recalculate();
        self.location.touch();
        Ok(())
    }

    pub fn add_part(&mut self, part: Part) -> OmmResult<()> {
        self.add_item(StoredItem::Part(part))
    }

    pub fn add_product(&mut self, product: Product) -> OmmResult<()> {
        self.add_item(StoredItem::Product(product))
    }

    /// 出库
    pub fn remove_item(&mut self, item_id: &str) -> OmmResult<StoredItem> {
        let item = self
            .items
            .remove(item_id)
            .ok_or_else(|| OmmError::not_found("StoredItem", item_id))?;
        self.recalculate();
        self.location.touch();
        Ok(item)
    }

    /// 查询条目（返回副本）
    pub fn get_item(&self, item_id: &str) -> OmmResult<StoredItem> {
        self.items
            .get(item_id)
            .cloned()
            .ok_or_else(|| OmmError::not_found("StoredItem", item_id))
    }

    pub fn list_items(&self) -> Vec<StoredItem> {
        self.items.values().cloned().collect()
    }

    pub fn items_by_kind(&self, kind: ItemKind) -> Vec<StoredItem> {
        self.items
            .values()
            .filter(|item| item.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn parts(&self) -> Vec<Part> {
        self.items
            .values()
            .filter_map(|item| match item {
                StoredItem::Part(part) => Some(part.clone()),
                StoredItem::Product(_) => None,
            })
            .collect()
    }

    /// 指定名称零件的库存总数
    pub fn quantity_of(&self, part_name: &str) -> f64 {
        self.items
            .values()
            .filter_map(|item| match item {
                StoredItem::Part(part) if part.name == part_name => Some(part.quantity()),
                _ => None,
            })
            .sum()
    }

    /// 是否持有指定产品（按 id 或名称）
    pub fn holds_product(&self, id_or_name: &str) -> bool {
        self.items.values().any(|item| match item {
            StoredItem::Product(product) => product.id == id_or_name || product.name == id_or_name,
            StoredItem::Part(_) => false,
        })
    }

    /// 调整零件数量,保持体积不变量
    pub fn adjust_part_quantity(&mut self, part_id: &str, delta: f64) -> OmmResult<f64> {
        let current = match self.items.get(part_id) {
            Some(StoredItem::Part(part)) => part.clone(),
            Some(StoredItem::Product(_)) => {
                return Err(OmmError::validation(format!(
                    "条目 {} 不是零件",
                    part_id
                )))
            }
            None => return Err(OmmError::not_found("Part", part_id)),
        };

        let mut adjusted = current.clone();
        let quantity = adjusted.adjust_quantity(delta)?;
        let growth = adjusted.footprint(self.volume_mode) - current.footprint(self.volume_mode);
        if growth > 0.0 {
            self.ensure_fits(growth)?;
        }

        self.items
            .insert(part_id.to_string(), StoredItem::Part(adjusted));
        self.recalculate();
        self.location.touch();
        Ok(quantity)
    }

    fn ensure_fits(&self, footprint: f64) -> OmmResult<()> {
        if self.current_capacity + footprint > self.max_capacity + CAPACITY_EPSILON {
            return Err(OmmError::CapacityExceeded {
                entity: "Storage".to_string(),
                id: self.id().to_string(),
                requested: footprint,
                available: self.available_capacity(),
            });
        }
        Ok(())
    }

    /// 按条目重新汇总体积（避免增减累积误差）
    fn recalculate(&mut self) {
        let mode = self.volume_mode;
        self.current_capacity = self.items.values().map(|item| item.footprint(mode)).sum();
    }
}

impl EntityMapping for Storage {
    const ENTITY: &'static str = "Storage";

    fn validate(&self) -> OmmResult<()> {
        self.location.validate()?;
        ensure_non_negative("storage.max_capacity", self.max_capacity)?;
        let mut total = 0.0;
        for (id, item) in &self.items {
            if id != item.id() {
                return Err(OmmError::validation(format!(
                    "台账索引键 {} 与条目 id {} 不一致",
                    id,
                    item.id()
                )));
            }
            item.validate()?;
            total += item.footprint(self.volume_mode);
        }
        if (total - self.current_capacity).abs() > CAPACITY_EPSILON {
            return Err(OmmError::validation(format!(
                "仓储 {} 当前容量 {} 与条目体积之和 {} 不一致",
                self.id(),
                self.current_capacity,
                total
            )));
        }
        if total > self.max_capacity + CAPACITY_EPSILON {
            return Err(OmmError::validation(format!(
                "仓储 {} 条目体积 {} 超过上限 {}",
                self.id(),
                total,
                self.max_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PartType;

    fn bolt(id: &str, quantity: f64, volume: f64) -> Part {
        Part::new("Bolt", PartType::PurchasedComponent, quantity, volume, 0.1)
            .unwrap()
            .with_id(id)
    }

    #[test]
    fn test_add_and_remove_keep_volume_in_sync() {
        let mut storage = Storage::new("Rack A", StorageType::Rack, 2.0).unwrap();
        storage.add_part(bolt("B-1", 10.0, 0.5)).unwrap();
        storage.add_part(bolt("B-2", 5.0, 1.0)).unwrap();
        assert_eq!(storage.current_capacity(), 1.5);

        let err = storage.add_part(bolt("B-3", 1.0, 0.6)).unwrap_err();
        assert!(matches!(err, OmmError::CapacityExceeded { .. }));
        assert_eq!(storage.len(), 2);

        storage.remove_item("B-1").unwrap();
        assert_eq!(storage.current_capacity(), 1.0);
        assert_eq!(storage.quantity_of("Bolt"), 5.0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut storage = Storage::new("Bin", StorageType::General, 10.0).unwrap();
        storage.add_part(bolt("B-1", 1.0, 0.1)).unwrap();
        let err = storage.add_part(bolt("B-1", 1.0, 0.1)).unwrap_err();
        assert!(matches!(err, OmmError::AlreadyExists { .. }));
        assert!((storage.current_capacity() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_per_unit_mode_tracks_quantity() {
        let mut storage = Storage::new("Buffer", StorageType::Buffer, 3.0)
            .unwrap()
            .with_volume_mode(PartVolumeMode::PerUnit)
            .unwrap();
        storage.add_part(bolt("B-1", 4.0, 0.5)).unwrap();
        assert_eq!(storage.current_capacity(), 2.0);

        let err = storage.adjust_part_quantity("B-1", 4.0).unwrap_err();
        assert!(matches!(err, OmmError::CapacityExceeded { .. }));
        assert_eq!(storage.current_capacity(), 2.0);

        storage.adjust_part_quantity("B-1", -2.0).unwrap();
        assert_eq!(storage.current_capacity(), 1.0);
        assert!(storage.with_volume_mode(PartVolumeMode::PerBatch).is_err());
    }
}
