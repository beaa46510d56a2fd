// ==========================================
// 开放制造模型 (OMM) - 跨仓储库存操作
// ==========================================
// 职责: 跨仓储汇总、低库存查询、移库、零件扣减
// 说明: 单仓储台账不变量由 Storage 自身维护
// 低库存只返回列表,告警由调用方处理
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::storage::{Storage, StoredItem};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// 低库存条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockShortage {
    pub storage_id: String,
    pub part_id: String,
    pub part_name: String,
    pub quantity: f64,
    pub min_stock_level: f64,
}

/// 扣减明细
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Withdrawal {
    pub storage_id: String,
    pub part_id: String,
    pub quantity: f64,
}

pub struct InventoryLedger;

impl InventoryLedger {
    /// 指定名称零件在全部仓储中的数量
    pub fn total_quantity(storages: &BTreeMap<String, Storage>, part_name: &str) -> f64 {
        storages.values().map(|s| s.quantity_of(part_name)).sum()
    }

    /// 低于最低库存的零件
    pub fn parts_below_min_stock(storages: &BTreeMap<String, Storage>) -> Vec<StockShortage> {
        storages
            .values()
            .flat_map(|storage| {
                storage
                    .parts()
                    .into_iter()
                    .filter(|part| part.is_below_min_stock())
                    .map(move |part| StockShortage {
                        storage_id: storage.id().to_string(),
                        part_id: part.id.clone(),
                        part_name: part.name.clone(),
                        quantity: part.quantity(),
                        min_stock_level: part.min_stock_level(),
                    })
            })
            .collect()
    }

    /// 移库（目标拒收时回滚到源仓储）
    pub fn transfer_item(
        storages: &mut BTreeMap<String, Storage>,
        from_id: &str,
        to_id: &str,
        item_id: &str,
    ) -> OmmResult<()> {
        if from_id == to_id {
            return Err(OmmError::validation("移库源仓储与目标仓储相同"));
        }
        if !storages.contains_key(to_id) {
            return Err(OmmError::not_found("Storage", to_id));
        }

        let item = storages
            .get_mut(from_id)
            .ok_or_else(|| OmmError::not_found("Storage", from_id))?
            .remove_item(item_id)?;

        let placed = match storages.get_mut(to_id) {
            Some(target) => target.add_item(item.clone()),
            None => Err(OmmError::not_found("Storage", to_id)),
        };

        if let Err(err) = placed {
            warn!(from_id, to_id, item_id, error = %err, "移库失败, 回滚到源仓储");
            Self::restore(storages, from_id, item)?;
            return Err(err);
        }

        info!(from_id, to_id, item_id, "移库完成");
        Ok(())
    }

    /// 扣减零件（需求检查通过后的提交阶段）
    ///
    /// 按仓储 id、零件 id 顺序依次扣减;总量不足时不做任何修改
    pub fn withdraw_part(
        storages: &mut BTreeMap<String, Storage>,
        part_name: &str,
        quantity: f64,
    ) -> OmmResult<Vec<Withdrawal>> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(OmmError::validation(format!(
                "扣减数量必须为非负数, 实际={}",
                quantity
            )));
        }
        let available = Self::total_quantity(storages, part_name);
        if available < quantity {
            return Err(OmmError::CapacityExceeded {
                entity: "Inventory".to_string(),
                id: part_name.to_string(),
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        let mut withdrawals = Vec::new();
        for storage in storages.values_mut() {
            if remaining <= 0.0 {
                break;
            }
            let candidates: Vec<(String, f64)> = storage
                .parts()
                .into_iter()
                .filter(|p| p.name == part_name && p.quantity() > 0.0)
                .map(|p| (p.id.clone(), p.quantity()))
                .collect();
            for (part_id, on_hand) in candidates {
                if remaining <= 0.0 {
                    break;
                }
                let take = on_hand.min(remaining);
                storage.adjust_part_quantity(&part_id, -take)?;
                remaining -= take;
                withdrawals.push(Withdrawal {
                    storage_id: storage.id().to_string(),
                    part_id,
                    quantity: take,
                });
            }
        }

        debug!(part_name, quantity, lines = withdrawals.len(), "零件扣减完成");
        Ok(withdrawals)
    }

    fn restore(
        storages: &mut BTreeMap<String, Storage>,
        storage_id: &str,
        item: StoredItem,
    ) -> OmmResult<()> {
        storages
            .get_mut(storage_id)
            .ok_or_else(|| OmmError::not_found("Storage", storage_id))?
            .add_item(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::part::Part;
    use crate::domain::types::{PartType, StorageType};

    fn ledger() -> BTreeMap<String, Storage> {
        let mut big = Storage::new("Warehouse", StorageType::Warehouse, 100.0)
            .unwrap()
            .with_id("S-BIG");
        let mut small = Storage::new("Line buffer", StorageType::Buffer, 1.0)
            .unwrap()
            .with_id("S-SMALL");
        big.add_part(
            Part::new("Bolt", PartType::PurchasedComponent, 6.0, 2.0, 0.1)
                .unwrap()
                .with_id("B-1")
                .with_min_stock_level(10.0)
                .unwrap(),
        )
        .unwrap();
        small
            .add_part(
                Part::new("Bolt", PartType::PurchasedComponent, 3.0, 0.5, 0.1)
                    .unwrap()
                    .with_id("B-2"),
            )
            .unwrap();
        [big, small]
            .into_iter()
            .map(|s| (s.id().to_string(), s))
            .collect()
    }

    #[test]
    fn test_total_and_shortages() {
        let storages = ledger();
        assert_eq!(InventoryLedger::total_quantity(&storages, "Bolt"), 9.0);
        let shortages = InventoryLedger::parts_below_min_stock(&storages);
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].part_id, "B-1");
    }

    #[test]
    fn test_transfer_rolls_back_when_target_full() {
        let mut storages = ledger();
        let err = InventoryLedger::transfer_item(&mut storages, "S-BIG", "S-SMALL", "B-1").unwrap_err();
        assert!(matches!(err, OmmError::CapacityExceeded { .. }));
        assert!(storages["S-BIG"].contains("B-1"));
        assert_eq!(storages["S-BIG"].current_capacity(), 2.0);

        InventoryLedger::transfer_item(&mut storages, "S-SMALL", "S-BIG", "B-2").unwrap();
        assert_eq!(storages["S-BIG"].current_capacity(), 2.5);
        assert!(storages["S-SMALL"].is_empty());
    }

    #[test]
    fn test_withdraw_is_all_or_nothing() {
        let mut storages = ledger();
        assert!(InventoryLedger::withdraw_part(&mut storages, "Bolt", 9.5).is_err());
        assert_eq!(InventoryLedger::total_quantity(&storages, "Bolt"), 9.0);

        let lines = InventoryLedger::withdraw_part(&mut storages, "Bolt", 7.0).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(InventoryLedger::total_quantity(&storages, "Bolt"), 2.0);
    }
}
