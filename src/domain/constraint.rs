// ==========================================
// 开放制造模型 (OMM) - 运行约束
// ==========================================
// 约束: 命名的运行边界（数值区间或布尔开关）,可挂接到任意实体
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::ensure_not_blank;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 约束边界
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bound", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintBound {
    /// 数值区间（任一端可缺省）
    Range { min: Option<f64>, max: Option<f64> },
    /// 布尔开关（要求的取值）
    Flag { required: bool },
}

/// 约束取值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintValue {
    Number(f64),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub bound: ConstraintBound,
    pub description: Option<String>,
}

impl Constraint {
    /// 创建数值区间约束
    pub fn range(name: &str, min: Option<f64>, max: Option<f64>) -> OmmResult<Self> {
        let constraint = Self {
            name: name.to_string(),
            bound: ConstraintBound::Range { min, max },
            description: None,
        };
        constraint.validate()?;
        Ok(constraint)
    }

    /// 创建布尔开关约束
    pub fn flag(name: &str, required: bool) -> OmmResult<Self> {
        let constraint = Self {
            name: name.to_string(),
            bound: ConstraintBound::Flag { required },
            description: None,
        };
        constraint.validate()?;
        Ok(constraint)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("constraint.name", &self.name)?;
        if let ConstraintBound::Range { min, max } = self.bound {
            if min.map_or(false, f64::is_nan) || max.map_or(false, f64::is_nan) {
                return Err(OmmError::validation(format!(
                    "约束 {} 的边界不能为 NaN",
                    self.name
                )));
            }
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(OmmError::validation(format!(
                        "约束 {} 下限 {} 大于上限 {}",
                        self.name, lo, hi
                    )));
                }
            }
        }
        Ok(())
    }

    /// 判断取值是否落在约束内（类型不符视为不满足）
    pub fn admits(&self, value: ConstraintValue) -> bool {
        match (&self.bound, value) {
            (ConstraintBound::Range { min, max }, ConstraintValue::Number(v)) => {
                min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
            }
            (ConstraintBound::Flag { required }, ConstraintValue::Flag(v)) => *required == v,
            _ => false,
        }
    }
}

// ==========================================
// ConstraintSet - 按名称索引的约束集合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    items: BTreeMap<String, Constraint>,
}

impl ConstraintSet {
    /// 添加约束（同名已存在则拒绝）
    pub fn add(&mut self, constraint: Constraint) -> OmmResult<()> {
        constraint.validate()?;
        if self.items.contains_key(&constraint.name) {
            return Err(OmmError::already_exists("Constraint", &constraint.name));
        }
        self.items.insert(constraint.name.clone(), constraint);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> OmmResult<Constraint> {
        self.items
            .remove(name)
            .ok_or_else(|| OmmError::not_found("Constraint", name))
    }

    pub fn get(&self, name: &str) -> Option<&Constraint> {
        self.items.get(name)
    }

    /// 返回约束副本列表
    pub fn list(&self) -> Vec<Constraint> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn validate(&self) -> OmmResult<()> {
        for (name, constraint) in &self.items {
            if name != &constraint.name {
                return Err(OmmError::validation(format!(
                    "约束索引键 {} 与名称 {} 不一致",
                    name, constraint.name
                )));
            }
            constraint.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_admits_inclusive_bounds() {
        let c = Constraint::range("temperature", Some(10.0), Some(40.0)).unwrap();
        assert!(c.admits(ConstraintValue::Number(10.0)));
        assert!(c.admits(ConstraintValue::Number(40.0)));
        assert!(!c.admits(ConstraintValue::Number(40.1)));
        assert!(!c.admits(ConstraintValue::Flag(true)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            Constraint::range("speed", Some(5.0), Some(1.0)),
            Err(OmmError::ValidationError(_))
        ));
    }

    #[test]
    fn test_constraint_set_rejects_duplicates() {
        let mut set = ConstraintSet::default();
        set.add(Constraint::flag("guard_closed", true).unwrap()).unwrap();
        let dup = set.add(Constraint::flag("guard_closed", false).unwrap());
        assert!(matches!(dup, Err(OmmError::AlreadyExists { .. })));
        assert!(matches!(set.remove("missing"), Err(OmmError::NotFound { .. })));
        assert_eq!(set.len(), 1);
    }
}
