// ==========================================
// 开放制造模型 (OMM) - 工序需求
// ==========================================
// Requirement = (kind, specs)
// - Part: [名称] 或 [名称, 数量]
// - Product: [] 或 [id/名称]
// - Worker / 资源类: [] 表示任意, 否则为文本规格列表
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::types::RequirementKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 需求规格取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Number(f64),
    Text(String),
}

impl SpecValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SpecValue::Text(text) => Some(text),
            SpecValue::Number(_) => None,
        }
    }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecValue::Number(n) => write!(f, "{}", n),
            SpecValue::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<&str> for SpecValue {
    fn from(value: &str) -> Self {
        SpecValue::Text(value.to_string())
    }
}

impl From<f64> for SpecValue {
    fn from(value: f64) -> Self {
        SpecValue::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub specs: Vec<SpecValue>,
}

impl Requirement {
    pub fn new(kind: RequirementKind, specs: Vec<SpecValue>) -> OmmResult<Self> {
        let requirement = Self { kind, specs };
        requirement.validate()?;
        Ok(requirement)
    }

    /// 从字符串类型构造（未知类型返回 ValidationError）
    pub fn parse(kind: &str, specs: Vec<SpecValue>) -> OmmResult<Self> {
        let kind = RequirementKind::parse(kind)
            .ok_or_else(|| OmmError::validation(format!("未知需求类型: {}", kind)))?;
        Self::new(kind, specs)
    }

    pub fn worker(roles: &[&str]) -> OmmResult<Self> {
        Self::new(
            RequirementKind::Worker,
            roles.iter().map(|r| SpecValue::from(*r)).collect(),
        )
    }

    pub fn part(name: &str, quantity: Option<f64>) -> OmmResult<Self> {
        let mut specs = vec![SpecValue::from(name)];
        if let Some(q) = quantity {
            specs.push(SpecValue::Number(q));
        }
        Self::new(RequirementKind::Part, specs)
    }

    pub fn resource(kind: RequirementKind, specs: &[&str]) -> OmmResult<Self> {
        Self::new(kind, specs.iter().map(|s| SpecValue::from(*s)).collect())
    }

    pub fn validate(&self) -> OmmResult<()> {
        match self.kind {
            RequirementKind::Part => {
                let name = self.specs.first().and_then(SpecValue::as_text);
                if name.map_or(true, |n| n.trim().is_empty()) {
                    return Err(OmmError::validation("零件需求必须以零件名称开头"));
                }
                match self.specs.get(1) {
                    None => {}
                    Some(SpecValue::Number(q)) if q.is_finite() && *q >= 0.0 => {}
                    Some(SpecValue::Number(q)) => {
                        return Err(OmmError::validation(format!(
                            "零件需求数量不能为负: {}",
                            q
                        )))
                    }
                    Some(SpecValue::Text(_)) => {
                        return Err(OmmError::validation("零件需求数量必须为数值"))
                    }
                }
                if self.specs.len() > 2 {
                    return Err(OmmError::validation("零件需求最多包含名称与数量两项"));
                }
            }
            RequirementKind::Product => {
                if self.specs.len() > 1 || self.specs.iter().any(|s| s.as_text().is_none()) {
                    return Err(OmmError::validation("产品需求至多包含一个文本规格"));
                }
            }
            _ => {
                if self.specs.iter().any(|s| s.as_text().is_none()) {
                    return Err(OmmError::validation(format!(
                        "{} 需求规格必须为文本",
                        self.kind.label()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 文本规格列表
    pub fn text_specs(&self) -> Vec<String> {
        self.specs
            .iter()
            .filter_map(|s| s.as_text().map(str::to_string))
            .collect()
    }

    /// 零件需求: (名称, 数量)
    pub fn part_request(&self) -> Option<(&str, Option<f64>)> {
        if self.kind != RequirementKind::Part {
            return None;
        }
        let name = self.specs.first()?.as_text()?;
        let quantity = match self.specs.get(1) {
            Some(SpecValue::Number(q)) => Some(*q),
            _ => None,
        };
        Some((name, quantity))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((name, Some(quantity))) = self.part_request() {
            return write!(f, "{}: {} x {}", self.kind.label(), name, quantity);
        }
        if self.specs.is_empty() {
            return write!(f, "{}: any", self.kind.label());
        }
        let specs: Vec<String> = self.specs.iter().map(|s| s.to_string()).collect();
        write!(f, "{}: {}", self.kind.label(), specs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_missing_report_format() {
        assert_eq!(Requirement::worker(&["Assembler"]).unwrap().to_string(), "Worker: Assembler");
        assert_eq!(Requirement::worker(&[]).unwrap().to_string(), "Worker: any");
        assert_eq!(Requirement::part("Bolt", Some(4.0)).unwrap().to_string(), "Part: Bolt x 4");
    }

    #[test]
    fn test_malformed_requirements_rejected() {
        assert!(Requirement::part("Bolt", Some(-1.0)).is_err());
        assert!(Requirement::new(RequirementKind::Part, vec![]).is_err());
        assert!(Requirement::new(RequirementKind::Worker, vec![SpecValue::Number(1.0)]).is_err());
        assert!(Requirement::parse("Teleporter", vec![]).is_err());
        assert!(Requirement::parse("robotic_arm", vec!["SCARA".into()]).is_ok());
    }

    #[test]
    fn test_untagged_specs_deserialize() {
        let req: Requirement =
            serde_json::from_str(r#"{"kind":"PART","specs":["Steel Plate",5]}"#).unwrap();
        assert_eq!(req.part_request(), Some(("Steel Plate", Some(5.0))));
    }
}
