// ==========================================
// 开放制造模型 (OMM) - 地点
// ==========================================
// 地点: 命名的点位/区域,厂内或厂外
// 地点上的工人/工序关系由编排器关系索引维护
// ==========================================

use crate::domain::constraint::{Constraint, ConstraintSet};
use crate::domain::error::OmmResult;
use crate::domain::mapping::{ensure_not_blank, EntityMapping};
use crate::domain::types::{new_entity_id, LocationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 三维坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 欧氏距离
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 折线总长度
pub fn path_length(points: &[Position]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub location_type: LocationType,
    pub position: Option<Position>,
    pub address: Option<String>,
    constraints: ConstraintSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    pub fn new(name: &str, location_type: LocationType) -> OmmResult<Self> {
        ensure_not_blank("location.name", name)?;
        let now = Utc::now();
        Ok(Self {
            id: new_entity_id(),
            name: name.to_string(),
            location_type,
            position: None,
            address: None,
            constraints: ConstraintSet::default(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> OmmResult<()> {
        self.constraints.add(constraint)?;
        self.touch();
        Ok(())
    }

    pub fn remove_constraint(&mut self, name: &str) -> OmmResult<Constraint> {
        let removed = self.constraints.remove(name)?;
        self.touch();
        Ok(removed)
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.constraints.list()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Location {
    const ENTITY: &'static str = "Location";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("location.id", &self.id)?;
        ensure_not_blank("location.name", &self.name)?;
        self.constraints.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_length_sums_segments() {
        let points = [
            Position::new(0.0, 0.0, 0.0),
            Position::new(3.0, 4.0, 0.0),
            Position::new(3.0, 4.0, 2.0),
        ];
        assert!((path_length(&points) - 7.0).abs() < 1e-9);
        assert_eq!(path_length(&points[..1]), 0.0);
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(Location::new(" ", LocationType::Internal).is_err());
    }
}
