// ==========================================
// 开放制造模型 (OMM) - 路线
// ==========================================
// 路线: 有序路径点 (≥2) + 长度,连接地点/资源
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::location::{path_length, Position};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, EntityMapping};
use crate::domain::types::new_entity_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    waypoints: Vec<Position>,
    length: f64,
    /// 途经的地点/资源 id
    stops: Vec<String>,
    actor_ids: BTreeSet<String>,
}

impl Route {
    /// 按路径点创建,长度取折线长度
    pub fn new(name: &str, waypoints: Vec<Position>) -> OmmResult<Self> {
        let length = path_length(&waypoints);
        let route = Self {
            id: new_entity_id(),
            name: name.to_string(),
            waypoints,
            length,
            stops: Vec::new(),
            actor_ids: BTreeSet::new(),
        };
        route.validate()?;
        Ok(route)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// 覆盖长度（实际行驶距离可能大于直线折线）
    pub fn with_length(mut self, length: f64) -> OmmResult<Self> {
        ensure_non_negative("route.length", length)?;
        self.length = length;
        Ok(self)
    }

    pub fn with_stops(mut self, stops: &[&str]) -> Self {
        self.stops = stops.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn waypoints(&self) -> Vec<Position> {
        self.waypoints.clone()
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.clone()
    }

    pub fn start(&self) -> Option<Position> {
        self.waypoints.first().copied()
    }

    pub fn end(&self) -> Option<Position> {
        self.waypoints.last().copied()
    }

    pub fn add_actor(&mut self, actor_id: &str) -> OmmResult<()> {
        if !self.actor_ids.insert(actor_id.to_string()) {
            return Err(OmmError::already_exists("RouteActor", actor_id));
        }
        Ok(())
    }

    pub fn remove_actor(&mut self, actor_id: &str) -> OmmResult<()> {
        if !self.actor_ids.remove(actor_id) {
            return Err(OmmError::not_found("RouteActor", actor_id));
        }
        Ok(())
    }

    pub fn actors(&self) -> Vec<String> {
        self.actor_ids.iter().cloned().collect()
    }
}

impl EntityMapping for Route {
    const ENTITY: &'static str = "Route";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("route.id", &self.id)?;
        ensure_not_blank("route.name", &self.name)?;
        if self.waypoints.len() < 2 {
            return Err(OmmError::validation(format!(
                "路线 {} 至少需要两个路径点",
                self.name
            )));
        }
        if self.waypoints.iter().any(|p| !p.is_finite()) {
            return Err(OmmError::validation("路线包含非法坐标"));
        }
        ensure_non_negative("route.length", self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_needs_two_waypoints() {
        assert!(Route::new("Stub", vec![Position::default()]).is_err());
        let route = Route::new(
            "Dock to Line",
            vec![Position::new(0.0, 0.0, 0.0), Position::new(0.0, 12.0, 0.0)],
        )
        .unwrap();
        assert_eq!(route.length(), 12.0);
        assert!(route.clone().with_length(-1.0).is_err());
    }
}
