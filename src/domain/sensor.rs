// ==========================================
// 开放制造模型 (OMM) - 传感器
// ==========================================
// 说明: 编排核心只保存传感器描述并转发读数
// 读数是否越限属于上层监控职责,此处不做校验
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank};
use crate::domain::types::new_entity_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub sensor_type: String, // 温度/压力/振动...
    pub unit: String,
    pub min_range: f64,
    pub max_range: f64,
    pub accuracy: f64,
    pub sampling_rate_hz: f64,
    pub alert_low: Option<f64>,
    pub alert_high: Option<f64>,
}

impl Sensor {
    pub fn new(
        name: &str,
        sensor_type: &str,
        unit: &str,
        min_range: f64,
        max_range: f64,
    ) -> OmmResult<Self> {
        let sensor = Self {
            id: new_entity_id(),
            name: name.to_string(),
            sensor_type: sensor_type.to_string(),
            unit: unit.to_string(),
            min_range,
            max_range,
            accuracy: 0.0,
            sampling_rate_hz: 1.0,
            alert_low: None,
            alert_high: None,
        };
        sensor.validate()?;
        Ok(sensor)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_alert_bounds(mut self, low: Option<f64>, high: Option<f64>) -> OmmResult<Self> {
        self.alert_low = low;
        self.alert_high = high;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("sensor.id", &self.id)?;
        ensure_not_blank("sensor.name", &self.name)?;
        ensure_non_negative("sensor.accuracy", self.accuracy)?;
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(OmmError::validation(format!(
                "传感器 {} 采样频率必须为正数",
                self.id
            )));
        }
        if self.min_range > self.max_range {
            return Err(OmmError::validation(format!(
                "传感器 {} 量程下限大于上限",
                self.id
            )));
        }
        Ok(())
    }
}

/// 传感器读数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

// ==========================================
// Trait: SensorReader
// ==========================================
// 外部协作方: 同步、瞬时的读数来源（硬件/仿真/回放）
pub trait SensorReader: Send + Sync {
    /// 读取当前值
    fn read(&self, sensor: &Sensor) -> OmmResult<SensorReading>;
}
