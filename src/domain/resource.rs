// ==========================================
// 开放制造模型 (OMM) - 资源
// ==========================================
// 资源 = 通用记录 + 变体标签 (ResourceVariant) + 变体专属字段
// 共享行为（状态转换、容量计数、维护）只实现一次,按标签分派
// 容量:
// - 槽位: 并发占用数 ≤ 槽位上限
// - 体积: 输送线 = 长度 × 每米容量; 车辆 = 载重
// ==========================================

use crate::domain::constraint::{Constraint, ConstraintSet};
use crate::domain::error::{OmmError, OmmResult};
use crate::domain::location::{path_length, Position};
use crate::domain::mapping::{ensure_non_negative, ensure_not_blank, ensure_percentage, EntityMapping};
use crate::domain::sensor::Sensor;
use crate::domain::types::{new_entity_id, ResourceStatus, ResourceType, VehicleType};
use crate::engine::state_machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 输送方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConveyorDirection {
    Forward,
    Reverse,
}

// ==========================================
// ResourceVariant - 变体专属字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceVariant {
    General,
    Machine {
        machine_type: String,
        capabilities: Vec<String>,
    },
    Workstation {
        workstation_type: String,
        capabilities: Vec<String>,
    },
    Conveyor {
        speed: f64,           // m/s
        items_per_meter: f64, // 每米容量
        direction: ConveyorDirection,
        path: Vec<Position>,
    },
    RoboticArm {
        arm_type: String,
        reach: f64,
        payload: f64,
        degrees_of_freedom: u8,
        end_effector: Option<String>,
        joint_positions: Vec<f64>,
        home_positions: Vec<f64>,
    },
    Vehicle {
        vehicle_type: VehicleType,
        average_speed: f64,
        current_speed: f64,
        load_capacity: f64,
        battery_capacity: f64,  // kWh
        battery_level: f64,     // %
        charging_threshold: f64, // %
    },
    Tool {
        tool_type: String,
    },
}

impl ResourceVariant {
    pub fn machine(machine_type: &str) -> Self {
        ResourceVariant::Machine {
            machine_type: machine_type.to_string(),
            capabilities: Vec::new(),
        }
    }

    pub fn workstation(workstation_type: &str) -> Self {
        ResourceVariant::Workstation {
            workstation_type: workstation_type.to_string(),
            capabilities: Vec::new(),
        }
    }

    pub fn conveyor(speed: f64, items_per_meter: f64, path: Vec<Position>) -> Self {
        ResourceVariant::Conveyor {
            speed,
            items_per_meter,
            direction: ConveyorDirection::Forward,
            path,
        }
    }

    pub fn robotic_arm(arm_type: &str, reach: f64, payload: f64, degrees_of_freedom: u8) -> Self {
        ResourceVariant::RoboticArm {
            arm_type: arm_type.to_string(),
            reach,
            payload,
            degrees_of_freedom,
            end_effector: None,
            joint_positions: vec![0.0; degrees_of_freedom as usize],
            home_positions: vec![0.0; degrees_of_freedom as usize],
        }
    }

    pub fn vehicle(vehicle_type: VehicleType, average_speed: f64, load_capacity: f64) -> Self {
        ResourceVariant::Vehicle {
            vehicle_type,
            average_speed,
            current_speed: 0.0,
            load_capacity,
            battery_capacity: 0.0,
            battery_level: 100.0,
            charging_threshold: 20.0,
        }
    }

    pub fn tool(tool_type: &str) -> Self {
        ResourceVariant::Tool {
            tool_type: tool_type.to_string(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceVariant::General => ResourceType::General,
            ResourceVariant::Machine { .. } => ResourceType::Machine,
            ResourceVariant::Workstation { .. } => ResourceType::Workstation,
            ResourceVariant::Conveyor { .. } => ResourceType::Conveyor,
            ResourceVariant::RoboticArm { .. } => ResourceType::RoboticArm,
            ResourceVariant::Vehicle { .. } => ResourceType::Vehicle,
            ResourceVariant::Tool { .. } => ResourceType::Tool,
        }
    }

    /// 变体声明的类型名（机床型号/车辆类型/工具类型...）
    pub fn type_tag(&self) -> Option<String> {
        match self {
            ResourceVariant::Machine { machine_type, .. } => Some(machine_type.clone()),
            ResourceVariant::Workstation {
                workstation_type, ..
            } => Some(workstation_type.clone()),
            ResourceVariant::RoboticArm { arm_type, .. } => Some(arm_type.clone()),
            ResourceVariant::Vehicle { vehicle_type, .. } => Some(vehicle_type.as_str().to_string()),
            ResourceVariant::Tool { tool_type } => Some(tool_type.clone()),
            ResourceVariant::General | ResourceVariant::Conveyor { .. } => None,
        }
    }

    /// 体积容量（无则为 None）
    fn volume_capacity(&self) -> Option<f64> {
        match self {
            ResourceVariant::Conveyor {
                items_per_meter,
                path,
                ..
            } => Some(path_length(path) * items_per_meter),
            ResourceVariant::Vehicle { load_capacity, .. } => Some(*load_capacity),
            _ => None,
        }
    }

    fn validate(&self) -> OmmResult<()> {
        match self {
            ResourceVariant::General => Ok(()),
            ResourceVariant::Machine {
                machine_type,
                capabilities,
            } => {
                ensure_not_blank("machine.machine_type", machine_type)?;
                ensure_unique_capabilities(capabilities)
            }
            ResourceVariant::Workstation {
                workstation_type,
                capabilities,
            } => {
                ensure_not_blank("workstation.workstation_type", workstation_type)?;
                ensure_unique_capabilities(capabilities)
            }
            ResourceVariant::Conveyor {
                speed,
                items_per_meter,
                path,
                ..
            } => {
                ensure_non_negative("conveyor.speed", *speed)?;
                ensure_non_negative("conveyor.items_per_meter", *items_per_meter)?;
                if path.iter().any(|p| !p.is_finite()) {
                    return Err(OmmError::validation("输送线路径包含非法坐标"));
                }
                Ok(())
            }
            ResourceVariant::RoboticArm {
                arm_type,
                reach,
                payload,
                degrees_of_freedom,
                joint_positions,
                home_positions,
                ..
            } => {
                ensure_not_blank("robotic_arm.arm_type", arm_type)?;
                ensure_non_negative("robotic_arm.reach", *reach)?;
                ensure_non_negative("robotic_arm.payload", *payload)?;
                if *degrees_of_freedom == 0 {
                    return Err(OmmError::validation("机械臂自由度必须大于 0"));
                }
                let dof = *degrees_of_freedom as usize;
                if joint_positions.len() != dof || home_positions.len() != dof {
                    return Err(OmmError::validation(format!(
                        "机械臂关节位置维度必须等于自由度 {}",
                        dof
                    )));
                }
                Ok(())
            }
            ResourceVariant::Vehicle {
                average_speed,
                current_speed,
                load_capacity,
                battery_capacity,
                battery_level,
                charging_threshold,
                ..
            } => {
                ensure_non_negative("vehicle.average_speed", *average_speed)?;
                ensure_non_negative("vehicle.current_speed", *current_speed)?;
                ensure_non_negative("vehicle.load_capacity", *load_capacity)?;
                ensure_non_negative("vehicle.battery_capacity", *battery_capacity)?;
                ensure_percentage("vehicle.battery_level", *battery_level)?;
                ensure_percentage("vehicle.charging_threshold", *charging_threshold)
            }
            ResourceVariant::Tool { tool_type } => ensure_not_blank("tool.tool_type", tool_type),
        }
    }
}

fn ensure_unique_capabilities(capabilities: &[String]) -> OmmResult<()> {
    let unique: BTreeSet<&String> = capabilities.iter().collect();
    if unique.len() != capabilities.len() {
        return Err(OmmError::validation("能力列表包含重复项"));
    }
    Ok(())
}

// ==========================================
// Resource - 资源记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub position: Option<Position>,
    status: ResourceStatus,
    variant: ResourceVariant,

    // ===== 容量 =====
    slot_capacity: Option<u32>, // None = 变体默认
    current_load: u32,
    volume_capacity: Option<f64>,
    volume_load: f64,

    // ===== 关联 =====
    authorized_actors: BTreeSet<String>,
    sensors: BTreeMap<String, Sensor>,
    constraints: ConstraintSet,

    // ===== 能耗与维护 =====
    pub power_type: Option<String>,
    power_consumption_kw: f64,
    maintenance_interval_hours: Option<f64>,
    last_maintenance: Option<DateTime<Utc>>,
    hours_used: f64,
    hours_since_maintenance: f64,

    // ===== 进出计数 =====
    entries: u64,
    exits: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(name: &str, variant: ResourceVariant) -> OmmResult<Self> {
        ensure_not_blank("resource.name", name)?;
        variant.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: new_entity_id(),
            name: name.to_string(),
            position: None,
            status: ResourceStatus::Idle,
            volume_capacity: variant.volume_capacity(),
            variant,
            slot_capacity: None,
            current_load: 0,
            volume_load: 0.0,
            authorized_actors: BTreeSet::new(),
            sensors: BTreeMap::new(),
            constraints: ConstraintSet::default(),
            power_type: None,
            power_consumption_kw: 0.0,
            maintenance_interval_hours: None,
            last_maintenance: None,
            hours_used: 0.0,
            hours_since_maintenance: 0.0,
            entries: 0,
            exits: 0,
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

    /// 显式设置槽位上限（≥1）
    pub fn with_slot_capacity(mut self, slots: u32) -> OmmResult<Self> {
        if slots == 0 {
            return Err(OmmError::validation("槽位上限必须 ≥ 1"));
        }
        self.slot_capacity = Some(slots);
        Ok(self)
    }

    /// 显式设置体积容量（覆盖变体推导值）
    pub fn with_volume_capacity(mut self, capacity: f64) -> OmmResult<Self> {
        ensure_non_negative("resource.volume_capacity", capacity)?;
        self.volume_capacity = Some(capacity);
        Ok(self)
    }

    pub fn with_maintenance_interval(mut self, hours: f64) -> OmmResult<Self> {
        if !(hours.is_finite() && hours > 0.0) {
            return Err(OmmError::validation("维护间隔必须为正数"));
        }
        self.maintenance_interval_hours = Some(hours);
        Ok(self)
    }

    pub fn with_power(mut self, power_type: &str, consumption_kw: f64) -> OmmResult<Self> {
        ensure_non_negative("resource.power_consumption_kw", consumption_kw)?;
        self.power_type = Some(power_type.to_string());
        self.power_consumption_kw = consumption_kw;
        Ok(self)
    }

    // ===== 访问器 =====

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn variant(&self) -> &ResourceVariant {
        &self.variant
    }

    pub fn resource_type(&self) -> ResourceType {
        self.variant.resource_type()
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self.variant, ResourceVariant::Vehicle { .. })
    }

    pub fn explicit_slot_capacity(&self) -> Option<u32> {
        self.slot_capacity
    }

    /// 有效槽位上限
    ///
    /// 未显式设置时: 工具/机械臂取 `single_occupant_slots`, 其余为 1
    pub fn slot_limit(&self, single_occupant_slots: u32) -> u32 {
        match self.slot_capacity {
            Some(slots) => slots,
            None => match self.variant {
                ResourceVariant::Tool { .. } | ResourceVariant::RoboticArm { .. } => {
                    single_occupant_slots.max(1)
                }
                _ => 1,
            },
        }
    }

    pub fn current_load(&self) -> u32 {
        self.current_load
    }

    pub fn volume_capacity(&self) -> Option<f64> {
        self.volume_capacity
    }

    pub fn volume_load(&self) -> f64 {
        self.volume_load
    }

    pub fn power_consumption_kw(&self) -> f64 {
        self.power_consumption_kw
    }

    pub fn hours_used(&self) -> f64 {
        self.hours_used
    }

    pub fn last_maintenance(&self) -> Option<DateTime<Utc>> {
        self.last_maintenance
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn exits(&self) -> u64 {
        self.exits
    }

    /// 能力列表（机床/工位以外为空）
    pub fn capabilities(&self) -> Vec<String> {
        match &self.variant {
            ResourceVariant::Machine { capabilities, .. }
            | ResourceVariant::Workstation { capabilities, .. } => capabilities.clone(),
            _ => Vec::new(),
        }
    }

    /// 类型名或能力是否匹配（大小写不敏感）
    pub fn matches_spec(&self, spec: &str) -> bool {
        let spec = spec.trim();
        self.variant
            .type_tag()
            .map_or(false, |tag| tag.eq_ignore_ascii_case(spec))
            || self
                .capabilities()
                .iter()
                .any(|cap| cap.eq_ignore_ascii_case(spec))
    }

    // ==========================================
    // 状态机
    // ==========================================

    /// 状态转换（充电状态仅车辆可达）
    pub fn transition_status(&mut self, to: ResourceStatus) -> OmmResult<()> {
        if to == ResourceStatus::Charging && !self.is_vehicle() {
            return Err(OmmError::invalid_transition(
                "ResourceStatus",
                self.status,
                format!("{} (仅车辆可充电)", to),
            ));
        }
        self.status = self.status.transition(to)?;
        self.touch();
        Ok(())
    }

    // ==========================================
    // 容量计数（由容量管理器调用）
    // ==========================================

    pub(crate) fn occupy(&mut self, volume: Option<f64>) {
        self.current_load += 1;
        if let Some(amount) = volume {
            self.volume_load += amount;
        }
        self.touch();
    }

    /// 沿用另一份记录的占用计数
    pub(crate) fn restore_load_from(&mut self, other: &Resource) {
        self.current_load = other.current_load;
        self.volume_load = other.volume_load;
    }

    pub(crate) fn vacate(&mut self, volume: Option<f64>) {
        self.current_load = self.current_load.saturating_sub(1);
        if let Some(amount) = volume {
            self.volume_load = (self.volume_load - amount).max(0.0);
        }
        self.touch();
    }

    // ==========================================
    // 授权人员 / 传感器 / 约束
    // ==========================================

    pub fn add_authorized_actor(&mut self, actor_id: &str) -> OmmResult<()> {
        if !self.authorized_actors.insert(actor_id.to_string()) {
            return Err(OmmError::already_exists("AuthorizedActor", actor_id));
        }
        self.touch();
        Ok(())
    }

    pub fn remove_authorized_actor(&mut self, actor_id: &str) -> OmmResult<()> {
        if !self.authorized_actors.remove(actor_id) {
            return Err(OmmError::not_found("AuthorizedActor", actor_id));
        }
        self.touch();
        Ok(())
    }

    /// 替换授权人员（旧 id 必须存在,新 id 不得已存在）
    pub fn update_authorized_actor(&mut self, old_id: &str, new_id: &str) -> OmmResult<()> {
        if !self.authorized_actors.contains(old_id) {
            return Err(OmmError::not_found("AuthorizedActor", old_id));
        }
        if self.authorized_actors.contains(new_id) {
            return Err(OmmError::already_exists("AuthorizedActor", new_id));
        }
        self.authorized_actors.remove(old_id);
        self.authorized_actors.insert(new_id.to_string());
        self.touch();
        Ok(())
    }

    pub fn is_authorized(&self, actor_id: &str) -> bool {
        self.authorized_actors.contains(actor_id)
    }

    pub fn authorized_actors(&self) -> Vec<String> {
        self.authorized_actors.iter().cloned().collect()
    }

    pub fn add_sensor(&mut self, sensor: Sensor) -> OmmResult<()> {
        sensor.validate()?;
        if self.sensors.contains_key(&sensor.id) {
            return Err(OmmError::already_exists("Sensor", &sensor.id));
        }
        self.sensors.insert(sensor.id.clone(), sensor);
        self.touch();
        Ok(())
    }

    pub fn remove_sensor(&mut self, sensor_id: &str) -> OmmResult<Sensor> {
        let sensor = self
            .sensors
            .remove(sensor_id)
            .ok_or_else(|| OmmError::not_found("Sensor", sensor_id))?;
        self.touch();
        Ok(sensor)
    }

    pub fn sensor(&self, sensor_id: &str) -> OmmResult<Sensor> {
        self.sensors
            .get(sensor_id)
            .cloned()
            .ok_or_else(|| OmmError::not_found("Sensor", sensor_id))
    }

    pub fn sensors(&self) -> Vec<Sensor> {
        self.sensors.values().cloned().collect()
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

    // ==========================================
    // 使用与维护
    // ==========================================

    pub fn record_usage(&mut self, hours: f64) -> OmmResult<()> {
        ensure_non_negative("usage.hours", hours)?;
        self.hours_used += hours;
        self.hours_since_maintenance += hours;
        self.touch();
        Ok(())
    }

    pub fn needs_maintenance(&self) -> bool {
        self.maintenance_interval_hours
            .map_or(false, |interval| self.hours_since_maintenance >= interval)
    }

    pub fn perform_maintenance(&mut self) {
        self.hours_since_maintenance = 0.0;
        self.last_maintenance = Some(Utc::now());
        self.touch();
    }

    pub fn record_entry(&mut self) {
        self.entries += 1;
        self.touch();
    }

    /// 记录离开（离开次数不得超过进入次数）
    pub fn record_exit(&mut self) -> OmmResult<()> {
        if self.exits >= self.entries {
            return Err(OmmError::validation(format!(
                "资源 {} 离开次数不能超过进入次数",
                self.id
            )));
        }
        self.exits += 1;
        self.touch();
        Ok(())
    }

    // ==========================================
    // 机床 / 工位: 能力
    // ==========================================

    pub fn add_capability(&mut self, capability: &str) -> OmmResult<()> {
        ensure_not_blank("capability", capability)?;
        let id = self.id.clone();
        let capabilities = self.capabilities_mut()?;
        if capabilities.iter().any(|c| c == capability) {
            return Err(OmmError::already_exists("Capability", capability));
        }
        capabilities.push(capability.to_string());
        tracing::debug!(resource_id = %id, capability, "添加资源能力");
        self.touch();
        Ok(())
    }

    pub fn remove_capability(&mut self, capability: &str) -> OmmResult<()> {
        let capabilities = self.capabilities_mut()?;
        let index = capabilities
            .iter()
            .position(|c| c == capability)
            .ok_or_else(|| OmmError::not_found("Capability", capability))?;
        capabilities.remove(index);
        self.touch();
        Ok(())
    }

    fn capabilities_mut(&mut self) -> OmmResult<&mut Vec<String>> {
        let resource_type = self.resource_type();
        match &mut self.variant {
            ResourceVariant::Machine { capabilities, .. }
            | ResourceVariant::Workstation { capabilities, .. } => Ok(capabilities),
            _ => Err(OmmError::validation(format!(
                "{} 类型资源不支持能力列表",
                resource_type
            ))),
        }
    }

    // ==========================================
    // 输送线
    // ==========================================

    pub fn conveyor_length(&self) -> Option<f64> {
        match &self.variant {
            ResourceVariant::Conveyor { path, .. } => Some(path_length(path)),
            _ => None,
        }
    }

    /// 替换输送路径,重新计算体积容量（不得低于当前占用）
    pub fn set_conveyor_path(&mut self, new_path: Vec<Position>) -> OmmResult<()> {
        let load = self.volume_load;
        let id = self.id.clone();
        match &mut self.variant {
            ResourceVariant::Conveyor {
                items_per_meter,
                path,
                ..
            } => {
                if new_path.iter().any(|p| !p.is_finite()) {
                    return Err(OmmError::validation("输送线路径包含非法坐标"));
                }
                let capacity = path_length(&new_path) * *items_per_meter;
                if capacity < load {
                    return Err(OmmError::CapacityExceeded {
                        entity: "Resource".to_string(),
                        id,
                        requested: load,
                        available: capacity,
                    });
                }
                *path = new_path;
                self.volume_capacity = Some(capacity);
            }
            _ => return Err(self.variant_mismatch("Conveyor")),
        }
        self.touch();
        Ok(())
    }

    pub fn reverse_direction(&mut self) -> OmmResult<ConveyorDirection> {
        let next = match &mut self.variant {
            ResourceVariant::Conveyor {
                direction, path, ..
            } => {
                *direction = match direction {
                    ConveyorDirection::Forward => ConveyorDirection::Reverse,
                    ConveyorDirection::Reverse => ConveyorDirection::Forward,
                };
                path.reverse();
                *direction
            }
            _ => return Err(self.variant_mismatch("Conveyor")),
        };
        self.touch();
        Ok(next)
    }

    // ==========================================
    // 机械臂
    // ==========================================

    pub fn move_to_position(&mut self, joints: Vec<f64>) -> OmmResult<()> {
        match &mut self.variant {
            ResourceVariant::RoboticArm {
                degrees_of_freedom,
                joint_positions,
                ..
            } => {
                if joints.len() != *degrees_of_freedom as usize {
                    return Err(OmmError::validation(format!(
                        "目标位置维度 {} 与自由度 {} 不符",
                        joints.len(),
                        degrees_of_freedom
                    )));
                }
                if joints.iter().any(|j| !j.is_finite()) {
                    return Err(OmmError::validation("目标位置包含非法数值"));
                }
                *joint_positions = joints;
            }
            _ => return Err(self.variant_mismatch("RoboticArm")),
        }
        self.touch();
        Ok(())
    }

    pub fn home(&mut self) -> OmmResult<()> {
        match &mut self.variant {
            ResourceVariant::RoboticArm {
                joint_positions,
                home_positions,
                ..
            } => joint_positions.clone_from(home_positions),
            _ => return Err(self.variant_mismatch("RoboticArm")),
        }
        self.touch();
        Ok(())
    }

    pub fn change_end_effector(&mut self, effector: &str) -> OmmResult<Option<String>> {
        ensure_not_blank("end_effector", effector)?;
        let previous = match &mut self.variant {
            ResourceVariant::RoboticArm { end_effector, .. } => {
                end_effector.replace(effector.to_string())
            }
            _ => return Err(self.variant_mismatch("RoboticArm")),
        };
        self.touch();
        Ok(previous)
    }

    pub fn joint_positions(&self) -> Vec<f64> {
        match &self.variant {
            ResourceVariant::RoboticArm {
                joint_positions, ..
            } => joint_positions.clone(),
            _ => Vec::new(),
        }
    }

    /// 负载是否在额定范围内
    pub fn check_payload(&self, weight: f64) -> OmmResult<bool> {
        match &self.variant {
            ResourceVariant::RoboticArm { payload, .. } => Ok(weight >= 0.0 && weight <= *payload),
            _ => Err(self.variant_mismatch("RoboticArm")),
        }
    }

    // ==========================================
    // 车辆
    // ==========================================

    pub fn set_speed(&mut self, speed: f64) -> OmmResult<()> {
        ensure_non_negative("vehicle.speed", speed)?;
        match &mut self.variant {
            ResourceVariant::Vehicle { current_speed, .. } => *current_speed = speed,
            _ => return Err(self.variant_mismatch("Vehicle")),
        }
        self.touch();
        Ok(())
    }

    pub fn set_battery_level(&mut self, level: f64) -> OmmResult<()> {
        ensure_percentage("vehicle.battery_level", level)?;
        match &mut self.variant {
            ResourceVariant::Vehicle { battery_level, .. } => *battery_level = level,
            _ => return Err(self.variant_mismatch("Vehicle")),
        }
        self.touch();
        Ok(())
    }

    pub fn set_charging_threshold(&mut self, threshold: f64) -> OmmResult<()> {
        ensure_percentage("vehicle.charging_threshold", threshold)?;
        match &mut self.variant {
            ResourceVariant::Vehicle {
                charging_threshold, ..
            } => *charging_threshold = threshold,
            _ => return Err(self.variant_mismatch("Vehicle")),
        }
        self.touch();
        Ok(())
    }

    pub fn needs_charging(&self) -> bool {
        match &self.variant {
            ResourceVariant::Vehicle {
                battery_level,
                charging_threshold,
                ..
            } => battery_level <= charging_threshold,
            _ => false,
        }
    }

    pub fn start_charging(&mut self) -> OmmResult<()> {
        self.transition_status(ResourceStatus::Charging)?;
        if let ResourceVariant::Vehicle { current_speed, .. } = &mut self.variant {
            *current_speed = 0.0;
        }
        Ok(())
    }

    pub fn stop_charging(&mut self) -> OmmResult<()> {
        if self.status != ResourceStatus::Charging {
            return Err(OmmError::invalid_transition(
                "ResourceStatus",
                self.status,
                ResourceStatus::Idle,
            ));
        }
        self.transition_status(ResourceStatus::Idle)
    }

    fn variant_mismatch(&self, expected: &str) -> OmmError {
        OmmError::validation(format!(
            "资源 {} 类型为 {}, 不支持 {} 操作",
            self.id,
            self.resource_type(),
            expected
        ))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EntityMapping for Resource {
    const ENTITY: &'static str = "Resource";

    fn validate(&self) -> OmmResult<()> {
        ensure_not_blank("resource.id", &self.id)?;
        ensure_not_blank("resource.name", &self.name)?;
        self.variant.validate()?;
        if self.slot_capacity == Some(0) {
            return Err(OmmError::validation("槽位上限必须 ≥ 1"));
        }
        if let Some(slots) = self.slot_capacity {
            if self.current_load > slots {
                return Err(OmmError::validation(format!(
                    "资源 {} 当前占用 {} 超过槽位上限 {}",
                    self.id, self.current_load, slots
                )));
            }
        }
        ensure_non_negative("resource.volume_load", self.volume_load)?;
        if let Some(capacity) = self.volume_capacity {
            ensure_non_negative("resource.volume_capacity", capacity)?;
            if self.volume_load > capacity + 1e-9 {
                return Err(OmmError::validation(format!(
                    "资源 {} 体积占用超过容量",
                    self.id
                )));
            }
        }
        if self.status == ResourceStatus::Charging && !self.is_vehicle() {
            return Err(OmmError::validation("仅车辆可处于充电状态"));
        }
        if self.exits > self.entries {
            return Err(OmmError::validation("离开次数不能超过进入次数"));
        }
        ensure_non_negative("resource.hours_used", self.hours_used)?;
        ensure_non_negative("resource.power_consumption_kw", self.power_consumption_kw)?;
        for sensor in self.sensors.values() {
            sensor.validate()?;
        }
        self.constraints.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conveyor_capacity_from_path() {
        let path = vec![Position::new(0.0, 0.0, 0.0), Position::new(10.0, 0.0, 0.0)];
        let mut conveyor =
            Resource::new("Line 1", ResourceVariant::conveyor(0.5, 2.0, path)).unwrap();
        assert_eq!(conveyor.conveyor_length(), Some(10.0));
        assert_eq!(conveyor.volume_capacity(), Some(20.0));

        assert_eq!(conveyor.reverse_direction().unwrap(), ConveyorDirection::Reverse);
        assert!(conveyor.move_to_position(vec![0.0]).is_err());
    }

    #[test]
    fn test_charging_is_vehicle_only() {
        let mut press = Resource::new("Press", ResourceVariant::machine("Hydraulic Press")).unwrap();
        assert!(matches!(
            press.transition_status(ResourceStatus::Charging),
            Err(OmmError::InvalidTransition { .. })
        ));

        let mut agv = Resource::new(
            "AGV-1",
            ResourceVariant::vehicle(VehicleType::AutomatedMobileRobot, 1.2, 50.0),
        )
        .unwrap();
        agv.start_charging().unwrap();
        assert_eq!(agv.status(), ResourceStatus::Charging);
        agv.stop_charging().unwrap();
        assert_eq!(agv.status(), ResourceStatus::Idle);
    }

    #[test]
    fn test_capabilities_reject_duplicates_and_missing() {
        let mut mill = Resource::new("Mill", ResourceVariant::machine("CNC Mill")).unwrap();
        mill.add_capability("milling").unwrap();
        assert!(matches!(
            mill.add_capability("milling"),
            Err(OmmError::AlreadyExists { .. })
        ));
        assert!(matches!(
            mill.remove_capability("drilling"),
            Err(OmmError::NotFound { .. })
        ));
        assert!(mill.matches_spec("cnc mill"));
        assert!(mill.matches_spec("Milling"));
        assert!(!mill.matches_spec("Lathe"));
    }

    #[test]
    fn test_robotic_arm_positions_checked_against_dof() {
        let mut arm = Resource::new("Arm", ResourceVariant::robotic_arm("SCARA", 0.8, 5.0, 4)).unwrap();
        assert!(arm.move_to_position(vec![1.0, 2.0, 3.0]).is_err());
        arm.move_to_position(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        arm.home().unwrap();
        assert_eq!(arm.joint_positions(), vec![0.0; 4]);
        assert!(arm.check_payload(4.5).unwrap());
        assert!(!arm.check_payload(5.5).unwrap());
        assert_eq!(arm.slot_limit(1), 1);
        assert_eq!(arm.slot_limit(2), 2);
    }

    #[test]
    fn test_maintenance_and_entry_counters() {
        let mut lathe = Resource::new("Lathe", ResourceVariant::machine("Lathe"))
            .unwrap()
            .with_maintenance_interval(10.0)
            .unwrap();
        lathe.record_usage(6.0).unwrap();
        assert!(!lathe.needs_maintenance());
        lathe.record_usage(4.0).unwrap();
        assert!(lathe.needs_maintenance());
        lathe.perform_maintenance();
        assert!(!lathe.needs_maintenance());
        assert_eq!(lathe.hours_used(), 10.0);

        assert!(lathe.record_exit().is_err());
        lathe.record_entry();
        lathe.record_exit().unwrap();
        assert_eq!((lathe.entries(), lathe.exits()), (1, 1));
    }
}
