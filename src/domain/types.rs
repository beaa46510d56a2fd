// ==========================================
// 开放制造模型 (OMM) - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 生成实体唯一标识（UUID v4）
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// 为枚举生成 Display / as_str / from_str（大小写不敏感）
macro_rules! enum_codes {
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $name {
            /// 全部取值（声明顺序）
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// 转换为存储/映射用字符串
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// 从字符串解析（大小写不敏感）
            pub fn from_str(s: &str) -> Option<Self> {
                match s.trim().to_uppercase().as_str() {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

// ==========================================
// 地点类型 (Location Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Internal, // 厂内
    External, // 厂外（供应商、客户等）
}

enum_codes!(LocationType {
    Internal => "INTERNAL",
    External => "EXTERNAL",
});

// ==========================================
// 资源类型 (Resource Type)
// ==========================================
// 与 ResourceVariant 的标签一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    General,
    Machine,
    Workstation,
    Conveyor,
    RoboticArm,
    Vehicle,
    Tool,
}

enum_codes!(ResourceType {
    General => "GENERAL",
    Machine => "MACHINE",
    Workstation => "WORKSTATION",
    Conveyor => "CONVEYOR",
    RoboticArm => "ROBOTIC_ARM",
    Vehicle => "VEHICLE",
    Tool => "TOOL",
});

// ==========================================
// 工序状态 (Action Status)
// ==========================================
// DRAFT → REQUESTED → CONFIRMED → IN_PROGRESS → COMPLETED
// 任意非终态 → CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Draft,
    Requested,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

enum_codes!(ActionStatus {
    Draft => "DRAFT",
    Requested => "REQUESTED",
    Confirmed => "CONFIRMED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl ActionStatus {
    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Cancelled)
    }
}

// ==========================================
// 工序类型 (Action Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Stop,         // 紧急停止
    Load,         // 上料
    Unload,       // 下料
    Move,         // 搬运
    Attach,       // 连接
    Detach,       // 拆分
    Break,        // 中断
    Wait,         // 等待
    Process,      // 通用加工
    Assembly,     // 装配
    Machining,    // 机加工
    QualityCheck, // 质检
    Packaging,    // 包装
    Storage,      // 入库
    Setup,        // 调机
    Clean,        // 清洁
    Inspect,      // 点检
    Repair,       // 维修
    Maintenance,  // 保养
}

enum_codes!(ActionType {
    Stop => "STOP",
    Load => "LOAD",
    Unload => "UNLOAD",
    Move => "MOVE",
    Attach => "ATTACH",
    Detach => "DETACH",
    Break => "BREAK",
    Wait => "WAIT",
    Process => "PROCESS",
    Assembly => "ASSEMBLY",
    Machining => "MACHINING",
    QualityCheck => "QUALITY_CHECK",
    Packaging => "PACKAGING",
    Storage => "STORAGE",
    Setup => "SETUP",
    Clean => "CLEAN",
    Inspect => "INSPECT",
    Repair => "REPAIR",
    Maintenance => "MAINTENANCE",
});

// ==========================================
// 资源状态 (Resource Status)
// ==========================================
// IDLE ⇄ WAIT ⇄ {WORKING, LOAD, UNLOAD}; 任意 → FAILED
// CHARGING 仅车辆可从 IDLE 进入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Idle,
    Wait,
    Working,
    Load,
    Unload,
    Failed,
    Charging,
}

enum_codes!(ResourceStatus {
    Idle => "IDLE",
    Wait => "WAIT",
    Working => "WORKING",
    Load => "LOAD",
    Unload => "UNLOAD",
    Failed => "FAILED",
    Charging => "CHARGING",
});

// ==========================================
// 车辆类型 (Vehicle Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    GenericAutomatedVehicle,
    GenericManualVehicle,
    AutomatedMobileRobot,
    ManualForklift,
}

enum_codes!(VehicleType {
    GenericAutomatedVehicle => "GENERIC_AUTOMATED_VEHICLE",
    GenericManualVehicle => "GENERIC_MANUAL_VEHICLE",
    AutomatedMobileRobot => "AUTOMATED_MOBILE_ROBOT",
    ManualForklift => "MANUAL_FORKLIFT",
});

// ==========================================
// 仓储类型 (Storage Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    General,
    Warehouse,
    Rack,
    Buffer,
    Queue,
}

enum_codes!(StorageType {
    General => "GENERAL",
    Warehouse => "WAREHOUSE",
    Rack => "RACK",
    Buffer => "BUFFER",
    Queue => "QUEUE",
});

// ==========================================
// 生产状态 (Production State)
// ==========================================
// RAW/NEW → WORK_IN_PROGRESS → FINISHED
// 任意 → DEFECTIVE / ON_HOLD, 可恢复至 WORK_IN_PROGRESS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionState {
    Raw,
    New,
    WorkInProgress,
    Finished,
    Defective,
    OnHold,
}

enum_codes!(ProductionState {
    Raw => "RAW",
    New => "NEW",
    WorkInProgress => "WORK_IN_PROGRESS",
    Finished => "FINISHED",
    Defective => "DEFECTIVE",
    OnHold => "ON_HOLD",
});

// ==========================================
// 零件类型 (Part Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartType {
    RawMaterial,
    PurchasedComponent,
    WorkInProgress,
}

enum_codes!(PartType {
    RawMaterial => "RAW_MATERIAL",
    PurchasedComponent => "PURCHASED_COMPONENT",
    WorkInProgress => "WORK_IN_PROGRESS",
});

// ==========================================
// 作业状态 (Job Status)
// ==========================================
// PLANNED → IN_PROGRESS ⇄ ON_HOLD → COMPLETED
// PLANNED/IN_PROGRESS/ON_HOLD → CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Planned,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

enum_codes!(JobStatus {
    Planned => "PLANNED",
    InProgress => "IN_PROGRESS",
    OnHold => "ON_HOLD",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl JobStatus {
    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

// ==========================================
// 作业优先级 (Job Priority)
// ==========================================
// 顺序: Low(1) < Medium(2) < High(3) < Urgent(4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    Low,
    Medium,
    High,
    Urgent,
}

enum_codes!(JobPriority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

impl JobPriority {
    /// 序数值 (1-4)
    pub fn ordinal(&self) -> u8 {
        match self {
            JobPriority::Low => 1,
            JobPriority::Medium => 2,
            JobPriority::High => 3,
            JobPriority::Urgent => 4,
        }
    }

    /// 从序数值构造
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            1 => Some(JobPriority::Low),
            2 => Some(JobPriority::Medium),
            3 => Some(JobPriority::High),
            4 => Some(JobPriority::Urgent),
            _ => None,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Medium
    }
}

// ==========================================
// 需求类型 (Requirement Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementKind {
    Machine,
    Workstation,
    Conveyor,
    RoboticArm,
    Vehicle,
    Part,
    Product,
    Worker,
    Tool,
}

enum_codes!(RequirementKind {
    Machine => "MACHINE",
    Workstation => "WORKSTATION",
    Conveyor => "CONVEYOR",
    RoboticArm => "ROBOTIC_ARM",
    Vehicle => "VEHICLE",
    Part => "PART",
    Product => "PRODUCT",
    Worker => "WORKER",
    Tool => "TOOL",
});

impl RequirementKind {
    /// 缺失描述中使用的可读名称
    pub fn label(&self) -> &'static str {
        match self {
            RequirementKind::Machine => "Machine",
            RequirementKind::Workstation => "Workstation",
            RequirementKind::Conveyor => "Conveyor",
            RequirementKind::RoboticArm => "RoboticArm",
            RequirementKind::Vehicle => "Vehicle",
            RequirementKind::Part => "Part",
            RequirementKind::Product => "Product",
            RequirementKind::Worker => "Worker",
            RequirementKind::Tool => "Tool",
        }
    }

    /// 解析需求类型（接受代码或可读名称,如 "ROBOTIC_ARM" / "RoboticArm"）
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_str(s).or_else(|| {
            Self::ALL
                .iter()
                .copied()
                .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
        })
    }

    /// 该需求对应的资源类型（零件/产品/工人不对应资源）
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            RequirementKind::Machine => Some(ResourceType::Machine),
            RequirementKind::Workstation => Some(ResourceType::Workstation),
            RequirementKind::Conveyor => Some(ResourceType::Conveyor),
            RequirementKind::RoboticArm => Some(ResourceType::RoboticArm),
            RequirementKind::Vehicle => Some(ResourceType::Vehicle),
            RequirementKind::Tool => Some(ResourceType::Tool),
            RequirementKind::Part | RequirementKind::Product | RequirementKind::Worker => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_from_str() {
        for status in ActionStatus::ALL {
            assert_eq!(ActionStatus::from_str(status.as_str()), Some(*status));
        }
        assert_eq!(ActionType::from_str("quality_check"), Some(ActionType::QualityCheck));
        assert_eq!(ActionType::ALL.len(), 19);
        assert_eq!(JobStatus::from_str("UNKNOWN"), None);
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ResourceStatus::Charging).unwrap();
        assert_eq!(json, "\"CHARGING\"");
        let kind: RequirementKind = serde_json::from_str("\"ROBOTIC_ARM\"").unwrap();
        assert_eq!(kind, RequirementKind::RoboticArm);
    }

    #[test]
    fn test_priority_ordinals() {
        assert!(JobPriority::Urgent > JobPriority::Low);
        assert_eq!(JobPriority::High.ordinal(), 3);
        assert_eq!(JobPriority::from_ordinal(4), Some(JobPriority::Urgent));
        assert_eq!(JobPriority::from_ordinal(0), None);
    }

    #[test]
    fn test_requirement_kind_parse_accepts_labels() {
        assert_eq!(RequirementKind::parse("Worker"), Some(RequirementKind::Worker));
        assert_eq!(RequirementKind::parse("roboticarm"), Some(RequirementKind::RoboticArm));
        assert_eq!(RequirementKind::parse("Conveyer"), None);
        assert_eq!(RequirementKind::Tool.resource_type(), Some(ResourceType::Tool));
    }

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(new_entity_id(), new_entity_id());
    }
}
