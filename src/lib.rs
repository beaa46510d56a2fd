// ==========================================
// 开放制造模型 (OMM) - 编排核心库
// ==========================================
// 技术栈: Rust + serde + tracing
// 系统定位: 制造作业编排核心（实体模型、状态机、需求匹配、容量与库存）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 状态机与编排
pub mod engine;

// 配置层 - 编排策略
pub mod config;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActionStatus, ActionType, JobPriority, JobStatus, LocationType, PartType, ProductionState,
    RequirementKind, ResourceStatus, ResourceType, StorageType, VehicleType,
};

// 领域实体
pub use domain::{
    Action, Actor, Allocation, Constraint, EntityMapping, Job, Location, OmmError, OmmResult,
    Part, PartVolumeMode, Position, Product, Requirement, Resource, ResourceVariant, Route,
    Sensor, SensorReader, SensorReading, SpecValue, Storage, StoredItem,
};

// 引擎
pub use engine::{
    CapacityManager, InventoryLedger, JobOrchestrator, JobStartReport, MatchContext,
    MatchOutcome, RequirementMatcher, StateMachine,
};

// 配置
pub use config::{AutoStartPolicy, ConfigManager, ReleasePolicy};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "开放制造模型编排核心";
