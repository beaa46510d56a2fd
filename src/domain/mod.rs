// ==========================================
// 开放制造模型 (OMM) - 领域模型层
// ==========================================
// 职责: 定义制造实体、类型、校验与序列化映射
// 红线: 集合访问器返回副本,不暴露可变内部引用
// ==========================================

pub mod action;
pub mod actor;
pub mod constraint;
pub mod error;
pub mod job;
pub mod location;
pub mod mapping;
pub mod part;
pub mod product;
pub mod requirement;
pub mod resource;
pub mod route;
pub mod sensor;
pub mod storage;
pub mod types;

// 重导出核心类型
pub use action::Action;
pub use actor::{Actor, ActorKind, WorkerProfile};
pub use constraint::{Constraint, ConstraintBound, ConstraintSet, ConstraintValue};
pub use error::{OmmError, OmmResult};
pub use job::{Allocation, Job};
pub use location::{path_length, Location, Position};
pub use mapping::EntityMapping;
pub use part::{Part, PartVolumeMode};
pub use product::Product;
pub use requirement::{Requirement, SpecValue};
pub use resource::{ConveyorDirection, Resource, ResourceVariant};
pub use route::Route;
pub use sensor::{Sensor, SensorReader, SensorReading};
pub use storage::{ItemKind, Storage, StoredItem};
pub use types::{
    ActionStatus, ActionType, JobPriority, JobStatus, LocationType, PartType, ProductionState,
    RequirementKind, ResourceStatus, ResourceType, StorageType, VehicleType,
};
