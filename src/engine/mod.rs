// ==========================================
// 开放制造模型 (OMM) - 引擎层
// ==========================================
// 职责: 状态机、需求匹配、容量管理、库存台账与作业编排
// 红线: 引擎不持有外部 I/O,传感器读取由调用方提供
// ==========================================

pub mod capacity_manager;
pub mod events;
pub mod inventory_ledger;
pub mod orchestrator;
pub mod registry;
pub mod requirement_matcher;
pub mod state_machine;

// 重导出核心引擎
pub use capacity_manager::{CapacityManager, ResourceUtilization};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, OrchestratorEvent, OrchestratorEventPublisher,
    OrchestratorEventType,
};
pub use inventory_ledger::{InventoryLedger, StockShortage, Withdrawal};
pub use orchestrator::{DeferredAction, JobOrchestrator, JobStartReport};
pub use registry::Registry;
pub use requirement_matcher::{MatchContext, MatchOutcome, RequirementMatcher};
pub use state_machine::StateMachine;
