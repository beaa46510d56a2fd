// ==========================================
// 开放制造模型 (OMM) - 状态机
// ==========================================
// 四个相互独立的生命周期状态机:
// - ActionStatus / JobStatus / ProductionState / ResourceStatus
// 规则: 边之外的转换一律返回 InvalidTransition,不做修正
// 同状态自转换不是合法边
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::types::{ActionStatus, JobStatus, ProductionState, ResourceStatus};
use std::fmt;

/// 状态机 Trait
pub trait StateMachine: Copy + PartialEq + fmt::Display + Sized + 'static {
    /// 状态机名称（错误信息中使用）
    const NAME: &'static str;

    /// 全部状态
    fn states() -> &'static [Self];

    /// 是否存在 self → to 的边
    fn can_transition_to(&self, to: Self) -> bool;

    /// 执行转换
    fn transition(&self, to: Self) -> OmmResult<Self> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(OmmError::invalid_transition(Self::NAME, *self, to))
        }
    }

    /// 当前状态可达的后继状态
    fn successors(&self) -> Vec<Self> {
        Self::states()
            .iter()
            .copied()
            .filter(|to| self.can_transition_to(*to))
            .collect()
    }
}

// ==========================================
// ActionStatus
// ==========================================
// DRAFT → REQUESTED → CONFIRMED → IN_PROGRESS → COMPLETED
// 非终态 → CANCELLED
impl StateMachine for ActionStatus {
    const NAME: &'static str = "ActionStatus";

    fn states() -> &'static [Self] {
        ActionStatus::ALL
    }

    fn can_transition_to(&self, to: Self) -> bool {
        use ActionStatus::*;
        matches!(
            (*self, to),
            (Draft, Requested) | (Requested, Confirmed) | (Confirmed, InProgress) | (InProgress, Completed)
        ) || (to == Cancelled && !self.is_terminal())
    }
}

// ==========================================
// JobStatus
// ==========================================
// PLANNED → IN_PROGRESS ⇄ ON_HOLD; IN_PROGRESS → COMPLETED
// PLANNED / IN_PROGRESS / ON_HOLD → CANCELLED
impl StateMachine for JobStatus {
    const NAME: &'static str = "JobStatus";

    fn states() -> &'static [Self] {
        JobStatus::ALL
    }

    fn can_transition_to(&self, to: Self) -> bool {
        use JobStatus::*;
        matches!(
            (*self, to),
            (Planned, InProgress)
                | (InProgress, OnHold)
                | (OnHold, InProgress)
                | (InProgress, Completed)
                | (Planned, Cancelled)
                | (InProgress, Cancelled)
                | (OnHold, Cancelled)
        )
    }
}

// ==========================================
// ProductionState
// ==========================================
// RAW/NEW → WORK_IN_PROGRESS → FINISHED
// 任意 → DEFECTIVE / ON_HOLD; DEFECTIVE / ON_HOLD → WORK_IN_PROGRESS
impl StateMachine for ProductionState {
    const NAME: &'static str = "ProductionState";

    fn states() -> &'static [Self] {
        ProductionState::ALL
    }

    fn can_transition_to(&self, to: Self) -> bool {
        use ProductionState::*;
        if *self == to {
            return false;
        }
        match to {
            Defective | OnHold => true,
            WorkInProgress => matches!(*self, Raw | New | Defective | OnHold),
            Finished => *self == WorkInProgress,
            Raw | New => false,
        }
    }
}

// ==========================================
// ResourceStatus
// ==========================================
// IDLE ⇄ WAIT ⇄ {WORKING, LOAD, UNLOAD}
// 任意 → FAILED; FAILED → IDLE（恢复）
// IDLE ⇄ CHARGING（仅车辆,由 Resource 额外校验）
impl StateMachine for ResourceStatus {
    const NAME: &'static str = "ResourceStatus";

    fn states() -> &'static [Self] {
        ResourceStatus::ALL
    }

    fn can_transition_to(&self, to: Self) -> bool {
        use ResourceStatus::*;
        if *self == to {
            return false;
        }
        match (*self, to) {
            (_, Failed) => true,
            (Failed, Idle) => true,
            (Idle, Wait) | (Wait, Idle) => true,
            (Wait, Working | Load | Unload) | (Working | Load | Unload, Wait) => true,
            (Idle, Charging) | (Charging, Idle) => true,
            _ => false,
        }
    }
}
