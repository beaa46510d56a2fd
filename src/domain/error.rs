// ==========================================
// 开放制造模型 (OMM) - 编排核心错误类型
// ==========================================
// 工具: thiserror 派生宏
// 原则: 失败的变更不会部分生效,实体保持原有有效状态
// ==========================================

use thiserror::Error;

/// 编排核心错误类型
///
/// 所有错误均为本地同步错误,内部不重试、不吞掉;重试策略由调用方决定
#[derive(Error, Debug)]
pub enum OmmError {
    // ===== 构造/参数错误 =====
    #[error("参数校验失败: {0}")]
    ValidationError(String),

    // ===== 引用错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} with id={id}")]
    AlreadyExists { entity: String, id: String },

    // ===== 状态机错误 =====
    #[error("无效的状态转换: {entity} from={from} to={to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    // ===== 容量错误 =====
    #[error("容量超限: {entity} id={id}, requested={requested}, available={available}")]
    CapacityExceeded {
        entity: String,
        id: String,
        requested: f64,
        available: f64,
    },

    // ===== 需求/作业错误 =====
    #[error("需求未满足: action_id={action_id}, missing={missing:?}")]
    RequirementUnsatisfied {
        action_id: String,
        missing: Vec<String>,
    },

    #[error("作业存在未完成工序: job_id={job_id}, remaining={remaining:?}")]
    IncompleteActions {
        job_id: String,
        remaining: Vec<String>,
    },

    // ===== 基础设施错误 =====
    #[error("锁获取失败: {0}")]
    LockPoisoned(String),

    #[error("配置错误 (key={key}): {message}")]
    ConfigError { key: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OmmError {
    /// 构造 NotFound 错误
    pub fn not_found(entity: &str, id: &str) -> Self {
        OmmError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 构造 AlreadyExists 错误
    pub fn already_exists(entity: &str, id: &str) -> Self {
        OmmError::AlreadyExists {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 构造 InvalidTransition 错误
    pub fn invalid_transition(
        entity: &str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        OmmError::InvalidTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// 构造 ValidationError
    pub fn validation(message: impl Into<String>) -> Self {
        OmmError::ValidationError(message.into())
    }
}

impl From<serde_json::Error> for OmmError {
    fn from(err: serde_json::Error) -> Self {
        OmmError::ValidationError(format!("映射解析失败: {}", err))
    }
}

/// Result 类型别名
pub type OmmResult<T> = Result<T, OmmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = OmmError::not_found("Storage", "S-1");
        assert_eq!(err.to_string(), "记录未找到: Storage with id=S-1");

        let err = OmmError::invalid_transition("Job", "COMPLETED", "CANCELLED");
        assert!(err.to_string().contains("from=COMPLETED"));
        assert!(err.to_string().contains("to=CANCELLED"));
    }
}
