// ==========================================
// 开放制造模型 (OMM) - 实体映射（序列化层）
// ==========================================
// 职责: 实体 ⇄ 确定性键值映射 (serde_json::Value)
// 约束: 映射键按字典序输出; 重建时重新执行不变量校验
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// 实体映射 Trait
///
/// 为后续请求/响应 API 提供统一的序列化入口
pub trait EntityMapping: Serialize + DeserializeOwned + Sized {
    /// 实体名称（用于错误信息与日志）
    const ENTITY: &'static str;

    /// 校验实体不变量
    fn validate(&self) -> OmmResult<()>;

    /// 实体 → 映射
    fn to_mapping(&self) -> OmmResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 映射 → 实体（重建后校验不变量）
    fn from_mapping(mapping: Value) -> OmmResult<Self> {
        let entity: Self = serde_json::from_value(mapping)?;
        entity.validate()?;
        Ok(entity)
    }
}

// ==========================================
// 通用参数校验
// ==========================================

/// 校验名称非空
pub fn ensure_not_blank(field: &str, value: &str) -> OmmResult<()> {
    if value.trim().is_empty() {
        return Err(OmmError::validation(format!("{} 不能为空", field)));
    }
    Ok(())
}

/// 校验数值非负且有限
pub fn ensure_non_negative(field: &str, value: f64) -> OmmResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(OmmError::validation(format!(
            "{} 必须为非负有限数值, 实际={}",
            field, value
        )));
    }
    Ok(())
}

/// 校验百分比 (0-100)
pub fn ensure_percentage(field: &str, value: f64) -> OmmResult<()> {
    ensure_non_negative(field, value)?;
    if value > 100.0 {
        return Err(OmmError::validation(format!(
            "{} 必须位于 0-100 之间, 实际={}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_guards() {
        assert!(ensure_non_negative("quantity", 0.0).is_ok());
        assert!(ensure_non_negative("quantity", -0.1).is_err());
        assert!(ensure_non_negative("quantity", f64::NAN).is_err());
        assert!(ensure_percentage("progress", 100.0).is_ok());
        assert!(ensure_percentage("progress", 100.5).is_err());
        assert!(ensure_not_blank("name", "  ").is_err());
    }
}
