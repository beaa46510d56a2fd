// ==========================================
// 开放制造模型 (OMM) - 配置管理器
// ==========================================
// 职责: 编排策略配置的加载、查询、覆写、快照
// 存储: 内存 key-value (global scope)
// 来源优先级: 默认值 < JSON 配置文件 < 环境变量 (OMM_*)
// ==========================================

use crate::domain::error::{OmmError, OmmResult};
use crate::domain::part::PartVolumeMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "OMM_";

/// 快照中的元信息键前缀（恢复时跳过）
const META_PREFIX: &str = "__meta_";

// ==========================================
// 策略枚举
// ==========================================

/// 作业启动时自动开工的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoStartPolicy {
    /// 仅第一个就绪工序
    FirstReady,
    /// 全部就绪工序
    AllReady,
}

impl AutoStartPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FIRST_READY" => Some(AutoStartPolicy::FirstReady),
            "ALL_READY" => Some(AutoStartPolicy::AllReady),
            _ => None,
        }
    }
}

/// 资源分配释放策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleasePolicy {
    /// 工序完成后需显式释放（取消时总是释放）
    Explicit,
    /// 工序完成时自动释放
    OnActionEnd,
}

impl ReleasePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EXPLICIT" => Some(ReleasePolicy::Explicit),
            "ON_ACTION_END" => Some(ReleasePolicy::OnActionEnd),
            _ => None,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug)]
pub struct ConfigManager {
    values: RwLock<BTreeMap<String, String>>,
}

impl ConfigManager {
    /// 创建带默认值的配置管理器
    pub fn new() -> Self {
        let defaults = config_keys::ALL
            .iter()
            .map(|key| (key.to_string(), default_value(key).to_string()))
            .collect();
        Self {
            values: RwLock::new(defaults),
        }
    }

    /// 从 JSON 文件加载（文件值覆盖默认值）
    pub fn from_file(path: impl AsRef<Path>) -> OmmResult<Self> {
        let manager = Self::new();
        manager.load_file(path)?;
        Ok(manager)
    }

    /// 默认值 + 文件（可选）+ 环境变量
    pub fn load(path: Option<&Path>) -> OmmResult<Self> {
        let manager = Self::new();
        if let Some(path) = path {
            manager.load_file(path)?;
        }
        manager.apply_env_overrides()?;
        Ok(manager)
    }

    /// 读取配置文件
    ///
    /// # 格式
    /// `{"job.auto_start_policy": "ALL_READY", "resource.single_occupant_slots": 2}`
    ///
    /// # 返回
    /// - Ok(usize): 写入的配置项数量
    pub fn load_file(&self, path: impl AsRef<Path>) -> OmmResult<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let parsed: BTreeMap<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("配置文件不是 JSON 对象: {}", path.display()))?;

        let mut entries = BTreeMap::new();
        for (key, value) in parsed {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(OmmError::ConfigError {
                        key,
                        message: format!("不支持的取值类型: {}", other),
                    })
                }
            };
            entries.insert(key, text);
        }
        let count = self.set_many(entries)?;
        tracing::info!(path = %path.display(), count, "配置文件已加载");
        Ok(count)
    }

    /// 应用环境变量覆写（如 OMM_JOB_AUTO_START_POLICY）
    pub fn apply_env_overrides(&self) -> OmmResult<usize> {
        self.apply_overrides(std::env::vars())
    }

    /// 应用给定的 (变量名, 值) 覆写,忽略非 OMM_ 前缀和未知变量
    pub fn apply_overrides<I>(&self, vars: I) -> OmmResult<usize>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries = BTreeMap::new();
        for (name, value) in vars {
            if !name.starts_with(ENV_PREFIX) {
                continue;
            }
            if let Some(key) = config_keys::ALL.iter().find(|key| env_var_name(key) == name) {
                entries.insert(key.to_string(), value);
            }
        }
        let count = self.set_many(entries)?;
        if count > 0 {
            tracing::info!(count, "已应用环境变量配置覆写");
        }
        Ok(count)
    }

    // ===== 读写 =====

    /// 读取配置值
    pub fn get_value(&self, key: &str) -> OmmResult<Option<String>> {
        let values = self.read_values()?;
        Ok(values.get(key).cloned())
    }

    /// 写入单个配置值（校验后写入）
    pub fn set_value(&self, key: &str, value: &str) -> OmmResult<()> {
        validate_entry(key, value)?;
        let mut values = self.write_values()?;
        values.insert(key.to_string(), value.trim().to_string());
        tracing::debug!(key, value, "配置已更新");
        Ok(())
    }

    /// 批量写入: 全部校验通过后才生效
    fn set_many(&self, entries: BTreeMap<String, String>) -> OmmResult<usize> {
        for (key, value) in &entries {
            validate_entry(key, value)?;
        }
        let mut values = self.write_values()?;
        let count = entries.len();
        for (key, value) in entries {
            values.insert(key, value.trim().to_string());
        }
        Ok(count)
    }

    // ===== 类型化读取 =====

    pub fn auto_start_policy(&self) -> OmmResult<AutoStartPolicy> {
        let raw = self.required(config_keys::JOB_AUTO_START_POLICY)?;
        AutoStartPolicy::from_str(&raw).ok_or_else(|| invalid(config_keys::JOB_AUTO_START_POLICY, &raw))
    }

    pub fn release_policy(&self) -> OmmResult<ReleasePolicy> {
        let raw = self.required(config_keys::ALLOCATION_RELEASE_POLICY)?;
        ReleasePolicy::from_str(&raw).ok_or_else(|| invalid(config_keys::ALLOCATION_RELEASE_POLICY, &raw))
    }

    pub fn part_volume_mode(&self) -> OmmResult<PartVolumeMode> {
        let raw = self.required(config_keys::STORAGE_PART_VOLUME_MODE)?;
        PartVolumeMode::from_str(&raw).ok_or_else(|| invalid(config_keys::STORAGE_PART_VOLUME_MODE, &raw))
    }

    pub fn single_occupant_slots(&self) -> OmmResult<u32> {
        let raw = self.required(config_keys::RESOURCE_SINGLE_OCCUPANT_SLOTS)?;
        parse_slots(&raw).ok_or_else(|| invalid(config_keys::RESOURCE_SINGLE_OCCUPANT_SLOTS, &raw))
    }

    // ===== 快照 =====

    /// 导出配置快照 (JSON,键有序)
    pub fn get_config_snapshot(&self) -> OmmResult<String> {
        let values = self.read_values()?;
        Ok(serde_json::to_string(&*values)?)
    }

    /// 从快照恢复（跳过 __meta_ 键;任一项非法则整体不生效）
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> OmmResult<usize> {
        let snapshot: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;
        let entries: BTreeMap<String, String> = snapshot
            .into_iter()
            .filter(|(key, _)| !key.starts_with(META_PREFIX))
            .collect();
        self.set_many(entries)
    }

    fn required(&self, key: &str) -> OmmResult<String> {
        self.get_value(key)?
            .ok_or_else(|| OmmError::ConfigError {
                key: key.to_string(),
                message: "缺少配置项".to_string(),
            })
    }

    fn read_values(&self) -> OmmResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.values
            .read()
            .map_err(|e| OmmError::LockPoisoned(format!("配置读锁: {}", e)))
    }

    fn write_values(&self) -> OmmResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        self.values
            .write()
            .map_err(|e| OmmError::LockPoisoned(format!("配置写锁: {}", e)))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 配置键对应的环境变量名
pub fn env_var_name(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.replace('.', "_").to_uppercase())
}

fn default_value(key: &str) -> &'static str {
    match key {
        config_keys::JOB_AUTO_START_POLICY => "FIRST_READY",
        config_keys::ALLOCATION_RELEASE_POLICY => "EXPLICIT",
        config_keys::STORAGE_PART_VOLUME_MODE => "PER_BATCH",
        config_keys::RESOURCE_SINGLE_OCCUPANT_SLOTS => "1",
        _ => "",
    }
}

fn parse_slots(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|slots| *slots >= 1)
}

fn invalid(key: &str, value: &str) -> OmmError {
    OmmError::ConfigError {
        key: key.to_string(),
        message: format!("非法取值: {}", value),
    }
}

fn validate_entry(key: &str, value: &str) -> OmmResult<()> {
    let valid = match key {
        config_keys::JOB_AUTO_START_POLICY => AutoStartPolicy::from_str(value).is_some(),
        config_keys::ALLOCATION_RELEASE_POLICY => ReleasePolicy::from_str(value).is_some(),
        config_keys::STORAGE_PART_VOLUME_MODE => PartVolumeMode::from_str(value).is_some(),
        config_keys::RESOURCE_SINGLE_OCCUPANT_SLOTS => parse_slots(value).is_some(),
        _ => {
            return Err(OmmError::ConfigError {
                key: key.to_string(),
                message: "未知配置项".to_string(),
            })
        }
    };
    if valid {
        Ok(())
    } else {
        Err(invalid(key, value))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 作业启动: FIRST_READY | ALL_READY
    pub const JOB_AUTO_START_POLICY: &str = "job.auto_start_policy";

    // 分配释放: EXPLICIT | ON_ACTION_END
    pub const ALLOCATION_RELEASE_POLICY: &str = "allocation.release_policy";

    // 零件体积计量: PER_BATCH | PER_UNIT
    pub const STORAGE_PART_VOLUME_MODE: &str = "storage.part_volume_mode";

    // 工具/机械臂默认槽位
    pub const RESOURCE_SINGLE_OCCUPANT_SLOTS: &str = "resource.single_occupant_slots";

    pub const ALL: &[&str] = &[
        JOB_AUTO_START_POLICY,
        ALLOCATION_RELEASE_POLICY,
        STORAGE_PART_VOLUME_MODE,
        RESOURCE_SINGLE_OCCUPANT_SLOTS,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigManager::new();
        assert_eq!(config.auto_start_policy().unwrap(), AutoStartPolicy::FirstReady);
        assert_eq!(config.release_policy().unwrap(), ReleasePolicy::Explicit);
        assert_eq!(config.part_volume_mode().unwrap(), PartVolumeMode::PerBatch);
        assert_eq!(config.single_occupant_slots().unwrap(), 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ConfigManager::new();
        assert!(matches!(
            config.set_value(config_keys::RESOURCE_SINGLE_OCCUPANT_SLOTS, "0"),
            Err(OmmError::ConfigError { .. })
        ));
        assert!(matches!(
            config.set_value("job.unknown", "x"),
            Err(OmmError::ConfigError { .. })
        ));
        config.set_value(config_keys::JOB_AUTO_START_POLICY, "all_ready").unwrap();
        assert_eq!(config.auto_start_policy().unwrap(), AutoStartPolicy::AllReady);
    }

    #[test]
    fn test_overrides_use_env_naming() {
        assert_eq!(
            env_var_name(config_keys::ALLOCATION_RELEASE_POLICY),
            "OMM_ALLOCATION_RELEASE_POLICY"
        );
        let config = ConfigManager::new();
        let applied = config
            .apply_overrides(vec![
                ("OMM_ALLOCATION_RELEASE_POLICY".to_string(), "ON_ACTION_END".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("OMM_UNRELATED".to_string(), "1".to_string()),
            ])
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(config.release_policy().unwrap(), ReleasePolicy::OnActionEnd);
    }

    #[test]
    fn test_snapshot_restore_is_all_or_nothing() {
        let config = ConfigManager::new();
        let snapshot = config.get_config_snapshot().unwrap();
        config.set_value(config_keys::STORAGE_PART_VOLUME_MODE, "PER_UNIT").unwrap();

        let bad = r#"{"storage.part_volume_mode":"PER_BATCH","resource.single_occupant_slots":"zero"}"#;
        assert!(config.restore_config_from_snapshot(bad).is_err());
        assert_eq!(config.part_volume_mode().unwrap(), PartVolumeMode::PerUnit);

        config.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(config.part_volume_mode().unwrap(), PartVolumeMode::PerBatch);
    }
}
