// crates/mf_config/src/source.rs

//! 配置源
//!
//! 一次读入整份 JSON 配置文档，各组件只按名称取出并反序列化自己的顶层节。
//! 节缺失时使用默认值，取出后立即校验。
//!
//! ```
//! use mf_config::{ConfigSource, GridSection};
//!
//! let source = ConfigSource::from_json_str(r#"{ "grid": { "itot": 16, "jtot": 8, "ktot": 4 } }"#).unwrap();
//! let grid: GridSection = source.section().unwrap();
//! assert_eq!(grid.itot, 16);
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;

/// 可从配置源取出的命名节
pub trait ConfigSection: DeserializeOwned + Default {
    /// 顶层节名
    const NAME: &'static str;

    /// 校验节内取值
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// 命名配置源
#[derive(Debug, Clone)]
pub struct ConfigSource {
    root: Value,
}

impl ConfigSource {
    /// 从 JSON 文件读取
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串读取
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let root: Value =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(root)
    }

    /// 从已解析的 JSON 值构造，顶层必须是对象
    pub fn from_value(root: Value) -> Result<Self, ConfigError> {
        if !root.is_object() {
            return Err(ConfigError::Parse("配置文档顶层必须是对象".into()));
        }
        Ok(Self { root })
    }

    /// 空配置，全部节使用默认值
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Default::default()),
        }
    }

    /// 取出并校验一个节
    pub fn section<T: ConfigSection>(&self) -> Result<T, ConfigError> {
        let section = match self.root.get(T::NAME) {
            Some(value) => serde_json::from_value::<T>(value.clone())
                .map_err(|e| ConfigError::Parse(format!("[{}] {}", T::NAME, e)))?,
            None => T::default(),
        };
        section.validate()?;
        Ok(section)
    }

    /// 写入一个节，替换已有内容
    pub fn set_section(&mut self, name: &str, value: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(name.to_string(), value);
        }
    }

    /// 不在已知列表中的顶层节名
    pub fn unknown_sections(&self, known: &[&str]) -> Vec<String> {
        match &self.root {
            Value::Object(map) => map
                .keys()
                .filter(|k| !known.contains(&k.as_str()))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{GridSection, TimeSection};
    use std::io::Write;

    #[test]
    fn test_missing_section_uses_default() {
        let source = ConfigSource::empty();
        let time: TimeSection = source.section().unwrap();
        assert_eq!(time.rkorder, 3);
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(matches!(
            ConfigSource::from_json_str("[1, 2]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_section() {
        let source = ConfigSource::from_json_str(r#"{ "grid": { "itot": "many" } }"#).unwrap();
        let err = source.section::<GridSection>().unwrap_err();
        assert!(err.to_string().contains("grid"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let source = ConfigSource::from_json_str(r#"{ "grid": { "itto": 4 } }"#).unwrap();
        assert!(source.section::<GridSection>().is_err());
    }

    #[test]
    fn test_validation_runs() {
        let source = ConfigSource::from_json_str(r#"{ "grid": { "itot": 0 } }"#).unwrap();
        assert!(matches!(
            source.section::<GridSection>(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "grid": {{ "itot": 12, "jtot": 6, "ktot": 3 }} }}"#).unwrap();
        let source = ConfigSource::from_file(file.path()).unwrap();
        let grid: GridSection = source.section().unwrap();
        assert_eq!((grid.itot, grid.jtot, grid.ktot), (12, 6, 3));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigSource::from_file("/nonexistent/microflow.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_unknown_sections() {
        let source = ConfigSource::from_json_str(r#"{ "grid": {}, "radiation": {} }"#).unwrap();
        assert_eq!(source.unknown_sections(&["grid"]), vec!["radiation".to_string()]);
    }
}
