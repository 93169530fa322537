//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::compiler::OrSemantics;
use crate::parser::DEFAULT_MAX_DEPTH;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 过滤器的完整配置, 所有字段都有默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// OR 分组内子句的组合方式
    pub or_semantics: OrSemantics,
    /// 同一个参数同时带有过滤条件、and 列表、or 列表中的多个时是否报错
    pub strict_group_tags: bool,
    /// 括号嵌套的最大深度
    pub max_nesting_depth: usize,
    pub schema: SchemaConfig,
    pub optimization: OptimizationConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            or_semantics: OrSemantics::default(),
            strict_group_tags: false,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
            schema: SchemaConfig::default(),
            optimization: OptimizationConfig::default(),
        }
    }
}

/// SQL 表结构映射
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub revision_table: String,
    pub bucket_table: String,
    pub metadata_table: String,
    /// 逻辑列名到数据库列名的映射, 未配置的列使用逻辑名本身
    pub columns: HashMap<String, String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            revision_table: "catalog_object_revision".to_string(),
            bucket_table: "bucket".to_string(),
            metadata_table: "metadata".to_string(),
            columns: HashMap::new(),
        }
    }
}

impl SchemaConfig {
    /// 获取逻辑列对应的数据库列名
    pub fn column(&self, logical: &str) -> String {
        self.columns
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    }
}

/// SQL 优化配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// 同一字段的等值 OR 条件达到该数量时转换为 IN
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

impl FilterConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        let config: FilterConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_ref.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 检查配置取值是否合理
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid("max_nesting_depth 必须大于 0".to_string()));
        }
        if self.optimization.max_or_conditions_for_in < 2 {
            return Err(ConfigError::Invalid(
                "optimization.max_or_conditions_for_in 必须至少为 2".to_string(),
            ));
        }
        Ok(())
    }
}
