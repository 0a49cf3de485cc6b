use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub explode: ExplodeConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DGNX_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("DGNX_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 炸开（explode）流程的全局策略。
#[derive(Debug, Clone, Deserialize)]
pub struct ExplodeConfig {
    /// 索引色是否提升为真彩色（需调色板中存在对应条目）。
    #[serde(default)]
    pub promote_indexed_colors: bool,
    /// 进程级“强制填充”基线值。
    #[serde(default)]
    pub force_fill: bool,
    /// 形（shape）按三维实体方式导入，触发着色模式的细分精度。
    #[serde(default)]
    pub shapes_as_solids: bool,
    /// 细分偏差 = 包围盒对角线 / 该除数。
    #[serde(default = "ExplodeConfig::default_deviation_divisor")]
    pub deviation_divisor: f64,
    /// 未设置偏差时，整圆离散化使用的分段数。
    #[serde(default = "ExplodeConfig::default_curve_segments")]
    pub curve_segments: u32,
    #[serde(default = "ExplodeConfig::default_fallback_font")]
    pub fallback_font: String,
    #[serde(default = "ExplodeConfig::default_layer")]
    pub default_layer: String,
}

impl ExplodeConfig {
    fn default_deviation_divisor() -> f64 {
        2000.0
    }

    fn default_curve_segments() -> u32 {
        64
    }

    fn default_fallback_font() -> String {
        "txt".to_string()
    }

    fn default_layer() -> String {
        "0".to_string()
    }
}

impl Default for ExplodeConfig {
    fn default() -> Self {
        Self {
            promote_indexed_colors: false,
            force_fill: false,
            shapes_as_solids: false,
            deviation_divisor: Self::default_deviation_divisor(),
            curve_segments: Self::default_curve_segments(),
            fallback_font: Self::default_fallback_font(),
            default_layer: Self::default_layer(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
