//! 配置 - 用户偏好（键值存储）
//!
//! 默认位置 `~/.config/ha-notifier/config.json`，可用 `--config` 或环境变量
//! `HA_NOTIFIER_CONFIG` 覆盖。文件缺少的字段取默认值。

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::connection::{build_ws_url, Endpoint};

pub use crate::connection::ManagerConfig;

/// 覆盖配置路径的环境变量
pub const CONFIG_ENV: &str = "HA_NOTIFIER_CONFIG";

/// 配置目录 `~/.config/ha-notifier`
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ha-notifier")
}

/// 用户偏好
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// 局域网地址（优先用于服务调用）
    pub lan_url: String,
    /// 外网地址
    pub wan_url: String,
    /// 长期访问令牌
    pub token: String,
    /// 是否保持 WebSocket 连接
    pub ws_enabled: bool,
    /// WebSocket 优先使用局域网地址
    pub ws_prefer_lan: bool,
    /// 全屏弹出开关，仅保存；分发规则不读取（critical + popup 总是全屏）
    pub full_screen: bool,
    /// 常驻开关，仅保存；事件/模板的 persistent 优先
    pub persistent: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            lan_url: String::new(),
            wan_url: String::new(),
            token: String::new(),
            ws_enabled: false,
            ws_prefer_lan: true,
            full_screen: true,
            persistent: true,
        }
    }
}

impl std::fmt::Debug for Prefs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefs")
            .field("lan_url", &self.lan_url)
            .field("wan_url", &self.wan_url)
            .field("token", &redact(&self.token))
            .field("ws_enabled", &self.ws_enabled)
            .field("ws_prefer_lan", &self.ws_prefer_lan)
            .field("full_screen", &self.full_screen)
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// 令牌脱敏显示
pub fn redact(token: &str) -> &'static str {
    if token.trim().is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

impl Prefs {
    /// 服务调用地址：局域网优先，否则外网
    pub fn service_base_url(&self) -> Option<&str> {
        non_blank(&self.lan_url).or_else(|| non_blank(&self.wan_url))
    }

    /// WebSocket 地址：按 `ws_prefer_lan` 选择，空则退回另一个
    pub fn socket_base_url(&self) -> Option<&str> {
        let (preferred, other) = if self.ws_prefer_lan {
            (&self.lan_url, &self.wan_url)
        } else {
            (&self.wan_url, &self.lan_url)
        };
        non_blank(preferred).or_else(|| non_blank(other))
    }

    pub fn token(&self) -> Option<&str> {
        non_blank(&self.token)
    }

    /// 由偏好推导连接端点
    pub fn endpoint(&self) -> Option<Endpoint> {
        let url = build_ws_url(self.socket_base_url()?)?;
        Some(Endpoint::new(url, self.token().map(str::to_string)))
    }

    /// 按键名更新一个字段
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "lan_url" => self.lan_url = value.trim().to_string(),
            "wan_url" => self.wan_url = value.trim().to_string(),
            "token" => self.token = value.trim().to_string(),
            "ws_enabled" => self.ws_enabled = parse_bool(value)?,
            "ws_prefer_lan" => self.ws_prefer_lan = parse_bool(value)?,
            "full_screen" => self.full_screen = parse_bool(value)?,
            "persistent" => self.persistent = parse_bool(value)?,
            other => bail!(
                "Unknown config key '{}' (expected one of: {})",
                other,
                PREF_KEYS.join(", ")
            ),
        }
        Ok(())
    }
}

/// 可通过 `config set` 修改的键
pub const PREF_KEYS: &[&str] = &[
    "lan_url",
    "wan_url",
    "token",
    "ws_enabled",
    "ws_prefer_lan",
    "full_screen",
    "persistent",
];

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(anyhow!("Expected a boolean, got '{}'", other)),
    }
}

/// 偏好来源
pub trait PrefsSource: Send + Sync {
    fn load(&self) -> Result<Prefs>;
}

/// 固定快照（测试或命令行覆盖时使用）
impl PrefsSource for Prefs {
    fn load(&self) -> Result<Prefs> {
        Ok(self.clone())
    }
}

/// JSON 文件偏好存储
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 按优先级确定路径：显式参数 > 环境变量 > 默认位置
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        let path = explicit
            .or_else(|| {
                std::env::var(CONFIG_ENV)
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| config_dir().join("config.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 配置文件所在目录（模板与历史放在同一处）
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(config_dir)
    }

    /// 原子写入
    pub fn save(&self, prefs: &Prefs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(prefs)?)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// 修改一个键并保存
    pub fn set(&self, key: &str, value: &str) -> Result<Prefs> {
        let mut prefs = self.load()?;
        prefs.set(key, value)?;
        self.save(&prefs)?;
        Ok(prefs)
    }
}

impl PrefsSource for PrefsStore {
    fn load(&self) -> Result<Prefs> {
        if !self.path.exists() {
            return Ok(Prefs::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Prefs::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", self.path.display()))
    }
}
