//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TRIPFLOW__*` 覆盖（双下划线表示嵌套，
//! 如 `TRIPFLOW__LLM__MODEL=gpt-4o`）。配置在进程启动时加载一次，之后只读。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agents: AgentsSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// [llm] 段：后端选择、模型与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai（兼容端点）/ mock；无 API Key 时自动回退 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// [agents] 段：各阶段推理循环的迭代上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    pub researcher_max_iterations: usize,
    /// Budget 阶段只需较少迭代
    pub budget_max_iterations: usize,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            researcher_max_iterations: 5,
            budget_max_iterations: 3,
        }
    }
}

/// [tools] 段：工具超时与外部数据源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub geocode: GeocodeSection,
    #[serde(default)]
    pub places: PlacesSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            geocode: GeocodeSection::default(),
            places: PlacesSection::default(),
        }
    }
}

/// [tools.geocode] 段：Nominatim 地理编码端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodeSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeocodeSection {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [tools.places] 段：OpenTripMap 景点搜索端点
///
/// API Key 不直接写进配置文件，api_key_env 指定存放 Key 的环境变量名。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacesSection {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// 以城市坐标为圆心的搜索半径（公里）
    pub search_radius_km: u32,
    /// 单次搜索返回的景点数上限
    pub max_attractions: usize,
}

impl Default for PlacesSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.opentripmap.com/0.1/en".to_string(),
            api_key_env: "OPENTRIPMAP_API_KEY".to_string(),
            timeout_secs: 15,
            search_radius_km: 10,
            max_attractions: 15,
        }
    }
}

/// [server] 段：HTTP 监听端口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            agents: AgentsSection::default(),
            tools: ToolsSection::default(),
            server: ServerSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TRIPFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TRIPFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TRIPFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agents.researcher_max_iterations, 5);
        assert_eq!(cfg.agents.budget_max_iterations, 3);
        assert_eq!(cfg.tools.geocode.timeout_secs, 10);
        assert_eq!(cfg.tools.places.timeout_secs, 15);
        assert_eq!(cfg.server.port, 8000);
    }
}
