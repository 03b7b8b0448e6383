use crate::domain::ports::ConfigProvider;
use crate::utils::error::{DashboardError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub origin: String,
    pub timeout_seconds: u64,
    pub allowed_origins: Vec<String>,
    pub default_headers: BTreeMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080/api/".to_string(),
            timeout_seconds: 30,
            allowed_origins: Vec::new(),
            default_headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 設定後 CLI 經由遠端 dashboard 的 /api/proxy 呼叫
    pub proxy_endpoint: Option<String>,
    pub auth_token: Option<String>,
    pub page_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_endpoint: None,
            auth_token: None,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn env_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

impl DashboardConfig {
    pub fn with_upstream(origin: &str) -> Self {
        let mut config = Self::default();
        config.upstream.origin = origin.to_string();
        config
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DashboardError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| DashboardError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        // 未設定的環境變數不當作 token 送出
        if let Some(token) = &config.client.auth_token {
            if env_placeholder().is_match(token) || token.trim().is_empty() {
                tracing::warn!("client.auth_token is unresolved, requests will be unauthenticated");
                config.client.auth_token = None;
            }
        }

        Ok(config)
    }

    /// 替換環境變數 (例如 ${CMS_TOKEN})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_placeholder()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        // 空值或未替換的 ${VAR} 視為沒有設定
        let origin = self.upstream.origin.trim();
        if origin.is_empty() || env_placeholder().is_match(origin) {
            return Err(DashboardError::MissingConfigError {
                field: "upstream.origin".to_string(),
            });
        }
        validation::validate_url("upstream.origin", &self.upstream.origin)?;
        for origin in &self.upstream.allowed_origins {
            validation::validate_url("upstream.allowed_origins", origin)?;
        }
        validation::validate_socket_addr("server.bind", &self.server.bind)?;
        validation::validate_positive_number(
            "upstream.timeout_seconds",
            self.upstream.timeout_seconds as usize,
            1,
        )?;
        validation::validate_positive_number("client.page_size", self.client.page_size as usize, 1)?;

        if let Some(endpoint) = &self.client.proxy_endpoint {
            validation::validate_url("client.proxy_endpoint", endpoint)?;
        }

        for (name, value) in &self.upstream.default_headers {
            validation::validate_header("upstream.default_headers", name, value)?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(DashboardError::InvalidConfigValueError {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: format!("Unsupported level. Valid levels: {}", valid_levels.join(", ")),
            });
        }

        Ok(())
    }
}

impl ConfigProvider for DashboardConfig {
    fn upstream_origin(&self) -> &str {
        &self.upstream.origin
    }

    fn allowed_origins(&self) -> &[String] {
        &self.upstream.allowed_origins
    }

    fn default_headers(&self) -> Vec<(String, String)> {
        self.upstream
            .default_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    fn bind_address(&self) -> &str {
        &self.server.bind
    }

    fn proxy_endpoint(&self) -> Option<&str> {
        self.client.proxy_endpoint.as_deref()
    }

    fn auth_token(&self) -> Option<&str> {
        self.client.auth_token.as_deref()
    }

    fn page_size(&self) -> u64 {
        self.client.page_size
    }
}

impl Validate for DashboardConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
