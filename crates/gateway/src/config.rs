use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::FixedOffset;
use lai_auth::{LocalConfig, LocalOperator, RemoteConfig};
use lai_contracts::format::{DEFAULT_DISPLAY_OFFSET_MINUTES, display_zone};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    pub store_timeout_ms: u64,
    pub public_origin: String,
    pub display_zone: FixedOffset,
    pub auth: AuthConfig,
    pub login_rate_limit_per_window: u32,
    pub login_rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres {
        db_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub enum AuthConfig {
    Local(LocalConfig),
    Remote(RemoteConfig),
}

impl AuthConfig {
    pub fn is_remote(&self) -> bool {
        matches!(self, AuthConfig::Remote(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl StartupError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "ERR_INVALID_CONFIG",
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("LAI_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("LAI_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "LAI_BIND_ADDR",
        )?;

        let auth = parse_auth_config(kv)?;

        let dev_allow_nonlocal_bind =
            parse_bool(kv.get("LAI_DEV_ALLOW_NONLOCAL_BIND")).unwrap_or(false);

        if !bind_addr.ip().is_loopback()
            && !auth.is_remote()
            && !(dev_allow_nonlocal_bind && bind_addr.ip().is_unspecified())
        {
            return Err(StartupError {
                code: "ERR_NONLOCAL_BIND_REQUIRES_AUTH",
                message: "non-local bind requires remote auth mode; refuse startup".to_string(),
            });
        }

        let store = parse_store_config(kv)?;
        let store_timeout_ms =
            parse_u64(kv.get("LAI_STORE_TIMEOUT_MS"), 2000, "LAI_STORE_TIMEOUT_MS")?;
        if store_timeout_ms == 0 {
            return Err(StartupError::invalid("LAI_STORE_TIMEOUT_MS must be > 0"));
        }

        let public_origin = require_nonempty(kv, "LAI_PUBLIC_ORIGIN")?;
        if !(public_origin.starts_with("http://") || public_origin.starts_with("https://")) {
            return Err(StartupError::invalid(
                "LAI_PUBLIC_ORIGIN must start with http:// or https://",
            ));
        }
        let public_origin = public_origin.trim_end_matches('/').to_string();

        let offset_minutes = parse_i32(
            kv.get("LAI_DISPLAY_UTC_OFFSET_MINUTES"),
            DEFAULT_DISPLAY_OFFSET_MINUTES,
            "LAI_DISPLAY_UTC_OFFSET_MINUTES",
        )?;
        let display_zone = display_zone(offset_minutes).ok_or_else(|| {
            StartupError::invalid("LAI_DISPLAY_UTC_OFFSET_MINUTES must be within +/- 24h")
        })?;

        let login_rate_limit_per_window = parse_u32(
            kv.get("LAI_LOGIN_RATE_LIMIT_PER_WINDOW"),
            10,
            "LAI_LOGIN_RATE_LIMIT_PER_WINDOW",
        )?;
        let login_rate_limit_window_secs = parse_u64(
            kv.get("LAI_LOGIN_RATE_LIMIT_WINDOW_SECS"),
            60,
            "LAI_LOGIN_RATE_LIMIT_WINDOW_SECS",
        )?;
        if login_rate_limit_window_secs == 0 {
            return Err(StartupError::invalid(
                "LAI_LOGIN_RATE_LIMIT_WINDOW_SECS must be > 0",
            ));
        }

        Ok(Self {
            bind_addr,
            store,
            store_timeout_ms,
            public_origin,
            display_zone,
            auth,
            login_rate_limit_per_window,
            login_rate_limit_window_secs,
        })
    }
}

fn parse_store_config(kv: &HashMap<String, String>) -> Result<StoreConfig, StartupError> {
    let mode = kv
        .get("LAI_STORE_MODE")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("postgres");

    match mode {
        "postgres" => {
            let db_url = require_nonempty(kv, "LAI_DB_URL")?;
            let max_connections = parse_u32(
                kv.get("LAI_DB_MAX_CONNECTIONS"),
                8,
                "LAI_DB_MAX_CONNECTIONS",
            )?;
            if max_connections == 0 {
                return Err(StartupError::invalid("LAI_DB_MAX_CONNECTIONS must be >= 1"));
            }
            Ok(StoreConfig::Postgres {
                db_url,
                max_connections,
            })
        }
        "memory" => Ok(StoreConfig::Memory),
        _ => Err(StartupError::invalid(
            "LAI_STORE_MODE must be postgres or memory",
        )),
    }
}

fn parse_auth_config(kv: &HashMap<String, String>) -> Result<AuthConfig, StartupError> {
    let mode = kv
        .get("LAI_AUTH_MODE")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("local");

    match mode {
        "local" => {
            let secret = require_nonempty(kv, "LAI_LOCAL_AUTH_SECRET")?;
            if secret.len() < 32 {
                return Err(StartupError::invalid(
                    "LAI_LOCAL_AUTH_SECRET must be at least 32 bytes",
                ));
            }

            let operators = require_nonempty(kv, "LAI_LOCAL_OPERATORS")?
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(LocalOperator::parse)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    StartupError::invalid(format!("LAI_LOCAL_OPERATORS: {}", err.message))
                })?;
            if operators.is_empty() {
                return Err(StartupError {
                    code: "ERR_MISSING_CONFIG",
                    message: "LAI_LOCAL_OPERATORS must list at least one operator".to_string(),
                });
            }

            let session_ttl_secs =
                parse_u64(kv.get("LAI_SESSION_TTL_SECS"), 3600, "LAI_SESSION_TTL_SECS")?;
            if session_ttl_secs == 0 {
                return Err(StartupError::invalid("LAI_SESSION_TTL_SECS must be > 0"));
            }

            Ok(AuthConfig::Local(LocalConfig {
                secret,
                operators,
                session_ttl: Duration::from_secs(session_ttl_secs),
            }))
        }
        "remote" => {
            let base_url = require_nonempty(kv, "LAI_IDENTITY_URL")?;
            let api_key = require_nonempty(kv, "LAI_IDENTITY_API_KEY")?;
            let timeout_ms = parse_u64(
                kv.get("LAI_IDENTITY_TIMEOUT_MS"),
                2000,
                "LAI_IDENTITY_TIMEOUT_MS",
            )?;
            Ok(AuthConfig::Remote(RemoteConfig {
                base_url,
                api_key,
                timeout: Duration::from_millis(timeout_ms),
            }))
        }
        _ => Err(StartupError::invalid("LAI_AUTH_MODE must be local or remote")),
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    kv.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| StartupError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        })
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse::<SocketAddr>().map_err(|_| {
            StartupError::invalid(format!("{} must be a valid host:port socket address", key))
        }),
    }
}

fn parse_number<T: std::str::FromStr>(
    value: Option<&String>,
    default: T,
    key: &'static str,
) -> Result<T, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| StartupError::invalid(format!("{} must be an integer", key))),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    parse_number(value, default, key)
}

fn parse_u32(value: Option<&String>, default: u32, key: &'static str) -> Result<u32, StartupError> {
    parse_number(value, default, key)
}

fn parse_i32(value: Option<&String>, default: i32, key: &'static str) -> Result<i32, StartupError> {
    parse_number(value, default, key)
}

fn parse_bool(value: Option<&String>) -> Option<bool> {
    let value = value.map(|v| v.trim()).filter(|v| !v.is_empty())?;

    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
