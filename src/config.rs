use std::path::PathBuf;
use std::time::Duration;

/// Origin value that disables the cross-origin restriction.
pub const ANY_ORIGIN: &str = "*";

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server listen port.
    pub port: u16,
    /// Server bind host.
    pub host: String,
    /// The single origin allowed to make cross-origin requests and open
    /// WebSocket connections. `*` allows any origin.
    pub allowed_origin: String,
    /// Directory of static client assets served as the router fallback.
    pub static_dir: Option<PathBuf>,
    /// Whether a `leaveRoom` event removes the sender from the room.
    /// When false the event is accepted and ignored, and membership lasts
    /// until disconnect.
    pub honor_leave: bool,
    /// How often a WebSocket Ping is sent to each client.
    pub heartbeat_interval: Duration,
    /// How long a client may stay silent (no frame of any kind, Pong
    /// included) before it is disconnected. Also bounds a single write.
    pub client_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            host: var("HOST").unwrap_or(defaults.host),
            allowed_origin: var("ALLOWED_ORIGIN")
                .map(|v| normalize_origin(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.allowed_origin),
            static_dir: var("STATIC_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            honor_leave: var("RELAY_HONOR_LEAVE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.honor_leave),
            heartbeat_interval: var("RELAY_HEARTBEAT_INTERVAL_MS")
                .and_then(|v| parse_millis(&v))
                .unwrap_or(defaults.heartbeat_interval),
            client_timeout: var("RELAY_CLIENT_TIMEOUT_MS")
                .and_then(|v| parse_millis(&v))
                .unwrap_or(defaults.client_timeout),
        }
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address a local health check should connect to. Wildcard bind hosts
    /// are reached through loopback.
    pub fn health_check_addr(&self) -> String {
        match self.host.as_str() {
            "0.0.0.0" | "" => format!("127.0.0.1:{}", self.port),
            "::" | "[::]" => format!("[::1]:{}", self.port),
            host => format!("{host}:{}", self.port),
        }
    }

    /// True when every origin is accepted.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origin == ANY_ORIGIN
    }

    /// Check a request's `Origin` header value against the configured origin.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allows_any_origin() || normalize_origin(origin) == self.allowed_origin
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 3089,
            host: "0.0.0.0".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            static_dir: None,
            honor_leave: true,
            heartbeat_interval: Duration::from_secs(25),
            client_timeout: Duration::from_secs(45),
        }
    }
}

/// Browsers send origins without a trailing slash; configured values often
/// carry one.
fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_string()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_millis(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
