use std::env;

/// Which record store backs the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub store_backend: StoreBackend,
    /// Shared secret signing session and remember-me cookies.
    pub remember_me_key: String,
    pub remember_me_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub default_page_size: u32,
    pub seed_demo_patients: bool,
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "hospital-registry".to_string(),
            store_backend: StoreBackend::DynamoDb,
            remember_me_key: "uniqueAndSecret".to_string(),
            remember_me_ttl_secs: 86400,
            session_ttl_secs: 1800,
            default_page_size: 4,
            seed_demo_patients: false,
            secure_cookies: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("dynamodb") | Err(_) => StoreBackend::DynamoDb,
            Ok(other) => {
                tracing::warn!("Unknown STORE_BACKEND {}, using dynamodb", other);
                StoreBackend::DynamoDb
            }
        };

        Self {
            table_name: env::var("TABLE_NAME").unwrap_or(defaults.table_name),
            store_backend,
            remember_me_key: env::var("REMEMBER_ME_KEY").unwrap_or(defaults.remember_me_key),
            remember_me_ttl_secs: parse_var("REMEMBER_ME_TTL_SECS", defaults.remember_me_ttl_secs),
            session_ttl_secs: parse_var("SESSION_TTL_SECS", defaults.session_ttl_secs),
            default_page_size: parse_var("DEFAULT_PAGE_SIZE", defaults.default_page_size),
            seed_demo_patients: parse_var("SEED_DEMO_PATIENTS", defaults.seed_demo_patients),
            secure_cookies: parse_var("SECURE_COOKIES", defaults.secure_cookies),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={}", name, raw);
            default
        }),
        Err(_) => default,
    }
}
