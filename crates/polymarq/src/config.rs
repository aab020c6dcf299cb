// Config is the one place runtime settings are read from the environment.
// Every knob has a POLYMARQ_ name and, where older deployments used one, a bare fallback.

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub api_addr: Option<String>,
    pub migrate_on_startup: bool,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub max_requested_pings: i64,
    pub ping_ttl_hours: i64,
    pub maintenance_interval_secs: u64,
    pub default_page_size: i64,

    pub paystack: PaystackConfig,
}

#[derive(Clone, Debug)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub subaccount_percentage_fee: f64,
    pub max_retries: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let api_addr = match env_or_fallback("POLYMARQ_API_ADDR", "API_ADDR") {
            Some(v) => normalize_optional_addr(&v),
            None => Some("0.0.0.0:8080".to_string()),
        };

        let migrate_on_startup = env_bool("POLYMARQ_MIGRATE_ON_STARTUP").unwrap_or(false);

        let db_max_connections = env_parse("POLYMARQ_DB_MAX_CONNECTIONS", "DB_MAX_CONNECTIONS")
            .unwrap_or(8);
        let db_acquire_timeout_secs =
            env_parse("POLYMARQ_DB_ACQUIRE_TIMEOUT_SECS", "DB_ACQUIRE_TIMEOUT_SECS").unwrap_or(10);

        let max_requested_pings =
            env_parse("POLYMARQ_MAX_REQUESTED_PINGS", "MAX_REQUESTED_PINGS").unwrap_or(3);
        let ping_ttl_hours = env_parse("POLYMARQ_PING_TTL_HOURS", "PING_TTL_HOURS").unwrap_or(24);
        let maintenance_interval_secs =
            env_parse("POLYMARQ_MAINTENANCE_INTERVAL_SECS", "MAINTENANCE_INTERVAL_SECS")
                .unwrap_or(60);
        let default_page_size =
            env_parse("POLYMARQ_DEFAULT_PAGE_SIZE", "DEFAULT_PAGE_SIZE").unwrap_or(20);

        let paystack = PaystackConfig {
            secret_key: std::env::var("PAYSTACK_SECRET_KEY").unwrap_or_default(),
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://api.paystack.co".to_string()),
            subaccount_percentage_fee: std::env::var("PAYSTACK_SUBACCOUNT_PERCENTAGE_FEE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10.0),
            max_retries: env_parse("POLYMARQ_GATEWAY_MAX_RETRIES", "GATEWAY_MAX_RETRIES")
                .unwrap_or(3),
        };

        if paystack.secret_key.is_empty() {
            tracing::warn!("PAYSTACK_SECRET_KEY is empty; gateway calls and webhooks will fail");
        }

        Ok(Self {
            database_url,
            api_addr,
            migrate_on_startup,
            db_max_connections,
            db_acquire_timeout_secs,
            max_requested_pings,
            ping_ttl_hours,
            maintenance_interval_secs,
            default_page_size,
            paystack,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parse<T: std::str::FromStr>(primary: &str, fallback: &str) -> Option<T> {
    env_or_fallback(primary, fallback).and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::normalize_optional_addr;

    #[test]
    fn api_addr_can_be_switched_off() {
        assert_eq!(normalize_optional_addr("off"), None);
        assert_eq!(normalize_optional_addr("  "), None);
        assert_eq!(
            normalize_optional_addr(" 127.0.0.1:9000 "),
            Some("127.0.0.1:9000".to_string())
        );
    }
}
