use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_login_attempts: i32,
    pub lock_minutes: i64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("WARDEN_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid WARDEN_HOST: {e}"))?;

        let port: u16 = env_or("WARDEN_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid WARDEN_PORT: {e}"))?;

        let allowed_origins: Vec<String> = env_or("WARDEN_ALLOWED_ORIGINS", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .collect();

        let max_login_attempts: i32 = env_or("WARDEN_MAX_LOGIN_ATTEMPTS", "5")
            .parse()
            .map_err(|e| format!("Invalid WARDEN_MAX_LOGIN_ATTEMPTS: {e}"))?;

        let lock_minutes: i64 = env_or("WARDEN_LOCK_MINUTES", "30")
            .parse()
            .map_err(|e| format!("Invalid WARDEN_LOCK_MINUTES: {e}"))?;

        let log_level = env_or("WARDEN_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            allowed_origins,
            max_login_attempts,
            lock_minutes,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
