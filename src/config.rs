use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::db::config::DbConfig;
use crate::models::{DEFAULT_QUEUE_LIMIT, MAX_QUEUE_LIMIT, MIN_QUEUE_LIMIT};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database: DbConfig,
    /// Queue size used when a request does not pass `limit`.
    pub default_queue_limit: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let default_queue_limit = std::env::var("REVIEW_DEFAULT_QUEUE_LIMIT")
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_QUEUE_LIMIT)
            .clamp(MIN_QUEUE_LIMIT, MAX_QUEUE_LIMIT);

        Self {
            host,
            port,
            log_level,
            database: DbConfig::from_env(),
            default_queue_limit,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
