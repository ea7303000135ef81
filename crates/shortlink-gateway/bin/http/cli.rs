use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "SHORTLINK_LISTEN_ADDR";
pub const PUBLIC_BASE_URL_ENV: &str = "SHORTLINK_PUBLIC_BASE_URL";
pub const COORDINATION_BACKEND_ENV: &str = "SHORTLINK_COORDINATION_BACKEND";
pub const CACHE_BACKEND_ENV: &str = "SHORTLINK_CACHE_BACKEND";
pub const STORAGE_BACKEND_ENV: &str = "SHORTLINK_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "SHORTLINK_REDIS_URL";
pub const MYSQL_DSN_ENV: &str = "SHORTLINK_MYSQL_DSN";
pub const COUNTER_KEY_ENV: &str = "SHORTLINK_COUNTER_KEY";
pub const COUNTER_INITIAL_BASE_ENV: &str = "SHORTLINK_COUNTER_INITIAL_BASE";
pub const RANGE_SIZE_ENV: &str = "SHORTLINK_RANGE_SIZE";
pub const REFILL_ATTEMPTS_ENV: &str = "SHORTLINK_REFILL_ATTEMPTS";
pub const COORDINATION_TIMEOUT_MS_ENV: &str = "SHORTLINK_COORDINATION_TIMEOUT_MS";
pub const STORE_TIMEOUT_MS_ENV: &str = "SHORTLINK_STORE_TIMEOUT_MS";
pub const CACHE_TIMEOUT_MS_ENV: &str = "SHORTLINK_CACHE_TIMEOUT_MS";
pub const CACHE_TTL_SECS_ENV: &str = "SHORTLINK_CACHE_TTL_SECS";
pub const CACHE_CAPACITY_ENV: &str = "SHORTLINK_CACHE_CAPACITY";
pub const IDENTITY_HEADER_ENV: &str = "SHORTLINK_IDENTITY_HEADER";
pub const VISIT_BUFFER_ENV: &str = "SHORTLINK_VISIT_BUFFER";
pub const LOG_FORMAT_ENV: &str = "SHORTLINK_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_COUNTER_KEY: &str = "shortlink:counter";
pub const DEFAULT_COUNTER_INITIAL_BASE: u64 = 0;
pub const DEFAULT_RANGE_SIZE: u64 = 100_000;
pub const DEFAULT_REFILL_ATTEMPTS: u32 = 5;
pub const DEFAULT_COORDINATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 200;
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";
pub const DEFAULT_VISIT_BUFFER: u32 = 1024;

/// Backends for the coordination store and the URL cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SharedBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for SharedBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SharedBackendArg::InMemory => write!(f, "in-memory"),
            SharedBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "shortlink-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix for the short URLs returned to clients.
    #[arg(long, env = PUBLIC_BASE_URL_ENV, default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    #[arg(
        long,
        env = COORDINATION_BACKEND_ENV,
        value_enum,
        default_value_t = SharedBackendArg::InMemory
    )]
    pub coordination: SharedBackendArg,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = SharedBackendArg::InMemory
    )]
    pub cache: SharedBackendArg,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(
        long,
        env = REDIS_URL_ENV,
        required_if_eq_any([("coordination", "redis"), ("cache", "redis")])
    )]
    pub redis_url: Option<String>,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = COUNTER_KEY_ENV, default_value = DEFAULT_COUNTER_KEY)]
    pub counter_key: String,

    /// Value the counter node is created with if it does not exist yet.
    #[arg(long, env = COUNTER_INITIAL_BASE_ENV, default_value_t = DEFAULT_COUNTER_INITIAL_BASE)]
    pub counter_initial_base: u64,

    #[arg(
        long,
        env = RANGE_SIZE_ENV,
        default_value_t = DEFAULT_RANGE_SIZE,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub range_size: u64,

    #[arg(
        long,
        env = REFILL_ATTEMPTS_ENV,
        default_value_t = DEFAULT_REFILL_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub refill_attempts: u32,

    #[arg(long, env = COORDINATION_TIMEOUT_MS_ENV, default_value_t = DEFAULT_COORDINATION_TIMEOUT_MS)]
    pub coordination_timeout_ms: u64,

    #[arg(long, env = STORE_TIMEOUT_MS_ENV, default_value_t = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,

    #[arg(long, env = CACHE_TIMEOUT_MS_ENV, default_value_t = DEFAULT_CACHE_TIMEOUT_MS)]
    pub cache_timeout_ms: u64,

    /// Expire cache entries after this many seconds. Unset keeps them until overwritten.
    #[arg(long, env = CACHE_TTL_SECS_ENV)]
    pub cache_ttl_secs: Option<u64>,

    /// Entry limit for the in-memory cache.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: u64,

    #[arg(long, env = IDENTITY_HEADER_ENV, default_value = DEFAULT_IDENTITY_HEADER)]
    pub identity_header: String,

    #[arg(
        long,
        env = VISIT_BUFFER_ENV,
        default_value_t = DEFAULT_VISIT_BUFFER,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub visit_buffer: u32,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}
