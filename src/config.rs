use std::{path::PathBuf, time::Duration};

use anyhow::Context;

/// Which `UserRepo` adapter backs the CRUD core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORE_BACKEND {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub upload_dir: PathBuf,
    pub public_prefix: String,
    pub max_upload_bytes: usize,
    pub optimize: bool,
    pub keep_original: bool,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub workers: usize,
    pub process_timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            public_prefix: "/uploads".into(),
            max_upload_bytes: 10 * 1024 * 1024,
            optimize: true,
            keep_original: false,
            max_dimension: 800,
            jpeg_quality: 80,
            workers: 4,
            process_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub images: ImageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORE_BACKEND") {
            Some(v) => v.parse::<StoreBackend>()?,
            None => StoreBackend::Postgres,
        };

        let database = DatabaseConfig {
            backend,
            database_url: lookup("DATABASE_URL"),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            mongo_uri: lookup("MONGO_URI"),
            mongo_database: lookup("MONGO_DATABASE").unwrap_or_else(|| "userdesk".into()),
        };

        match database.backend {
            StoreBackend::Postgres if database.database_url.is_none() => {
                anyhow::bail!("DATABASE_URL is required for the postgres backend")
            }
            StoreBackend::Mongo if database.mongo_uri.is_none() => {
                anyhow::bail!("MONGO_URI is required for the mongo backend")
            }
            _ => {}
        }

        let defaults = ImageConfig::default();
        let public_prefix = lookup("UPLOAD_PUBLIC_PREFIX")
            .map(|p| normalize_prefix(&p))
            .unwrap_or(defaults.public_prefix);
        anyhow::ensure!(
            public_prefix != "/",
            "UPLOAD_PUBLIC_PREFIX must name a path below the root"
        );

        let jpeg_quality: u8 = parse_or(&lookup, "IMAGE_JPEG_QUALITY", defaults.jpeg_quality)?;
        anyhow::ensure!(
            (1..=100).contains(&jpeg_quality),
            "IMAGE_JPEG_QUALITY must be within 1..=100"
        );
        let max_dimension: u32 = parse_or(&lookup, "IMAGE_MAX_DIMENSION", defaults.max_dimension)?;
        anyhow::ensure!(max_dimension > 0, "IMAGE_MAX_DIMENSION must be positive");

        let images = ImageConfig {
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_prefix,
            max_upload_bytes: parse_or(&lookup, "UPLOAD_MAX_BYTES", defaults.max_upload_bytes)?,
            optimize: parse_bool_or(&lookup, "IMAGE_OPTIMIZE", defaults.optimize)?,
            keep_original: parse_bool_or(&lookup, "IMAGE_KEEP_ORIGINAL", defaults.keep_original)?,
            max_dimension,
            jpeg_quality,
            workers: parse_or(&lookup, "IMAGE_WORKERS", defaults.workers)?.max(1),
            process_timeout: Duration::from_secs(parse_or(
                &lookup,
                "IMAGE_TIMEOUT_SECS",
                defaults.process_timeout.as_secs(),
            )?),
        };

        Ok(Self { database, images })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => anyhow::bail!("invalid boolean for {}: {:?}", key, other),
    }
}

// "/uploads/" and "uploads" both become "/uploads"
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    format!("/{}", trimmed)
}
