//! Server configuration
//!
//! Loaded from `BOOKSHELF_*` environment variables with sensible defaults,
//! so the server starts with no configuration at all.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub shelf: ShelfConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port (`BOOKSHELF_PORT`)
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ShelfConfig {
    /// Directory holding `books.json` and catalog PDFs (`BOOKSHELF_DIR`)
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Rendered-page LRU capacity (`BOOKSHELF_RASTER_CACHE`)
    pub raster_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 3000 },
            shelf: ShelfConfig {
                dir: PathBuf::from("./books"),
            },
            cache: CacheConfig {
                raster_cache_size: 100,
            },
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    /// Build configuration from the environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Self {
            server: ServerConfig {
                port: parse_var("BOOKSHELF_PORT")?.unwrap_or(defaults.server.port),
            },
            shelf: ShelfConfig {
                dir: std::env::var("BOOKSHELF_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.shelf.dir),
            },
            cache: CacheConfig {
                raster_cache_size: parse_var("BOOKSHELF_RASTER_CACHE")?
                    .unwrap_or(defaults.cache.raster_cache_size),
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}
