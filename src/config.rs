use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::error::TalevecError;

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

pub const DEFAULT_DIMENSIONS: usize = 384;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Deserialize)]
pub struct TalevecConfig {
    pub index_path: Option<String>,
    pub store_path: Option<String>,
    pub dimensions: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub embed_batch_size: Option<usize>,
    pub summary_chars: Option<usize>,
    pub max_relations: Option<usize>,
}

impl TalevecConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(TalevecConfig {
            index_path: config.get("index_path").ok(),
            store_path: config.get("store_path").ok(),
            dimensions: config.get("dimensions").ok(),
            chunk_size: config.get("chunk_size").ok(),
            chunk_overlap: config.get("chunk_overlap").ok(),
            top_k: config.get("top_k").ok(),
            embed_batch_size: config.get("embed_batch_size").ok(),
            summary_chars: config.get("summary_chars").ok(),
            max_relations: config.get("max_relations").ok(),
        })
    }
}

/// Resolved runtime settings shared by the build and query paths.
#[derive(Debug, Clone)]
pub struct State {
    pub index_path: PathBuf,
    pub store_path: PathBuf,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub summary_chars: usize,
    pub max_relations: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("story_index.tvx"),
            store_path: PathBuf::from("story_store.bin"),
            dimensions: DEFAULT_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_batch_size: 32,
            summary_chars: 500,
            max_relations: 3,
        }
    }
}

impl State {
    /// Reads `talevec_config.*` (optional) and `TALEVEC_*` environment variables.
    pub fn new() -> Result<Self, TalevecError> {
        let mut config = Config::default();
        #[allow(deprecated)]
        {
            config
                .merge(ConfigFile::with_name("talevec_config").required(false))
                .map_err(|e| TalevecError::InvalidConfig(e.to_string()))?;
            config
                .merge(Environment::with_prefix("TALEVEC"))
                .map_err(|e| TalevecError::InvalidConfig(e.to_string()))?;
        }
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self, TalevecError> {
        let raw = TalevecConfig::try_from(config)
            .map_err(|e| TalevecError::InvalidConfig(e.to_string()))?;
        let defaults = Self::default();

        let state = Self {
            index_path: raw
                .index_path
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            store_path: raw
                .store_path
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            dimensions: raw.dimensions.unwrap_or(defaults.dimensions),
            chunk_size: raw.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: raw.chunk_overlap.unwrap_or(defaults.chunk_overlap),
            top_k: raw.top_k.unwrap_or(defaults.top_k),
            embed_batch_size: raw.embed_batch_size.unwrap_or(defaults.embed_batch_size),
            summary_chars: raw.summary_chars.unwrap_or(defaults.summary_chars),
            max_relations: raw.max_relations.unwrap_or(defaults.max_relations),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), TalevecError> {
        if self.dimensions == 0 {
            return Err(TalevecError::InvalidConfig(
                "TALEVEC_DIMENSIONS must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(TalevecError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(TalevecError::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(TalevecError::InvalidConfig(
                "embed_batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn print_config(&self) {
        println!("index_path={}", self.index_path.display());
        println!("store_path={}", self.store_path.display());
        println!("dimensions={}", self.dimensions);
        println!("chunk_size={}", self.chunk_size);
        println!("chunk_overlap={}", self.chunk_overlap);
        println!("top_k={}", self.top_k);
        println!("embed_batch_size={}", self.embed_batch_size);
        println!("summary_chars={}", self.summary_chars);
        println!("max_relations={}", self.max_relations);
    }
}

/// `TALEVEC_VERBOSE=true` raises the default log level to debug.
pub fn verbose_requested() -> bool {
    env::var("TALEVEC_VERBOSE").unwrap_or_else(|_| "false".to_string()) == "true"
}
