use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub api: ApiConfig,
    pub storage: StorageSettings,
    pub market: MarketSettings,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// "memory" or "rocksdb" (the latter requires the `rocksdb` feature).
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSettings {
    pub page_size: usize,
}

/// One category with its subcategories, seeding the static directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: String,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "taskbay-node".to_string(),
                data_dir: PathBuf::from("./data"),
            },
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageSettings {
                backend: "memory".to_string(),
            },
            market: MarketSettings { page_size: 10 },
            categories: vec![
                CategoryEntry {
                    id: "cleaning".to_string(),
                    subcategories: vec!["deep-clean".to_string(), "windows".to_string()],
                },
                CategoryEntry {
                    id: "handyman".to_string(),
                    subcategories: vec!["assembly".to_string(), "painting".to_string()],
                },
                CategoryEntry {
                    id: "garden".to_string(),
                    subcategories: vec!["lawn".to_string()],
                },
                CategoryEntry {
                    id: "moving".to_string(),
                    subcategories: vec![],
                },
            ],
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<Self> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(self.clone())
    }

    /// Load from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                anyhow::bail!("config file {} does not exist", p.display())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
