use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub database: DatabaseConfig,
    pub images: ImageConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// `syncano` or `memory`.
    pub provider: String,
    pub base_url: String,
    pub instance: String,
    pub api_key: Option<String>,
    pub class_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            base_url: "https://api.syncano.io".to_string(),
            instance: String::new(),
            api_key: None,
            class_name: "photo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/selfie.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub jpeg_quality: u8,
    pub cache_fetched: bool,
    pub memory_cache_entries: usize,
    pub persist_cache: bool,
    pub persist_cache_entries: i64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: crate::codec::DEFAULT_JPEG_QUALITY,
            cache_fetched: true,
            memory_cache_entries: 64,
            persist_cache: true,
            persist_cache_entries: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub slots: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { slots: 12 }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("SELFIE").separator("__"));
    let cfg = settings.build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    if app.backend.api_key.is_none() {
        app.backend.api_key = std::env::var("SYNCANO_API_KEY").ok();
    }
    Ok(app)
}
