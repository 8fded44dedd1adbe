use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use pw_core::character::CharacterRepository;
use pw_core::config::AppConfig;
use pw_core::platform::{Platform, PlatformEnv};
use pw_core::telemetry::DevConsoleConfig;
use pw_infrastructure::{
    ConfigService, FileBundleStore, FileCharacterRepository, PwPaths, TomlSettingsStore,
};
use pw_interaction::{PlatformSources, StaticBridge, create_platform};

/// File the Perchance bridge document is read from, inside the lists directory.
const PERCHANCE_DOCUMENT: &str = "perchance.json";

/// Everything a command needs, wired from config and flags.
pub struct CliContext {
    pub config: AppConfig,
    pub repository: Arc<dyn CharacterRepository>,
    pub platform: Arc<dyn Platform>,
    pub settings: Arc<TomlSettingsStore>,
    pub bundle_store: Arc<FileBundleStore>,
}

impl CliContext {
    /// Loads `config.toml` and builds the providers. `data_dir` and `env`
    /// override the config file.
    pub async fn load(data_dir: Option<&Path>, env: Option<&str>) -> Result<Self> {
        let mut paths = PwPaths::new(data_dir);
        let config_service = ConfigService::default_location(&paths)?;
        let config = config_service.load().context("Failed to load config.toml")?;
        tracing::debug!("Loaded config from {}", config_service.path().display());
        if data_dir.is_none() {
            if let Some(configured) = &config.data_dir {
                paths = PwPaths::new(Some(configured.as_path()));
            }
        }

        let env = env.map(str::to_string).unwrap_or_else(|| config.environment.to_string());
        let lists_dir = paths.lists_dir()?;
        let bridge = StaticBridge::load(&lists_dir.join(PERCHANCE_DOCUMENT))
            .await
            .context("Failed to read the Perchance bridge document")?;
        let platform = create_platform(
            &PlatformEnv::explicit(env),
            PlatformSources::new(&lists_dir).with_bridge(Arc::new(bridge)),
        );

        Ok(Self {
            repository: Arc::new(FileCharacterRepository::default_location(&paths)?),
            settings: Arc::new(TomlSettingsStore::default_location(&paths)?),
            bundle_store: Arc::new(FileBundleStore::default_location(&paths)?),
            platform,
            config,
        })
    }

    /// Console settings: persisted values over the config file defaults.
    pub async fn dev_console_config(&self) -> Result<DevConsoleConfig> {
        Ok(DevConsoleConfig::load(self.settings.as_ref(), self.config.dev_console.clone()).await?)
    }
}
