pub mod auth;
pub mod model;
pub mod repository;
pub mod types;

use std::sync::Arc;

pub use auth::{AccountApi, AccountService, ProfileUpdate, Session};
pub use model::{Model, PhotoApi};
pub use repository::{FileStorage, KeyValueStorage, MemoryStorage, Repository};

/// Remote endpoints and paging, overridable through the environment.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub photo_base_url: String,
    pub auth_base_url: String,
    pub access_key: String,
    pub page_size: u32,
    /// Size of the side-loaded collections strip
    pub collections_strip_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            photo_base_url: "https://api.unsplash.com".to_string(),
            auth_base_url: "https://dummyjson.com".to_string(),
            access_key: String::new(),
            page_size: 20,
            collections_strip_size: 5,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            photo_base_url: var_or("APERTURE_PHOTO_API", &defaults.photo_base_url),
            auth_base_url: var_or("APERTURE_AUTH_API", &defaults.auth_base_url),
            access_key: var_or("APERTURE_ACCESS_KEY", ""),
            page_size: var_or("APERTURE_PAGE_SIZE", "20")
                .parse()
                .unwrap_or(defaults.page_size),
            collections_strip_size: defaults.collections_strip_size,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

/// Everything a screen needs: the photo API, the auth collaborator, and the
/// persistence layer. Cheap to clone, collaborators are shared.
#[derive(Clone)]
pub struct Environment {
    pub model: Arc<dyn PhotoApi>,
    pub accounts: Arc<dyn AccountApi>,
    pub repository: Repository,
    pub config: ApiConfig,
}

impl Environment {
    pub fn new(config: ApiConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self, String> {
        let repository = Repository::new(storage);
        let model = Model::new(&config.photo_base_url, &config.access_key)?;
        let accounts = AccountService::new(&config.auth_base_url, repository.clone())?;
        Ok(Self {
            model: Arc::new(model),
            accounts: Arc::new(accounts),
            repository,
            config,
        })
    }

    /// Assemble an environment from explicit collaborators. This is the seam
    /// tests use to inject canned photo and auth services.
    pub fn with_collaborators(
        model: Arc<dyn PhotoApi>,
        accounts: Arc<dyn AccountApi>,
        repository: Repository,
        config: ApiConfig,
    ) -> Self {
        Self {
            model,
            accounts,
            repository,
            config,
        }
    }
}

pub fn setup_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}
