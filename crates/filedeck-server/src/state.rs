//! Shared application state.

use std::sync::Arc;

use filedeck_kernel::{
    CommandSink, DiskFileCache, FileCache, HookRunner, MemoryFileCache, ResourceService,
    TracingSink, VirtualNamespace,
};

use crate::auth::UserDirectory;
use crate::config::{CacheConfig, ConfigError, ServerConfig};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResourceService>,
    pub users: Arc<UserDirectory>,
    /// Name of the header carrying the username.
    pub auth_header: Arc<str>,
}

impl AppState {
    pub fn new(service: ResourceService, users: UserDirectory, auth_header: &str) -> Self {
        Self {
            service: Arc::new(service),
            users: Arc::new(users),
            auth_header: Arc::from(auth_header.to_ascii_lowercase()),
        }
    }

    /// Wire up the service, cache, hooks and users described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let cache: Arc<dyn FileCache> = match &config.cache {
            CacheConfig::Memory => Arc::new(MemoryFileCache::new()),
            CacheConfig::Disk { dir } => Arc::new(DiskFileCache::new(dir)),
        };

        let mut hooks = HookRunner::new().with_sink(Arc::new(TracingSink));
        if config.hooks.enabled {
            hooks = hooks.with_sink(Arc::new(CommandSink::new(config.hooks.commands.clone())));
        }

        let service = ResourceService::new(
            cache,
            hooks,
            VirtualNamespace::new(config.virtual_ns.clone()),
        )
        .with_type_detection_by_header(config.type_detection_by_header);

        let users = UserDirectory::from_config(config)?;
        Ok(Self::new(service, users, &config.auth_header))
    }
}
