//! Request principals.
//!
//! Authentication happens in front of this server: a trusted proxy sets a
//! header naming the user, and the name is looked up in the static user
//! table from the config.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Arc;

use filedeck_kernel::{LocalBackend, Principal};

use crate::config::{ConfigError, ServerConfig};
use crate::error::ApiError;
use crate::state::AppState;

/// Known users, by name.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<String, Arc<Principal>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build principals for every configured user.
    ///
    /// Each user's scope directory is created under the data root.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let mut directory = Self::new();
        for user in &config.users {
            let scope = config.root.join(user.scope_dir());
            std::fs::create_dir_all(&scope).map_err(|source| ConfigError::Io {
                path: scope.clone(),
                source,
            })?;

            let fs = LocalBackend::new(&scope);
            let principal = Principal::new(&user.username, user.permissions.clone(), Arc::new(fs))
                .with_scope(scope.display().to_string())
                .with_rules(user.compile_rules()?)
                .with_hide_dotfiles(user.hide_dotfiles)
                .with_sorting(user.sorting);

            if directory.users.contains_key(&user.username) {
                return Err(ConfigError::DuplicateUser(user.username.clone()));
            }
            tracing::debug!(user = %user.username, scope = %scope.display(), "registered user");
            directory.insert(principal);
        }
        Ok(directory)
    }

    pub fn insert(&mut self, principal: Principal) {
        self.users
            .insert(principal.username.clone(), Arc::new(principal));
    }

    pub fn get(&self, username: &str) -> Option<Arc<Principal>> {
        self.users.get(username).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// The principal behind the current request.
pub struct Session(pub Arc<Principal>);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(&*state.auth_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        match state.users.get(username) {
            Some(principal) => Ok(Session(principal)),
            None => {
                tracing::debug!(user = %username, "unknown user");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
