use crate::error::{Result, StockroomError};
use crate::model::permission::PermissionCatalogue;
use std::{env, path::PathBuf};

/// Initializes and Holds envrionment variable settings which
/// control system behavior. Panics if any required setting
/// is not set or cannot be parsed.
#[derive(Debug)]
pub struct EnvConfigSettings {
    pub rest_url: String,
    pub rest_port: String,
    pub db_url: String,
    /// Header set by the authenticating proxy naming the requesting user.
    pub user_header: String,
    /// Catalogue file, the bundled catalogue is used when unset.
    pub permission_catalogue_file: Option<PathBuf>,
    /// Outcome of a permission no holder decides.
    pub default_allow: bool,
    pub tree_max_depth: usize,
    pub tree_cache_enabled: bool,
    pub public_base_url: String,
}

impl EnvConfigSettings {
    pub fn init() -> Self {
        let rest_url = env::var("REST_SERVICE_URL").expect("REST_SERVICE_URL must be set");
        let rest_port = env::var("REST_SERVICE_PORT").expect("REST_SERVICE_PORT must be set");
        let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let user_header = env::var("USER_HEADER").unwrap_or("X-Stockroom-User".to_string());
        let permission_catalogue_file = env::var("PERMISSION_CATALOGUE_FILE").ok().map(PathBuf::from);

        let ResolutionSettings {
            default_allow,
            tree_max_depth,
        } = ResolutionSettings::from_env().unwrap_or_else(|e| panic!("{e}"));

        let tree_cache_enabled = env::var("TREE_CACHE_ENABLED")
            .unwrap_or("true".to_string())
            .parse::<bool>()
            .expect("Unable to parse TREE_CACHE_ENABLED configuration as boolean!");

        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or("http://localhost:8080/".to_string());

        Self {
            rest_url,
            rest_port,
            db_url,
            user_header,
            permission_catalogue_file,
            default_allow,
            tree_max_depth,
            tree_cache_enabled,
            public_base_url,
        }
    }

    /// Loads and validates the configured permission catalogue.
    pub fn load_catalogue(&self) -> Result<PermissionCatalogue> {
        match &self.permission_catalogue_file {
            Some(path) => PermissionCatalogue::from_file(path),
            None => PermissionCatalogue::bundled(),
        }
    }
}

/// The settings that decide how permissions and hierarchies resolve. Shared by
/// the server and `stockctl` so both explain permissions identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSettings {
    pub default_allow: bool,
    pub tree_max_depth: usize,
}

impl ResolutionSettings {
    /// Reads `DEFAULT_PERMISSION` (default `deny`) and `TREE_MAX_DEPTH`
    /// (default 64).
    pub fn from_env() -> Result<Self> {
        Self::parse(
            env::var("DEFAULT_PERMISSION").ok().as_deref(),
            env::var("TREE_MAX_DEPTH").ok().as_deref(),
        )
    }

    pub fn parse(default_permission: Option<&str>, tree_max_depth: Option<&str>) -> Result<Self> {
        let default_allow = match default_permission.unwrap_or("deny") {
            "allow" => true,
            "deny" => false,
            other => {
                return Err(StockroomError::Configuration(format!(
                    "DEFAULT_PERMISSION must be 'allow' or 'deny', got '{other}'"
                )))
            }
        };
        let tree_max_depth = tree_max_depth
            .unwrap_or("64")
            .parse::<usize>()
            .map_err(|_| {
                StockroomError::Configuration(
                    "Unable to parse TREE_MAX_DEPTH configuration as an integer!".to_string(),
                )
            })?;
        Ok(Self {
            default_allow,
            tree_max_depth,
        })
    }
}
