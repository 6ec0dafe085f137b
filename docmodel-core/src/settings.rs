//! Connection settings.
//!
//! Settings map connection aliases to database descriptions and are usually
//! loaded from JSON:
//!
//! ```ignore
//! let settings = Settings::from_json_str(r#"{
//!     "databases": {
//!         "default": { "engine": "mongodb", "name": "bands", "host": "db.local" },
//!         "scratch": { "engine": "memory", "name": "scratch" }
//!     },
//!     "collections_prefix": "test"
//! }"#)?;
//! ```
//!
//! Upper-case keys (`ENGINE`, `NAME`, `TEST_NAME`, ...) are accepted as well.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_COLLECTIONS_PREFIX: &str = "test";
pub const TEST_NAME_PREFIX: &str = "test_";

fn default_collections_prefix() -> String {
    DEFAULT_COLLECTIONS_PREFIX.to_string()
}

/// The kind of store behind a connection alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Memory,
    Mongodb,
    /// Any engine that is not a document store.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(alias = "ENGINE")]
    pub engine: Engine,
    #[serde(default, alias = "NAME")]
    pub name: Option<String>,
    #[serde(default, alias = "HOST")]
    pub host: Option<String>,
    #[serde(default, alias = "PORT")]
    pub port: Option<u16>,
    #[serde(default, alias = "USER")]
    pub user: Option<String>,
    #[serde(default, alias = "PASSWORD")]
    pub password: Option<String>,
    #[serde(default, alias = "TEST_NAME")]
    pub test_name: Option<String>,
}

impl DatabaseSettings {
    pub fn new(engine: Engine, name: impl Into<String>) -> Self {
        Self {
            engine,
            name: Some(name.into()),
            host: None,
            port: None,
            user: None,
            password: None,
            test_name: None,
        }
    }

    /// The database name. Missing or empty names are a configuration error.
    pub fn name(&self) -> DocumentStoreResult<&str> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(DocumentStoreError::ImproperlyConfigured(
                r#"Missing "name" key in database settings"#.to_string(),
            )),
        }
    }

    /// The database used while testing, `test_<name>` unless configured.
    pub fn test_name(&self) -> DocumentStoreResult<String> {
        match self.test_name.as_deref() {
            Some(test_name) if !test_name.is_empty() => Ok(test_name.to_string()),
            _ => Ok(format!("{TEST_NAME_PREFIX}{}", self.name()?)),
        }
    }

    /// Builds `mongodb://[user:password@]host:port/name`.
    ///
    /// Credentials are only included when both user and password are set.
    pub fn connection_uri(&self) -> DocumentStoreResult<String> {
        let name = self.name()?;
        let host = self.host.as_deref().filter(|host| !host.is_empty()).unwrap_or(DEFAULT_HOST);
        let port = self.port.unwrap_or(DEFAULT_PORT);

        let credentials = match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                format!("{user}:{password}@")
            }
            _ => String::new(),
        };

        Ok(format!("mongodb://{credentials}{host}:{port}/{name}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, alias = "DATABASES")]
    pub databases: BTreeMap<String, DatabaseSettings>,
    /// Collections whose name starts with this prefix may be dropped by test helpers.
    #[serde(default = "default_collections_prefix", alias = "COLLECTIONS_PREFIX")]
    pub collections_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            databases: BTreeMap::new(),
            collections_prefix: default_collections_prefix(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, alias: impl Into<String>, database: DatabaseSettings) -> Self {
        self.databases.insert(alias.into(), database);
        self
    }

    pub fn from_json_str(json: &str) -> DocumentStoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DocumentStoreError::ImproperlyConfigured(format!("Invalid settings: {e}")))
    }

    pub fn database(&self, alias: &str) -> DocumentStoreResult<&DatabaseSettings> {
        self.databases.get(alias).ok_or_else(|| {
            DocumentStoreError::ImproperlyConfigured(format!("The connection '{alias}' doesn't exist"))
        })
    }

    /// The same settings with every database renamed to its test database.
    pub fn for_tests(&self) -> DocumentStoreResult<Self> {
        let mut databases = BTreeMap::new();

        for (alias, database) in &self.databases {
            let mut renamed = database.clone();
            renamed.name = Some(database.test_name()?);
            databases.insert(alias.clone(), renamed);
        }

        Ok(Self {
            databases,
            collections_prefix: self.collections_prefix.clone(),
        })
    }
}
