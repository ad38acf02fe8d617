use std::net::SocketAddr;

use crate::error::{ConsoleError, ConsoleResult};
use crate::store::{PgStore, Store};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Process settings, read from the environment (and `.env`) at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used without one
    pub database_url: Option<String>,
    pub bind_address: SocketAddr,
    /// The one origin allowed to call the API; any origin if unset
    pub allowed_origin: Option<String>,
    /// Emit logs as JSON lines instead of text
    pub log_json: bool,
    /// Where the playground sends its queries
    pub playground_endpoint: String,
}

impl Config {
    pub fn from_env() -> ConsoleResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConsoleResult<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_address = non_empty("BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned())
            .parse::<SocketAddr>()
            .map_err(|err| ConsoleError::Config(format!("BIND_ADDRESS is invalid: {}", err)))?;
        let log_json = match non_empty("LOG_JSON").as_deref() {
            None | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConsoleError::Config(format!(
                    "LOG_JSON must be true or false, not {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            bind_address,
            allowed_origin: non_empty("ALLOWED_ORIGIN"),
            log_json,
            playground_endpoint: non_empty("PLAYGROUND_ENDPOINT").unwrap_or_else(|| "/".to_owned()),
        })
    }

    /// Connects to Postgres when a database is configured, otherwise starts
    /// an empty in-memory store.
    pub async fn connect_store(&self) -> ConsoleResult<Store> {
        match &self.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                tracing::info!("Connected to the document store in Postgres");
                Ok(Store::new(store))
            }
            None => {
                tracing::warn!("DATABASE_URL is not set, using an in-memory store");
                Ok(Store::memory())
            }
        }
    }
}
