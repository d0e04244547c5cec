//! Store connection configuration

/// Default namespace for Stratum databases
const DEFAULT_NAMESPACE: &str = "stratum";
/// Default database name
const DEFAULT_DATABASE: &str = "project";
/// Engine used when no URL is configured
const IN_MEMORY_URL: &str = "mem://";

/// Configuration for connecting a [`crate::SurrealDocumentStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Engine URL (e.g. `mem://`, `surrealkv://.stratum/db`, `ws://host:8000`)
    pub url: String,
    /// Namespace (default: "stratum")
    pub namespace: String,
    /// Database name (default: "project")
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    /// Configuration for an ephemeral in-memory engine
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_URL)
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Load configuration from environment variables
    ///
    /// - `STRATUM_DB_URL`: engine URL (falls back to in-memory)
    /// - `STRATUM_DB_NAMESPACE`: namespace (default: "stratum")
    /// - `STRATUM_DB_DATABASE`: database (default: "project")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("STRATUM_DB_URL").unwrap_or_else(|| IN_MEMORY_URL.to_string());
        let namespace =
            lookup("STRATUM_DB_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let database =
            lookup("STRATUM_DB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        Self {
            url,
            namespace,
            database,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("mem://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_env_falls_back_to_memory() {
        let config = StoreConfig::from_lookup(|_| None);
        assert!(config.is_in_memory());
        assert_eq!(config.namespace, "stratum");
        assert_eq!(config.database, "project");
    }

    #[test]
    fn env_values_override_defaults() {
        let env: HashMap<&str, &str> = [
            ("STRATUM_DB_URL", "surrealkv://.stratum/db"),
            ("STRATUM_DB_DATABASE", "dig-2024"),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.url, "surrealkv://.stratum/db");
        assert_eq!(config.namespace, "stratum");
        assert_eq!(config.database, "dig-2024");
        assert!(!config.is_in_memory());
    }
}
