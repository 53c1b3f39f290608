//! Storage options: where the remote files live and how to reach them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hypothetic_store::Location;

use crate::error::{StorageError, StorageResult};

const ABFS: &str = "abfs";
const ABFS_KEYS: [&str; 2] = ["account_name", "credential"];

/// Protocols that only add a caching layer in front of the next one.
pub const CACHE_PROTOCOLS: [&str; 3] = ["simplecache", "filecache", "blockcache"];

/// Protocol, prefix and backend-specific settings of a dataset.
///
/// Keys other than `data_protocol` and `url_prefix` are handed to the
/// backend. A protocol containing `abfs` needs `account_name` and
/// `credential` (which may be null); a chained protocol such as
/// `simplecache::abfs` keeps them in a nested `abfs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageOptions {
    pub data_protocol: String,
    pub url_prefix: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Azure blob account and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbfsCredentials {
    pub account_name: String,
    /// `None` for anonymous access to public containers.
    pub credential: Option<String>,
}

impl StorageOptions {
    /// Build and validate.
    pub fn new(
        data_protocol: impl Into<String>,
        url_prefix: impl Into<String>,
        options: Map<String, Value>,
    ) -> StorageResult<Self> {
        let options = Self {
            data_protocol: data_protocol.into(),
            url_prefix: url_prefix.into(),
            options,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.data_protocol.is_empty() {
            return Err(StorageError::invalid_options("data_protocol must not be empty"));
        }
        if self.url_prefix.is_empty() {
            return Err(StorageError::invalid_options("url_prefix must not be empty"));
        }
        if !self.data_protocol.contains(ABFS) {
            return Ok(());
        }

        let table = self.abfs_table()?;
        if let Some(missing) = ABFS_KEYS.iter().find(|k| !table.contains_key(**k)) {
            return Err(StorageError::invalid_options(format!(
                "when using 'abfs', storage_options should contain the keys {:?}, missing {}",
                ABFS_KEYS, missing
            )));
        }
        match table.get("account_name") {
            Some(Value::String(s)) if !s.is_empty() => {}
            other => {
                return Err(StorageError::invalid_options(format!(
                    "account_name must be a non-empty string, got {:?}",
                    other
                )))
            }
        }
        match table.get("credential") {
            Some(Value::String(_)) | Some(Value::Null) => Ok(()),
            other => Err(StorageError::invalid_options(format!(
                "credential must be a string or null, got {:?}",
                other
            ))),
        }
    }

    /// Whether the protocol chains several filesystems, e.g. `simplecache::abfs`.
    pub fn is_chained(&self) -> bool {
        self.data_protocol.contains("::")
    }

    /// Last protocol of the chain, the one that actually holds the data.
    pub fn transport(&self) -> &str {
        transport_protocol(&self.data_protocol)
    }

    /// Whether the chain includes a caching layer.
    pub fn is_cached(&self) -> bool {
        self.data_protocol
            .split("::")
            .any(|p| CACHE_PROTOCOLS.contains(&p))
    }

    pub fn location(&self) -> Location {
        Location::new(self.data_protocol.clone(), self.url_prefix.clone())
    }

    /// Options for the transport: the nested table for chained protocols,
    /// the top level otherwise.
    pub fn backend_options(&self) -> &Map<String, Value> {
        if self.is_chained() {
            if let Some(Value::Object(table)) = self.options.get(self.transport()) {
                return table;
            }
        }
        &self.options
    }

    pub fn abfs_credentials(&self) -> StorageResult<AbfsCredentials> {
        let table = self.abfs_table()?;
        let account_name = table
            .get("account_name")
            .and_then(Value::as_str)
            .ok_or_else(|| StorageError::invalid_options("missing account_name"))?
            .to_string();
        let credential = table
            .get("credential")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(AbfsCredentials {
            account_name,
            credential,
        })
    }

    fn abfs_table(&self) -> StorageResult<&Map<String, Value>> {
        if !self.is_chained() {
            return Ok(&self.options);
        }
        match self.options.get(ABFS) {
            Some(Value::Object(table)) => Ok(table),
            _ => Err(StorageError::invalid_options(format!(
                "expected to find 'abfs' key in storage_options for nested filesystems; \
                 the associated value should be a table containing the keys {:?}",
                ABFS_KEYS
            ))),
        }
    }

    /// A string option, looked up in the backend table.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.backend_options().get(key).and_then(Value::as_str)
    }
}

/// Last `::`-separated component of a protocol.
pub fn transport_protocol(protocol: &str) -> &str {
    protocol.rsplit("::").next().unwrap_or(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(yaml: &str) -> StorageOptions {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_plain_protocol_needs_nothing_else() {
        let options = parse("data_protocol: https\nurl_prefix: example.com/data/\n");
        assert!(options.validate().is_ok());
        assert_eq!(options.location().render("a.nc"), "https://example.com/data/a.nc");
        assert!(!options.is_chained());
    }

    #[test]
    fn test_abfs_requires_account_and_credential() {
        let missing = parse("data_protocol: abfs\nurl_prefix: container\naccount_name: acct\n");
        let err = missing.validate().unwrap_err();
        assert!(err.to_string().contains("credential"));

        let anonymous = parse("data_protocol: abfs\nurl_prefix: container\naccount_name: acct\ncredential: null\n");
        assert!(anonymous.validate().is_ok());
        assert_eq!(
            anonymous.abfs_credentials().unwrap(),
            AbfsCredentials {
                account_name: "acct".to_string(),
                credential: None
            }
        );
    }

    #[test]
    fn test_chained_abfs_needs_nested_table() {
        let flat = parse(
            "data_protocol: simplecache::abfs\nurl_prefix: container\naccount_name: acct\ncredential: key\n",
        );
        assert!(flat.validate().is_err());

        let nested = parse(
            "data_protocol: simplecache::abfs\nurl_prefix: container\nabfs:\n  account_name: acct\n  credential: key\n",
        );
        assert!(nested.validate().is_ok());
        assert!(nested.is_cached());
        assert_eq!(nested.transport(), "abfs");
        assert_eq!(nested.backend_options()["account_name"], json!("acct"));
        assert_eq!(nested.abfs_credentials().unwrap().credential.as_deref(), Some("key"));
    }

    #[test]
    fn test_required_fields() {
        let result: Result<StorageOptions, _> = serde_yaml::from_str("url_prefix: x\n");
        assert!(result.is_err());
        assert!(StorageOptions::new("file", "", Map::new()).is_err());
    }
}
