use std::path::Path;

use arbor_refs::validate_branch_name;
use arbor_types::Signature;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::policy::ComparisonPolicy;

/// Repository settings, usually read from an `arbor.toml` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Branch created by `init`.
    pub default_branch: String,
    pub comparison: ComparisonPolicy,
    /// Committer used when an operation is not given one.
    pub identity: Option<Identity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Signature for this identity stamped with the current time.
    pub fn signature(&self) -> Signature {
        Signature::now(self.name.clone(), self.email.clone())
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".into(),
            comparison: ComparisonPolicy::default(),
            identity: None,
        }
    }
}

impl RepositoryConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ModelResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ModelError::Config(e.to_string()))?;
        validate_branch_name(&config.default_branch)?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> ModelResult<String> {
        toml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RepositoryConfig::default();
        assert_eq!(c.default_branch, "main");
        assert!(c.comparison.case_sensitive);
        assert!(c.comparison.skip_unchanged_subtrees);
        assert!(c.identity.is_none());
    }

    #[test]
    fn parses_full_file() {
        let c = RepositoryConfig::from_toml_str(
            r#"
            default_branch = "trunk"

            [comparison]
            case_sensitive = false
            ignored_properties = ["Table.LastAccess"]

            [identity]
            name = "Jane Doe"
            email = "jane@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(c.default_branch, "trunk");
        assert!(!c.comparison.case_sensitive);
        assert!(c.comparison.skip_unchanged_subtrees);
        assert!(c.comparison.ignores("Table", "LastAccess"));
        assert_eq!(c.identity.unwrap().signature().email, "jane@example.com");
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(RepositoryConfig::from_toml_str("").unwrap(), RepositoryConfig::default());
    }

    #[test]
    fn rejects_bad_branch_and_bad_toml() {
        assert!(RepositoryConfig::from_toml_str("default_branch = \"a..b\"").is_err());
        assert!(matches!(
            RepositoryConfig::from_toml_str("default_branch = 3"),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let c = RepositoryConfig {
            identity: Some(Identity {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            }),
            ..Default::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(RepositoryConfig::from_toml_str(&text).unwrap(), c);
    }
}
