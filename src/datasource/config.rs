//! Datasource configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::BackoffConfig;
use crate::error::DataError;

/// Policy for reconciling an externally supplied entity with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MergeStrategy {
    /// Get or create a bare entity for the identity; supplied values are ignored.
    ByIdentity,
    /// Join the supplied entity to the stored one so reads aggregate both.
    #[default]
    ByReference,
    /// Deep-copy the supplied graph into in-store surrogates.
    ByValue,
}

impl MergeStrategy {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ByIdentity => "by_identity",
            Self::ByReference => "by_reference",
            Self::ByValue => "by_value",
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = DataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("by_identity") {
            Ok(Self::ByIdentity)
        } else if value.eq_ignore_ascii_case("by_reference") {
            Ok(Self::ByReference)
        } else if value.eq_ignore_ascii_case("by_value") {
            Ok(Self::ByValue)
        } else {
            Err(DataError::UnknownMergeStrategy {
                name: value.to_string(),
            })
        }
    }
}

impl TryFrom<String> for MergeStrategy {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MergeStrategy> for String {
    fn from(value: MergeStrategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which parts a composite's removals reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeletionStrategy {
    /// Remove from every constituent part of the aggregation.
    #[default]
    Shallow,
    /// Remove from the composite's own part only.
    Deep,
}

impl DeletionStrategy {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Deep => "deep",
        }
    }
}

impl FromStr for DeletionStrategy {
    type Err = DataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("shallow") {
            Ok(Self::Shallow)
        } else if value.eq_ignore_ascii_case("deep") {
            Ok(Self::Deep)
        } else {
            Err(DataError::UnknownDeletionStrategy {
                name: value.to_string(),
            })
        }
    }
}

impl TryFrom<String> for DeletionStrategy {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeletionStrategy> for String {
    fn from(value: DeletionStrategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeletionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datasource configuration.
///
/// Every field has a default, so partial JSON documents deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Merge policy, fixed for the datasource's lifetime.
    pub merge_strategy: MergeStrategy,
    /// Deletion policy given to every composite the datasource creates.
    pub deletion_strategy: DeletionStrategy,
    /// Read back-off for adapters wrapping foreign entities.
    pub backoff: BackoffConfig,
}

impl DataSourceConfig {
    /// Returns this configuration with `merge_strategy`.
    #[must_use]
    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = merge_strategy;
        self
    }

    /// Returns this configuration with `deletion_strategy`.
    #[must_use]
    pub fn with_deletion_strategy(mut self, deletion_strategy: DeletionStrategy) -> Self {
        self.deletion_strategy = deletion_strategy;
        self
    }

    /// Returns this configuration with `backoff`.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}
