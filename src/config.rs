//! Synchronizer configuration.

use crate::connection::Endpoint;
use crate::error::{Result, SyncError};
use crate::types::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Credential policy for opening a push channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    /// Never send credentials.
    Omit,
    /// Send credentials to same-origin endpoints only.
    #[default]
    SameOrigin,
    /// Always send credentials.
    Include,
}

/// One push topic and where to find it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name (e.g. "football-live").
    pub name: String,

    /// Push endpoint URL.
    pub url: String,

    #[serde(default)]
    pub credentials: CredentialsMode,

    /// Field holding each entity's id, used by filtering projections.
    /// Default: "id"
    #[serde(default)]
    pub id_field: Option<String>,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            credentials: CredentialsMode::default(),
            id_field: None,
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialsMode) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn topic(&self) -> Topic {
        Topic::new(self.name.clone())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.url.clone(), self.credentials)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Config("topic name is empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(SyncError::Config(format!("topic {} has no url", self.name)));
        }
        Ok(())
    }
}

/// Synchronizer configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Max patch batches held per topic before its first snapshot.
    /// Oldest are evicted past the cap. Default: unbounded
    pub max_pending_batches: Option<usize>,

    /// Topics registered up front.
    pub topics: Vec<TopicConfig>,
}

impl SyncConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SyncConfig =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_topic(mut self, topic: TopicConfig) -> Self {
        self.topics.push(topic);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pending_batches == Some(0) {
            return Err(SyncError::Config(
                "max_pending_batches must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for topic in &self.topics {
            topic.validate()?;
            if !seen.insert(topic.name.as_str()) {
                return Err(SyncError::Config(format!("duplicate topic {}", topic.name)));
            }
        }
        Ok(())
    }
}
