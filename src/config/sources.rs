// src/config/sources.rs
//! Source/group definitions as read from configuration. Read-only after load.

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::extract::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Rest,
    Soap,
    Db,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Rest => "rest",
            Protocol::Soap => "soap",
            Protocol::Db => "db",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Protocol::Rest),
            "soap" => Ok(Protocol::Soap),
            "db" | "sql" => Ok(Protocol::Db),
            other => Err(format!("unknown source protocol '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Database connection target of a DB source.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub driver: Option<String>,
}

impl ConnectionTarget {
    /// Equivalence key: url + username (password/driver are fixed for that pair).
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            url: self.url.clone(),
            username: self.username.clone(),
        }
    }
}

// Keep passwords out of logs and panics.
impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("driver", &self.driver)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub url: String,
    pub username: String,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.url, self.username)
    }
}

fn default_root_path() -> String {
    "$".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceDefinition {
    pub name: String,
    #[serde(default, alias = "type")]
    pub protocol: Protocol,
    /// Endpoint template for REST/SOAP, `{name}` placeholders allowed.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub soap_action: Option<String>,
    #[serde(default, alias = "config")]
    pub connection: Option<ConnectionTarget>,
    /// Statement template for DB sources.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_root_path")]
    pub path: String,
    #[serde(default)]
    pub fields: FieldMap,
}

impl SourceDefinition {
    pub fn rest(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: Protocol::Rest,
            url: Some(url.into()),
            soap_action: None,
            connection: None,
            query: None,
            path: default_root_path(),
            fields: FieldMap::new(),
        }
    }

    pub fn soap(
        name: impl Into<String>,
        url: impl Into<String>,
        soap_action: impl Into<String>,
    ) -> Self {
        Self {
            protocol: Protocol::Soap,
            soap_action: Some(soap_action.into()),
            ..Self::rest(name, url)
        }
    }

    pub fn db(
        name: impl Into<String>,
        connection: ConnectionTarget,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol: Protocol::Db,
            url: None,
            soap_action: None,
            connection: Some(connection),
            query: Some(query.into()),
            path: default_root_path(),
            fields: FieldMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    fn validate(&self, group: &str) -> Result<()> {
        let missing = |what: &str| -> Result<()> {
            bail!(
                "group '{group}', source '{}' ({}): missing `{what}`",
                self.name,
                self.protocol
            )
        };
        match self.protocol {
            Protocol::Rest | Protocol::Soap if self.url.is_none() => missing("url"),
            Protocol::Db if self.connection.is_none() => missing("connection"),
            Protocol::Db if self.query.is_none() => missing("query"),
            _ => Ok(()),
        }
    }
}

/// Named set of sources fetched together, in declared order.
#[derive(Debug, Clone)]
pub struct SourceGroup {
    pub name: String,
    pub sources: Vec<Arc<SourceDefinition>>,
}

impl SourceGroup {
    pub fn new(name: impl Into<String>, sources: Vec<SourceDefinition>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for s in &sources {
            if !seen.insert(s.name.as_str()) {
                bail!("group '{name}': duplicate source name '{}'", s.name);
            }
            s.validate(&name)?;
        }
        Ok(Self {
            name,
            sources: sources.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Arc<SourceGroup>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: SourceGroup) {
        self.groups.insert(group.name.clone(), Arc::new(group));
    }

    pub fn get(&self, name: &str) -> Option<Arc<SourceGroup>> {
        self.groups.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}
