use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PLATFORMS: [&str; 8] = [
    "Amazon",
    "Walmart",
    "Best Buy",
    "Ebay",
    "Target",
    "Costco",
    "Five Below",
    "Newegg",
];

/// A shopping platform identifier. The string is opaque to the search core and is
/// handed to the agent exactly as configured.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    platforms: Vec<Platform>,
}

impl PlatformCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut platforms: Vec<Platform> = Vec::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim();
            if name.is_empty() || platforms.iter().any(|p| p.matches(name)) {
                continue;
            }
            platforms.push(Platform::new(name));
        }
        Self { platforms }
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Returns the catalog spelling of `name`, if the catalog knows it.
    pub fn resolve(&self, name: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.matches(name))
    }
}

impl Default for PlatformCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PLATFORMS)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Search query must not be empty")]
    EmptyQuery,
    #[error("At least one platform must be selected")]
    NoPlatforms,
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

/// One search batch: a query and the platforms to run it against, in request order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    query: String,
    platforms: Vec<Platform>,
}

impl SearchRequest {
    pub fn new<S: AsRef<str>>(
        query: &str,
        platforms: &[S],
        catalog: &PlatformCatalog,
    ) -> Result<Self, RequestError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        let mut resolved: Vec<Platform> = Vec::with_capacity(platforms.len());
        for name in platforms {
            let name = name.as_ref();
            let platform = match catalog.resolve(name) {
                Some(platform) => platform.clone(),
                None => return Err(RequestError::UnknownPlatform(name.to_string())),
            };
            if !resolved.contains(&platform) {
                resolved.push(platform);
            }
        }
        if resolved.is_empty() {
            return Err(RequestError::NoPlatforms);
        }
        Ok(Self {
            query: query.to_string(),
            platforms: resolved,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }
}
