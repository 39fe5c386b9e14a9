//! Route keys: the `source_destination` identity of a transfer, derived from the path of its
//! platform description.

use std::fmt;

/// Where a route key sits inside a platform path.
///
/// The key is the path segment right after `marker`, cut at `suffix`. With the defaults,
/// `config/platforms/nodeA_nodeB_network.json` yields the key `nodeA_nodeB`.
#[derive(Debug, Clone, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct RouteKeyFormat {
    #[builder(default = String::from(RouteKeyFormat::DEFAULT_MARKER), setter(into))]
    pub marker: String,
    #[builder(default = String::from(RouteKeyFormat::DEFAULT_SUFFIX), setter(into))]
    pub suffix: String,
}

impl RouteKeyFormat {
    pub const DEFAULT_MARKER: &'static str = "platforms/";
    pub const DEFAULT_SUFFIX: &'static str = "_network";
    /// Separates the source from the destination within a key.
    pub const SEPARATOR: char = '_';

    /// Extracts the route key embedded in `path`.
    pub fn resolve(&self, path: &str) -> Result<RouteKey, RouteKeyError> {
        let start = path
            .find(&self.marker)
            .map(|i| i + self.marker.len())
            .ok_or_else(|| RouteKeyError::MissingMarker {
                path: path.to_owned(),
                marker: self.marker.clone(),
            })?;
        let segment = path[start..].split('/').next().unwrap_or_default();
        let end = segment
            .find(&self.suffix)
            .ok_or_else(|| RouteKeyError::MissingSuffix {
                path: path.to_owned(),
                suffix: self.suffix.clone(),
            })?;
        RouteKey::parse(&segment[..end])
    }
}

impl Default for RouteKeyFormat {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A validated route key. `source + "_" + destination == key` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RouteKey {
    key: String,
    source: String,
    destination: String,
}

impl RouteKey {
    /// Parses a bare key such as `nodeA_nodeB`.
    pub fn parse(key: &str) -> Result<Self, RouteKeyError> {
        let (source, destination) = key
            .split_once(RouteKeyFormat::SEPARATOR)
            .ok_or_else(|| RouteKeyError::MissingSeparator(key.to_owned()))?;
        if destination.contains(RouteKeyFormat::SEPARATOR) {
            return Err(RouteKeyError::ExtraSeparator(key.to_owned()));
        }
        if source.is_empty() || destination.is_empty() {
            return Err(RouteKeyError::EmptyNode(key.to_owned()));
        }
        Ok(Self {
            key: key.to_owned(),
            source: source.to_owned(),
            destination: destination.to_owned(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl std::str::FromStr for RouteKey {
    type Err = RouteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A malformed platform path or route key.
#[derive(Debug, thiserror::Error)]
pub enum RouteKeyError {
    #[error("path {path:?} does not contain the marker {marker:?}")]
    MissingMarker { path: String, marker: String },

    #[error("path {path:?} does not contain the suffix {suffix:?}")]
    MissingSuffix { path: String, suffix: String },

    #[error("route key {0:?} has no separator")]
    MissingSeparator(String),

    #[error("route key {0:?} has more than one separator")]
    ExtraSeparator(String),

    #[error("route key {0:?} names an empty node")]
    EmptyNode(String),
}
