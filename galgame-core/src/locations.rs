//! The campus map.
//!
//! Locations are read once from a TOML document and never change afterwards.
//! Each location lists the places reachable from it; edges are directed, so a
//! map author who wants two-way travel lists the connection on both sides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors from reading the location configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid location file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Location '{0}' is defined more than once")]
    DuplicateLocation(String),
}

/// A single place on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Stable key used in saves and commands.
    pub id: String,

    /// Name shown to the player and matched against their input.
    pub name: String,

    /// Scene text handed to the model.
    #[serde(default, alias = "description_for_llm")]
    pub description: String,

    /// Outgoing edges, in the order the author listed them.
    #[serde(default)]
    pub connections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LocationFile {
    #[serde(default, rename = "location")]
    locations: Vec<Location>,
}

/// Adjacency of every location, in file order.
#[derive(Debug, Clone, Default)]
pub struct LocationGraph {
    locations: Vec<Location>,
    index: HashMap<String, usize>,
}

impl LocationGraph {
    /// An empty map. Every movement against it reports "no route".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a map from TOML text.
    ///
    /// Connections naming locations that do not exist are dropped with a
    /// warning so every path the finder returns stays inside the graph.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: LocationFile = toml::from_str(content)?;
        Self::from_locations(file.locations)
    }

    /// Build a graph from already-parsed locations.
    pub fn from_locations(locations: Vec<Location>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(locations.len());
        for (i, location) in locations.iter().enumerate() {
            if index.insert(location.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateLocation(location.id.clone()));
            }
        }

        let mut locations = locations;
        for Location {
            id, connections, ..
        } in &mut locations
        {
            connections.retain(|neighbor| {
                let known = index.contains_key(neighbor);
                if !known {
                    warn!(
                        from = %id,
                        to = %neighbor,
                        "Dropping connection to undefined location"
                    );
                }
                known
            });
        }

        Ok(Self { locations, index })
    }

    /// Read a map from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::from_toml_str(&content)?;
        info!(path = %path.display(), locations = graph.len(), "Loaded location graph");
        Ok(graph)
    }

    /// Read a map from disk, falling back to an empty graph on any failure.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(graph) => graph,
            Err(e) => {
                error!("Failed to load locations, movement is disabled: {e}");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.index.get(id).map(|&i| &self.locations[i])
    }

    /// Outgoing neighbors of `id`, empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.get(id)
            .map(|l| l.connections.as_slice())
            .unwrap_or(&[])
    }

    /// Display name of `id`, or the id itself when it is not on the map.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|l| l.name.as_str()).unwrap_or(id)
    }

    /// All locations in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// First location (in file order) whose display name appears in `text`.
    ///
    /// When several names appear, the earliest defined location wins rather
    /// than the earliest mention.
    pub fn find_mentioned(&self, text: &str) -> Option<&Location> {
        let text = text.to_lowercase();
        self.locations
            .iter()
            .find(|l| !l.name.is_empty() && text.contains(&l.name.to_lowercase()))
    }

    /// Reachable destinations from `id`, rendered as `'Name' (id)`.
    pub fn describe_destinations(&self, id: &str) -> Vec<String> {
        self.neighbors(id)
            .iter()
            .filter_map(|n| self.get(n))
            .map(|l| format!("'{}' ({})", l.name, l.id))
            .collect()
    }
}
