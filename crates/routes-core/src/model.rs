//! Transport network domain types.
//!
//! A [`City`] is a node with an optional geographic position; a [`Route`] is
//! a weighted link between two cities. A [`GraphSnapshot`] is the full set
//! of both as read from a repository at one point in time, stamped with a
//! content [`Revision`].
//!
//! ## Revision
//!
//! The revision is a BLAKE3 hash over the cities sorted by id and the routes
//! sorted by `(from, to, transport, weight)`. Storage order never affects it,
//! so two stores holding the same network always agree on the revision. The
//! connectivity service uses it for optimistic concurrency: a write planned
//! against revision `R` is rejected if the store no longer hashes to `R`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Return `true` if both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in kilometres (haversine formula).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

// ---------------------------------------------------------------------------
// City / Route
// ---------------------------------------------------------------------------

/// A node of the transport network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl City {
    /// A city without a known position.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latitude: None,
            longitude: None,
        }
    }

    /// A city at the given position.
    pub fn located(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Both coordinates, if both are present.
    ///
    /// Range checks are the graph builder's job; this only pairs the fields.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// A transport link between two cities.
///
/// Stored with a direction (`from`, `to`) but treated as undirected for
/// connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
    pub weight: f64,
    pub transport: String,
}

impl Route {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        weight: f64,
        transport: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            weight,
            transport: transport.into(),
        }
    }

    /// Canonical ordering used for hashing and stable output.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.from
            .cmp(&other.from)
            .then_with(|| self.to.cmp(&other.to))
            .then_with(|| self.transport.cmp(&other.transport))
            .then_with(|| self.weight.total_cmp(&other.weight))
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// Content hash of a network, `blake3:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Hash `cities` and `routes` independent of their order.
    #[must_use]
    pub fn of(cities: &[City], routes: &[Route]) -> Self {
        let mut sorted_cities: Vec<&City> = cities.iter().collect();
        sorted_cities.sort_by(|a, b| a.id.cmp(&b.id));
        let mut sorted_routes: Vec<&Route> = routes.iter().collect();
        sorted_routes.sort_by(|a, b| a.canonical_cmp(b));

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cities\x00");
        for city in sorted_cities {
            hasher.update(city.id.as_bytes());
            hasher.update(b"\x00");
            hash_optional_f64(&mut hasher, city.latitude);
            hash_optional_f64(&mut hasher, city.longitude);
        }
        hasher.update(b"routes\x00");
        for route in sorted_routes {
            hasher.update(route.from.as_bytes());
            hasher.update(b"\x00");
            hasher.update(route.to.as_bytes());
            hasher.update(b"\x00");
            hasher.update(&route.weight.to_bits().to_le_bytes());
            hasher.update(route.transport.as_bytes());
            hasher.update(b"\x00");
        }
        Self(format!("blake3:{}", hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_optional_f64(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(&v.to_bits().to_le_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
}

// ---------------------------------------------------------------------------
// GraphSnapshot
// ---------------------------------------------------------------------------

/// Everything a repository knows at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub cities: Vec<City>,
    pub routes: Vec<Route>,
    pub revision: Revision,
}

impl GraphSnapshot {
    /// Build a snapshot and stamp it with its content revision.
    #[must_use]
    pub fn new(cities: Vec<City>, routes: Vec<Route>) -> Self {
        let revision = Revision::of(&cities, &routes);
        Self {
            cities,
            routes,
            revision,
        }
    }
}

// ---------------------------------------------------------------------------
// Network file
// ---------------------------------------------------------------------------

/// JSON interchange format for importing a network into a store.
///
/// ```json
/// {"cities": [{"id": "A", "latitude": 52.5, "longitude": 13.4}],
///  "routes": [{"from": "A", "to": "B", "weight": 90.0, "transport": "rail"}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl NetworkFile {
    /// Parse a network from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the text is not a valid network document.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
