use std::fmt;

use crate::model::Revision;

/// Boxed error used as the `source` of repository failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable error codes for operators and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidNetworkFile,
    EmptyCityId,
    DuplicateCity,
    UnknownCity,
    SelfLoopRoute,
    InvalidCoordinates,
    InvalidWeight,
    EmptyTransport,
    StoreReadFailed,
    StoreWriteFailed,
    WriteConflict,
    PartialAugmentation,
    ConnectivityInvariantViolated,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidNetworkFile => "E1003",
            Self::EmptyCityId => "E2001",
            Self::DuplicateCity => "E2002",
            Self::UnknownCity => "E2003",
            Self::SelfLoopRoute => "E2004",
            Self::InvalidCoordinates => "E2005",
            Self::InvalidWeight => "E2006",
            Self::EmptyTransport => "E2007",
            Self::StoreReadFailed => "E5001",
            Self::StoreWriteFailed => "E5002",
            Self::WriteConflict => "E5003",
            Self::PartialAugmentation => "E5004",
            Self::ConnectivityInvariantViolated => "E9001",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sr init` to create the route store."),
            Self::ConfigParseError => Some("Fix syntax in .smart-routes/config.toml and retry."),
            Self::InvalidNetworkFile => {
                Some("Expected {\"cities\": [...], \"routes\": [...]} as JSON.")
            }
            Self::EmptyCityId | Self::DuplicateCity | Self::UnknownCity | Self::SelfLoopRoute => {
                Some("Repair the stored network; this is not a transient failure.")
            }
            Self::InvalidCoordinates => {
                Some("Latitude must be within [-90, 90] and longitude within [-180, 180].")
            }
            Self::InvalidWeight => Some("Route weights must be finite and non-negative."),
            Self::EmptyTransport => {
                Some("Every route needs a transport tag, including `synthetic_transport`.")
            }
            Self::StoreReadFailed | Self::StoreWriteFailed => {
                Some("Check the store path, disk space, and write permissions.")
            }
            Self::WriteConflict => Some("Retry; another writer modified the network."),
            Self::PartialAugmentation => Some(
                "Some synthetic routes were stored before the failure. Run `sr status`, then retry `sr guarantee`.",
            ),
            Self::ConnectivityInvariantViolated => {
                Some("This indicates a planner regression. Report a bug with logs.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Data integrity
// ---------------------------------------------------------------------------

/// A city/route set that cannot form a valid graph.
///
/// These indicate corrupted upstream data and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataIntegrityError {
    /// A city was declared with an empty (or whitespace-only) id.
    #[error("city id must not be empty")]
    EmptyCityId,

    /// The same city id was declared twice.
    #[error("duplicate city id '{city_id}'")]
    DuplicateCity { city_id: String },

    /// A route endpoint does not reference a declared city.
    #[error("route {from} -> {to} references unknown city '{city_id}'")]
    UnknownCity {
        city_id: String,
        from: String,
        to: String,
    },

    /// A route starts and ends at the same city.
    #[error("route connects city '{city_id}' to itself")]
    SelfLoop { city_id: String },

    /// Coordinates are partially present, non-finite, or out of range.
    #[error("city '{city_id}' has invalid coordinates ({latitude:?}, {longitude:?})")]
    InvalidCoordinates {
        city_id: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },

    /// A route weight is negative or not finite.
    #[error("route {from} -> {to} has invalid weight {weight}")]
    InvalidWeight { from: String, to: String, weight: f64 },

    /// A route has an empty (or whitespace-only) transport tag.
    #[error("route {from} -> {to} has an empty transport tag")]
    EmptyTransport { from: String, to: String },
}

impl DataIntegrityError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyCityId => ErrorCode::EmptyCityId,
            Self::DuplicateCity { .. } => ErrorCode::DuplicateCity,
            Self::UnknownCity { .. } => ErrorCode::UnknownCity,
            Self::SelfLoop { .. } => ErrorCode::SelfLoopRoute,
            Self::InvalidCoordinates { .. } => ErrorCode::InvalidCoordinates,
            Self::InvalidWeight { .. } => ErrorCode::InvalidWeight,
            Self::EmptyTransport { .. } => ErrorCode::EmptyTransport,
        }
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::repository::RouteRepository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The network could not be loaded.
    #[error("route store read failed: {context}")]
    Read {
        context: String,
        #[source]
        source: BoxError,
    },

    /// A batch could not be committed. Nothing from the batch was applied.
    #[error("route store write failed: {context}")]
    Write {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The stored network no longer matches the revision the caller planned
    /// against. Nothing from the batch was applied.
    #[error("route store changed during write (expected {expected}, found {actual})")]
    Conflict { expected: Revision, actual: Revision },
}

impl RepositoryError {
    pub fn read(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Read {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn write(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Write {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Return `true` for an optimistic-concurrency rejection.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::StoreReadFailed,
            Self::Write { .. } => ErrorCode::StoreWriteFailed,
            Self::Conflict { .. } => ErrorCode::WriteConflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataIntegrityError, ErrorCode, RepositoryError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidNetworkFile,
            ErrorCode::EmptyCityId,
            ErrorCode::DuplicateCity,
            ErrorCode::UnknownCity,
            ErrorCode::SelfLoopRoute,
            ErrorCode::InvalidCoordinates,
            ErrorCode::InvalidWeight,
            ErrorCode::EmptyTransport,
            ErrorCode::StoreReadFailed,
            ErrorCode::StoreWriteFailed,
            ErrorCode::WriteConflict,
            ErrorCode::PartialAugmentation,
            ErrorCode::ConnectivityInvariantViolated,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
            assert!(code.hint().is_some(), "{code} has no hint");
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::UnknownCity.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn integrity_errors_name_the_offending_city() {
        let err = DataIntegrityError::UnknownCity {
            city_id: "Z".to_string(),
            from: "A".to_string(),
            to: "Z".to_string(),
        };
        assert_eq!(err.to_string(), "route A -> Z references unknown city 'Z'");
        assert_eq!(err.code(), ErrorCode::UnknownCity);
    }

    #[test]
    fn repository_errors_keep_their_source() {
        let io = std::io::Error::other("disk full");
        let err = RepositoryError::write("insert synthetic routes", io);
        assert!(!err.is_conflict());
        assert_eq!(err.code(), ErrorCode::StoreWriteFailed);
        let source = std::error::Error::source(&err).expect("source must be kept");
        assert_eq!(source.to_string(), "disk full");
    }
}
