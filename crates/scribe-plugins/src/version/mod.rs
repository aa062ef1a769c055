//! Semantic version parsing and host compatibility checks.
//!
//! Versions are `major.minor.patch` triples; missing trailing components
//! default to zero and an optional leading `v` is accepted. Compatibility
//! follows a strict rule: the major numbers must match and the available
//! minor must be at least the required minor. Patch releases are always
//! compatible.
//!
//! A small constraint grammar (`>=1.2, <2`) is provided for general ranges.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::PluginError;
use crate::manifest::PluginManifest;

/// Errors raised while parsing versions and constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The input was empty.
    #[error("version string is empty")]
    Empty,

    /// More than three dot-separated components were supplied.
    #[error("version '{input}' has more than three components")]
    TooManyComponents {
        /// Offending input.
        input: String,
    },

    /// A component was not a non-negative integer.
    #[error("version '{input}' has a non-numeric component '{component}'")]
    InvalidComponent {
        /// Offending input.
        input: String,
        /// Component that failed to parse.
        component: String,
    },

    /// A constraint set contained an empty constraint.
    #[error("constraint set '{input}' contains an empty constraint")]
    EmptyConstraint {
        /// Offending input.
        input: String,
    },
}

/// A `major.minor.patch` version.
///
/// Ordering is lexicographic on `(major, minor, patch)`.
///
/// # Example
///
/// ```
/// use scribe_plugins::Version;
///
/// let version: Version = "v1.2".parse().expect("valid version");
/// assert_eq!(version, Version::new(1, 2, 0));
/// assert!(Version::new(1, 4, 0).is_compatible_with(&version));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

impl Version {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `X`, `X.Y` or `X.Y.Z`, with an optional leading `v`.
    ///
    /// # Errors
    ///
    /// Returns a [`VersionError`] for empty input, more than three
    /// components, or any component that is not a non-negative integer.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut components = [0_u64; 3];
        let mut count = 0_usize;
        for part in body.split('.') {
            let Some(slot) = components.get_mut(count) else {
                return Err(VersionError::TooManyComponents {
                    input: text.to_owned(),
                });
            };
            *slot = parse_component(text, part)?;
            count += 1;
        }

        let [major, minor, patch] = components;
        Ok(Self::new(major, minor, patch))
    }

    /// Major component.
    #[must_use]
    pub const fn major(self) -> u64 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.minor
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(self) -> u64 {
        self.patch
    }

    /// Compares two versions.
    #[must_use]
    pub fn compare(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    /// Returns `true` if this version can stand in for `required`.
    ///
    /// Requires equal majors and `self.minor >= required.minor`; patch is
    /// ignored.
    #[must_use]
    pub const fn is_compatible_with(&self, required: &Self) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

fn parse_component(input: &str, part: &str) -> Result<u64, VersionError> {
    let invalid = || VersionError::InvalidComponent {
        input: input.to_owned(),
        component: part.to_owned(),
    };
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    part.parse().map_err(|_| invalid())
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Checks whether a plugin may be loaded by a host running `host`.
///
/// Manifests without `min_host_version` are always compatible.
///
/// # Errors
///
/// Returns [`PluginError::InvalidVersion`] when either version fails to
/// parse and [`PluginError::IncompatibleVersion`] when the host does not
/// satisfy the declared minimum.
pub fn check_plugin_compatibility(
    manifest: &PluginManifest,
    host: &str,
) -> Result<(), PluginError> {
    let Some(required_text) = manifest.min_host_version().filter(|v| !v.trim().is_empty()) else {
        return Ok(());
    };

    let host_version = Version::parse(host).map_err(|source| PluginError::InvalidVersion {
        context: String::from("host"),
        source,
    })?;
    let required =
        Version::parse(required_text).map_err(|source| PluginError::InvalidVersion {
            context: format!("plugin '{}' min_host_version", manifest.plugin_id()),
            source,
        })?;

    if host_version.is_compatible_with(&required) {
        Ok(())
    } else {
        Err(PluginError::IncompatibleVersion {
            id: manifest.plugin_id().to_owned(),
            required: required.to_string(),
            host: host_version.to_string(),
        })
    }
}

/// Comparison operator of a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
    /// `=`
    Equal,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl ConstraintOp {
    /// Operator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
            Self::Equal => "=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }

    const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::GreaterOrEqual => !matches!(ordering, Ordering::Less),
            Self::Greater => matches!(ordering, Ordering::Greater),
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::Less => matches!(ordering, Ordering::Less),
            Self::LessOrEqual => !matches!(ordering, Ordering::Greater),
        }
    }
}

/// An operator paired with a version, e.g. `>=1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    op: ConstraintOp,
    version: Version,
}

impl Constraint {
    /// Creates a constraint.
    #[must_use]
    pub const fn new(op: ConstraintOp, version: Version) -> Self {
        Self { op, version }
    }

    /// Operator.
    #[must_use]
    pub const fn op(&self) -> ConstraintOp {
        self.op
    }

    /// Version compared against.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns `true` if `candidate` satisfies the constraint.
    #[must_use]
    pub fn matches(&self, candidate: Version) -> bool {
        self.op.holds(candidate.compare(self.version))
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    /// Parses `<op><version>`; the operator defaults to `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        // Two-character operators must be tried before their prefixes.
        let operators = [
            ConstraintOp::GreaterOrEqual,
            ConstraintOp::LessOrEqual,
            ConstraintOp::Greater,
            ConstraintOp::Less,
            ConstraintOp::Equal,
        ];
        let (op, rest) = operators
            .into_iter()
            .find_map(|op| text.strip_prefix(op.as_str()).map(|rest| (op, rest)))
            .unwrap_or((ConstraintOp::Equal, text));
        Ok(Self::new(op, Version::parse(rest)?))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A comma-separated list of constraints, all of which must hold.
///
/// # Example
///
/// ```
/// use scribe_plugins::version::{ConstraintSet, Version};
///
/// let range: ConstraintSet = ">=1.2, <2".parse().expect("valid range");
/// assert!(range.matches(Version::new(1, 9, 3)));
/// assert!(!range.matches(Version::new(2, 0, 0)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Creates a set from individual constraints.
    #[must_use]
    pub const fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Constraints in declaration order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns `true` when every constraint holds for `candidate`.
    #[must_use]
    pub fn matches(&self, candidate: Version) -> bool {
        self.constraints.iter().all(|c| c.matches(candidate))
    }
}

impl FromStr for ConstraintSet {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(VersionError::Empty);
        }
        let constraints = s
            .split(',')
            .map(|part| {
                if part.trim().is_empty() {
                    Err(VersionError::EmptyConstraint {
                        input: s.to_owned(),
                    })
                } else {
                    part.parse()
                }
            })
            .collect::<Result<Vec<Constraint>, _>>()?;
        Ok(Self::new(constraints))
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for constraint in &self.constraints {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{constraint}")?;
            first = false;
        }
        Ok(())
    }
}
