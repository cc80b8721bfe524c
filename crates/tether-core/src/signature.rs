//! Canonical signatures for entity identity.
//!
//! A [`Signature`] is the globally unique name of an entity: its declaring
//! package path plus its simple name, joined by `::`. Short names appearing
//! in IR documents are resolved to signatures before any binding happens.

use std::fmt;

use crate::entity_hash::EntityHash;

/// Separator between package segments and the simple name.
pub const QUALIFIER: &str = "::";

/// Canonical, globally unique entity identity.
///
/// # Examples
///
/// ```
/// use tether_core::Signature;
///
/// let point = Signature::new("Point", vec!["geo".into()]);
/// assert_eq!(point.to_string(), "geo::Point");
///
/// let free = Signature::global("version");
/// assert_eq!(free.to_string(), "version");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    /// Package path (e.g., `["geo", "shapes"]`). Empty for the global scope.
    pub package: Vec<String>,
    /// Simple name (e.g., `"Point"`).
    pub name: String,
}

impl Signature {
    /// Create a signature with an explicit package path.
    pub fn new(name: impl Into<String>, package: Vec<String>) -> Self {
        Self {
            package,
            name: name.into(),
        }
    }

    /// Create a signature in the global scope.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            package: Vec::new(),
            name: name.into(),
        }
    }

    /// Parse a qualified string (e.g., `"geo::shapes::Point"`).
    ///
    /// The last segment is the name, the rest the package path. A leading
    /// qualifier is normalized away: `"::geo::Point"` equals `"geo::Point"`.
    pub fn parse(s: &str) -> Self {
        let parts: Vec<&str> = s.split(QUALIFIER).filter(|p| !p.is_empty()).collect();
        match parts.split_last() {
            None => Self::global(""),
            Some((name, package)) => Self {
                package: package.iter().map(|s| (*s).to_string()).collect(),
                name: (*name).to_string(),
            },
        }
    }

    /// Whether a textual reference is already canonical.
    ///
    /// The resolver returns such references unchanged.
    pub fn is_qualified(s: &str) -> bool {
        s.contains(QUALIFIER)
    }

    /// The simple (unqualified) name.
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// The package path segments.
    pub fn package_path(&self) -> &[String] {
        &self.package
    }

    /// Deterministic identity hash for this signature.
    pub fn entity_hash(&self) -> EntityHash {
        EntityHash::from_signature(self)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.package {
            write!(f, "{segment}{QUALIFIER}")?;
        }
        write!(f, "{}", self.name)
    }
}
