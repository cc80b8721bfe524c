//! Deterministic hash-based entity identity.
//!
//! [`EntityHash`] is a 64-bit hash computed from an entity's canonical
//! signature. Hashes are deterministic across builds and processes, which is
//! what lets them key the once-per-entity memoization of handle binding and
//! layout resolution without any registration-order dependency.
//!
//! Domain-separation constants keep entity, field, and method hashes from
//! colliding even when they share a name.

use std::fmt;

use xxhash_rust::xxh64::xxh64;

use crate::signature::Signature;

/// Domain markers mixed into the hash seed per entity kind.
pub mod hash_domains {
    /// Separator constant folded in between package segments.
    pub const SEP: u64 = 0x6f3a_91c2_44b8_d5e7;

    /// Domain marker for entity identity.
    pub const ENTITY: u64 = 0x1d84_c7f9_3b26_a0e5;

    /// Domain marker for field members.
    pub const FIELD: u64 = 0x8b5e_2a17_f94c_d603;

    /// Domain marker for method members.
    pub const METHOD: u64 = 0x4297_e6b0_5d1f_38ca;
}

/// 64-bit deterministic identity of an entity or one of its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHash(pub u64);

impl EntityHash {
    /// Hash a canonical signature.
    pub fn from_signature(signature: &Signature) -> Self {
        let mut seed = hash_domains::ENTITY;
        for segment in signature.package_path() {
            seed = xxh64(segment.as_bytes(), seed) ^ hash_domains::SEP;
        }
        Self(xxh64(signature.simple_name().as_bytes(), seed))
    }

    /// Hash a bare name in the global scope.
    pub fn from_name(name: &str) -> Self {
        Self::from_signature(&Signature::global(name))
    }

    /// Derive the hash of a field member of this entity.
    pub fn field(self, name: &str) -> Self {
        Self(xxh64(name.as_bytes(), self.0 ^ hash_domains::FIELD))
    }

    /// Derive the hash of a method member of this entity.
    pub fn method(self, name: &str) -> Self {
        Self(xxh64(name.as_bytes(), self.0 ^ hash_domains::METHOD))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = EntityHash::from_signature(&Signature::parse("geo::Point"));
        let b = EntityHash::from_signature(&Signature::parse("geo::Point"));
        assert_eq!(a, b);
    }

    #[test]
    fn package_matters() {
        let a = EntityHash::from_signature(&Signature::parse("geo::Point"));
        let b = EntityHash::from_signature(&Signature::parse("ui::Point"));
        assert_ne!(a, b);
    }

    #[test]
    fn member_domains_do_not_collide() {
        let entity = EntityHash::from_name("Point");
        assert_ne!(entity.field("x"), entity.method("x"));
        assert_ne!(entity.field("x"), entity.field("y"));
    }
}
