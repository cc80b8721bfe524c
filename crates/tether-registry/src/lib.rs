//! Type reference resolution for tether.
//!
//! Scans every discovered IR document once, builds an index from short type
//! names to canonical signatures, and resolves the references appearing in
//! fields, arguments, and return types. Ambiguity is always an error:
//! silently picking a candidate would make generated code nondeterministic
//! across builds.

mod index;

pub use index::SignatureIndex;
