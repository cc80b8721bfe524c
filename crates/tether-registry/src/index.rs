//! SignatureIndex - short-name to canonical-signature resolution.
//!
//! # Storage Model
//!
//! - **Candidates**: short name -> sorted, deduplicated list of canonical
//!   signatures, built by one scan over all IR documents.
//! - **Definitions**: canonical signature -> entity definition, for lookups
//!   after resolution.
//!
//! # Thread Safety
//!
//! The index is populated once and read-only afterwards. Wrap it in an `Arc`
//! to share across threads; no interior mutability is involved.

use rustc_hash::FxHashMap;

use tether_core::{IrDocument, ResolveError, Signature, TypeDefinition};

/// Index of every type name declared by the discovered IR documents.
#[derive(Default)]
pub struct SignatureIndex {
    /// Short name -> canonical candidates, sorted for deterministic output.
    candidates: FxHashMap<String, Vec<Signature>>,

    /// Canonical signature -> definition.
    definitions: FxHashMap<Signature, TypeDefinition>,
}

impl SignatureIndex {
    /// Build the index by scanning all IR documents once.
    pub fn build(documents: &[IrDocument]) -> Self {
        let mut index = Self::default();
        for doc in documents {
            for entity in &doc.entities {
                index.insert(entity.clone());
            }
        }
        for candidates in index.candidates.values_mut() {
            candidates.sort();
            candidates.dedup();
        }
        tracing::debug!(
            names = index.candidates.len(),
            entities = index.definitions.len(),
            "signature index built"
        );
        index
    }

    fn insert(&mut self, entity: TypeDefinition) {
        self.candidates
            .entry(entity.name.clone())
            .or_default()
            .push(entity.signature.clone());
        self.definitions.insert(entity.signature.clone(), entity);
    }

    /// Resolve a textual type reference to its canonical signature.
    ///
    /// References that already contain the qualifying separator are returned
    /// unchanged. Otherwise the short name must match exactly one declared
    /// entity; zero or several matches are fatal resolution errors carrying
    /// `context` for diagnostics.
    pub fn resolve(&self, name: &str, context: &str) -> Result<Signature, ResolveError> {
        if Signature::is_qualified(name) {
            return Ok(Signature::parse(name));
        }
        match self.candidates.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(ResolveError::UnresolvedType {
                name: name.to_string(),
                context: context.to_string(),
            }),
            Some([only]) => Ok(only.clone()),
            Some(many) => Err(ResolveError::AmbiguousType {
                name: name.to_string(),
                context: context.to_string(),
                candidates: many.iter().map(Signature::to_string).collect(),
            }),
        }
    }

    /// Look up a definition by canonical signature.
    pub fn definition(&self, signature: &Signature) -> Option<&TypeDefinition> {
        self.definitions.get(signature)
    }

    /// Number of distinct entities in the index.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterate all definitions.
    pub fn definitions(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::EntityKind;

    fn doc(package: &str, names: &[&str]) -> IrDocument {
        IrDocument::with_entities(
            package,
            names
                .iter()
                .map(|name| {
                    TypeDefinition::new(
                        EntityKind::Struct,
                        package,
                        *name,
                        format!("{package}_{}", name.to_lowercase()),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn unique_short_name_resolves() {
        let index = SignatureIndex::build(&[doc("geo", &["Point", "Rect"])]);
        let sig = index.resolve("Point", "test").unwrap();
        assert_eq!(sig.to_string(), "geo::Point");
    }

    #[test]
    fn qualified_reference_is_returned_unchanged() {
        let index = SignatureIndex::build(&[doc("geo", &["Point"])]);
        let sig = index.resolve("ui::Point", "test").unwrap();
        assert_eq!(sig.to_string(), "ui::Point");
    }

    #[test]
    fn duplicate_short_name_is_ambiguous() {
        let index = SignatureIndex::build(&[doc("geo", &["Point"]), doc("ui", &["Point"])]);
        let err = index.resolve("Point", "field 'origin' of geo::Shape");
        match err {
            Err(ResolveError::AmbiguousType {
                candidates,
                context,
                ..
            }) => {
                assert_eq!(
                    candidates,
                    vec!["geo::Point".to_string(), "ui::Point".to_string()]
                );
                assert_eq!(context, "field 'origin' of geo::Shape");
            }
            other => panic!("expected ambiguous-type error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_name_is_unresolved() {
        let index = SignatureIndex::build(&[doc("geo", &["Point"])]);
        assert!(matches!(
            index.resolve("Widget", "test"),
            Err(ResolveError::UnresolvedType { .. })
        ));
    }

    #[test]
    fn same_entity_in_two_documents_is_not_ambiguous() {
        // Re-exported IR documents can redeclare the same canonical entity.
        let index = SignatureIndex::build(&[doc("geo", &["Point"]), doc("geo", &["Point"])]);
        assert!(index.resolve("Point", "test").is_ok());
    }

    #[test]
    fn definition_lookup_after_resolution() {
        let index = SignatureIndex::build(&[doc("geo", &["Point"])]);
        let sig = index.resolve("Point", "test").unwrap();
        let def = index.definition(&sig).unwrap();
        assert_eq!(def.name, "Point");
        assert_eq!(index.len(), 1);
    }
}
