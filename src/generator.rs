//! The generation pipeline.
//!
//! IR documents flow through three steps: every textual type reference is
//! canonicalized against the signature index, a [`BindingPlan`] is computed
//! per entity, and the emitter turns each plan into binding source. Layout
//! is not resolved here; generated code probes it lazily at first use, and
//! the runtime side does the same through [`tether_ffi::BoundEntity`].

use tether_core::{BindResult, IrDocument, ResolveError, Signature, TypeRef};
use tether_ffi::BindingPlan;
use tether_registry::SignatureIndex;

use crate::emit;
use crate::options::BindOptions;

/// One emitted source file.
#[derive(Debug, Clone)]
pub struct GeneratedUnit {
    pub signature: Signature,
    pub file_name: String,
    pub source: String,
}

/// Binding generator over a set of IR documents.
#[derive(Default)]
pub struct Generator {
    options: BindOptions,
}

impl Generator {
    pub fn new(options: BindOptions) -> Self {
        Self { options }
    }

    /// Resolve references, plan every entity, and emit its binding source.
    ///
    /// Output is sorted by canonical signature so a build emits the same
    /// file set in the same order every time.
    pub fn generate(&self, mut documents: Vec<IrDocument>) -> BindResult<Vec<GeneratedUnit>> {
        resolve_references(&mut documents)?;

        let mut units = Vec::new();
        for doc in &documents {
            for entity in &doc.entities {
                let plan = BindingPlan::for_entity(entity);
                tracing::debug!(entity = %plan.signature, "planned entity");
                units.push(GeneratedUnit {
                    signature: entity.signature.clone(),
                    file_name: format!("{}.kt", entity.name),
                    source: emit::entity_source(entity, &plan, &self.options),
                });
            }
        }
        units.sort_by(|a, b| a.signature.cmp(&b.signature));
        units.dedup_by(|a, b| a.signature == b.signature);
        Ok(units)
    }
}

/// Canonicalize every type reference in every document, in place.
///
/// Fails fast on the first unresolved or ambiguous reference; a partially
/// resolved document set is never handed onwards.
pub fn resolve_references(documents: &mut [IrDocument]) -> BindResult<()> {
    let index = SignatureIndex::build(documents);

    for doc in documents.iter_mut() {
        for entity in doc.entities.iter_mut() {
            let owner = entity.signature.to_string();
            for field in entity.fields.iter_mut() {
                let context = format!("field '{}' of {owner}", field.name);
                canonicalize(&mut field.ty, &index, &context)?;
            }
            for variant in entity.variants.iter_mut() {
                for field in variant.fields.iter_mut() {
                    let context =
                        format!("variant field '{}.{}' of {owner}", variant.name, field.name);
                    canonicalize(&mut field.ty, &index, &context)?;
                }
            }
            for method in entity.methods.iter_mut() {
                for arg in method.args.iter_mut() {
                    let context = format!(
                        "argument '{}' of method '{}' on {owner}",
                        arg.name, method.name
                    );
                    canonicalize(&mut arg.ty, &index, &context)?;
                }
                if let Some(ret) = method.ret.as_mut() {
                    let context = format!("return type of method '{}' on {owner}", method.name);
                    canonicalize(ret, &index, &context)?;
                }
            }
        }
    }
    Ok(())
}

fn canonicalize(
    ty: &mut TypeRef,
    index: &SignatureIndex,
    context: &str,
) -> Result<(), ResolveError> {
    let mut failure = None;
    ty.for_each_object_mut(&mut |signature| {
        if failure.is_some() {
            return;
        }
        match index.resolve(signature, context) {
            Ok(canonical) => *signature = canonical.to_string(),
            Err(e) => failure = Some(e),
        }
    });
    match failure {
        None => Ok(()),
        Some(e) => Err(e),
    }
}
