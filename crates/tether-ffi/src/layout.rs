//! Layout resolution: probing true memory layout at bind time.
//!
//! Static offsets declared anywhere are never trusted. At first use of an
//! entity, its "describe layout" entry point is invoked; the foreign side
//! reports `name:offset:size` triples for every field plus a reserved
//! [`SELF_SENTINEL`] entry carrying the entity's total size. The report is
//! converted into an ordered [`EntityLayout`] with every gap made explicit
//! as padding.
//!
//! Any parse error, and any declared field missing from the report, is fatal:
//! a partially laid-out type would produce layout-incorrect bindings.

use rustc_hash::FxHashMap;

use tether_core::{
    EntityLayout, Field, FieldLayout, LayoutSegment, ResolveError, TypeDefinition, VariantLayout,
};

use crate::foreign::{RawValue, read_cstring};
use crate::handle::Handle;

/// Reserved report entry giving the entity's total size.
pub const SELF_SENTINEL: &str = "__self";

/// Invoke the layout probe and parse its report.
///
/// The probe returns a NUL-terminated UTF-8 buffer owned by the foreign
/// side; it is released through the shared string-deallocation entry point
/// once copied.
pub fn probe_layout(
    entity: &TypeDefinition,
    layout_probe: &Handle,
    string_free: &Handle,
) -> Result<EntityLayout, ResolveError> {
    let malformed = |detail: String| ResolveError::MalformedLayout {
        entity: entity.signature.to_string(),
        detail,
    };

    let report = layout_probe
        .invoke(Vec::new())
        .map_err(|e| malformed(format!("layout probe failed: {e}")))?;
    let report_ptr = match report {
        RawValue::Ptr(p) => p,
        other => {
            return Err(malformed(format!(
                "layout probe returned {}, expected a string pointer",
                other.kind_name()
            )));
        }
    };
    let text = read_cstring(report_ptr).map_err(|e| malformed(e.to_string()))?;
    if let Err(e) = string_free.invoke(vec![RawValue::Ptr(report_ptr)]) {
        tracing::warn!(entity = %entity.signature, error = %e, "failed to free layout report");
    }

    tracing::debug!(entity = %entity.signature, report = %text, "layout probed");
    parse_report(entity, &text)
}

/// Parse a layout report into the entity's resolved layout.
pub fn parse_report(entity: &TypeDefinition, report: &str) -> Result<EntityLayout, ResolveError> {
    let mut entries = parse_entries(entity, report)?;
    let (_, total_size) =
        entries
            .remove(SELF_SENTINEL)
            .ok_or_else(|| ResolveError::MalformedLayout {
                entity: entity.signature.to_string(),
                detail: format!("missing reserved '{SELF_SENTINEL}' entry"),
            })?;

    let fields = if entity.fields.is_empty() {
        // Pure enumerations and opaque handles: one opaque segment.
        FieldLayout::opaque(total_size)
    } else {
        walk_fields(entity, &entity.fields, &entries, None, total_size)?
    };

    // Variants with payload fields are each anchored within a structure of
    // the entity's maximum variant size.
    let mut variants = Vec::new();
    for variant in &entity.variants {
        if variant.fields.is_empty() {
            continue;
        }
        let layout = walk_fields(
            entity,
            &variant.fields,
            &entries,
            Some(&variant.name),
            total_size,
        )?;
        variants.push(VariantLayout {
            name: variant.name.clone(),
            layout,
        });
    }

    Ok(EntityLayout {
        fields,
        variants,
        total_size,
    })
}

fn parse_entries(
    entity: &TypeDefinition,
    report: &str,
) -> Result<FxHashMap<String, (usize, usize)>, ResolveError> {
    let malformed = |detail: String| ResolveError::MalformedLayout {
        entity: entity.signature.to_string(),
        detail,
    };

    let mut entries = FxHashMap::default();
    for triple in report.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let mut parts = triple.splitn(3, ':');
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed(format!("empty name in triple '{triple}'")))?;
        let offset = parts
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| malformed(format!("bad offset in triple '{triple}'")))?;
        let size = parts
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| malformed(format!("bad size in triple '{triple}'")))?;
        entries.insert(name.to_string(), (offset, size));
    }
    Ok(entries)
}

/// Lay out one field list: declared fields in offset order, padding wherever
/// the running cursor trails the next offset, and a tail padding segment up
/// to the declared total size.
fn walk_fields(
    entity: &TypeDefinition,
    declared: &[Field],
    entries: &FxHashMap<String, (usize, usize)>,
    variant: Option<&str>,
    total_size: usize,
) -> Result<FieldLayout, ResolveError> {
    let malformed = |detail: String| ResolveError::MalformedLayout {
        entity: entity.signature.to_string(),
        detail,
    };

    let mut located = Vec::with_capacity(declared.len());
    for field in declared {
        let key = match variant {
            Some(v) => format!("{v}.{}", field.name),
            None => field.name.clone(),
        };
        let (offset, size) = entries
            .get(&key)
            .copied()
            .ok_or_else(|| ResolveError::MissingLayoutField {
                entity: entity.signature.to_string(),
                field: key.clone(),
            })?;
        located.push((field, offset, size));
    }
    located.sort_by_key(|(_, offset, _)| *offset);

    let mut segments = Vec::new();
    let mut cursor = 0usize;
    for (field, offset, size) in located {
        if offset < cursor {
            return Err(malformed(format!(
                "field '{}' at offset {offset} overlaps the previous segment ending at {cursor}",
                field.name
            )));
        }
        if offset > cursor {
            segments.push(LayoutSegment::Padding {
                offset: cursor,
                size: offset - cursor,
            });
        }
        match field.ty.natural_size() {
            Some(natural) if natural > size => {
                return Err(malformed(format!(
                    "field '{}' reported as {size} bytes but the host representation needs {natural}",
                    field.name
                )));
            }
            // Foreign-reported size exceeds the host's natural size: the
            // typed segment keeps the natural size, the rest is padding.
            Some(natural) if natural < size => {
                segments.push(LayoutSegment::Field {
                    name: field.name.clone(),
                    offset,
                    size: natural,
                });
                segments.push(LayoutSegment::Padding {
                    offset: offset + natural,
                    size: size - natural,
                });
            }
            _ => {
                segments.push(LayoutSegment::Field {
                    name: field.name.clone(),
                    offset,
                    size,
                });
            }
        }
        cursor = offset + size;
    }

    if cursor > total_size {
        return Err(malformed(format!(
            "fields end at {cursor}, past the declared total size {total_size}"
        )));
    }
    if cursor < total_size {
        segments.push(LayoutSegment::Padding {
            offset: cursor,
            size: total_size - cursor,
        });
    }

    Ok(FieldLayout {
        segments,
        total_size,
    })
}
