//! Resolved memory layouts.
//!
//! A layout is the ordered set of byte offsets and sizes describing how an
//! entity's fields map onto native memory, with every gap made explicit as a
//! padding segment. Layouts come from the foreign library's layout probe at
//! bind time, never from statically declared offsets.

/// One contiguous piece of an entity's memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSegment {
    /// A typed field segment.
    Field {
        name: String,
        offset: usize,
        size: usize,
    },
    /// Bytes with no host-visible meaning.
    Padding { offset: usize, size: usize },
}

impl LayoutSegment {
    pub fn offset(&self) -> usize {
        match self {
            LayoutSegment::Field { offset, .. } | LayoutSegment::Padding { offset, .. } => *offset,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            LayoutSegment::Field { size, .. } | LayoutSegment::Padding { size, .. } => *size,
        }
    }

    /// First byte past this segment.
    pub fn end(&self) -> usize {
        self.offset() + self.size()
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, LayoutSegment::Padding { .. })
    }
}

/// Ordered field layout of a structure (or of one enum variant).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldLayout {
    /// Segments ordered by offset, padding explicit.
    pub segments: Vec<LayoutSegment>,
    /// Declared total size of the structure.
    pub total_size: usize,
}

impl FieldLayout {
    /// A layout with no host-visible fields: one opaque padding segment.
    pub fn opaque(total_size: usize) -> Self {
        let segments = if total_size == 0 {
            Vec::new()
        } else {
            vec![LayoutSegment::Padding {
                offset: 0,
                size: total_size,
            }]
        };
        Self {
            segments,
            total_size,
        }
    }

    /// Offset and size of a named field.
    pub fn field(&self, name: &str) -> Option<(usize, usize)> {
        self.segments.iter().find_map(|seg| match seg {
            LayoutSegment::Field {
                name: n,
                offset,
                size,
            } if n == name => Some((*offset, *size)),
            _ => None,
        })
    }

    /// Total bytes covered by padding segments.
    pub fn padding_bytes(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.is_padding())
            .map(LayoutSegment::size)
            .sum()
    }
}

/// Layout of one enum variant, anchored within the entity's maximum size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantLayout {
    pub name: String,
    pub layout: FieldLayout,
}

/// The complete resolved layout of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLayout {
    /// Struct fields (or the opaque segment for fieldless entities).
    pub fields: FieldLayout,
    /// Per-variant layouts for enums with payload fields.
    pub variants: Vec<VariantLayout>,
    /// The entity's declared total size.
    pub total_size: usize,
}

impl EntityLayout {
    pub fn field(&self, name: &str) -> Option<(usize, usize)> {
        self.fields.field(name)
    }

    pub fn variant(&self, name: &str) -> Option<&VariantLayout> {
        self.variants.iter().find(|v| v.name == name)
    }
}
