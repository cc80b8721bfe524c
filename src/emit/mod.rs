//! Source emission for generated bindings.

mod entity;
mod writer;

pub use entity::entity_source;
pub use writer::SourceWriter;
