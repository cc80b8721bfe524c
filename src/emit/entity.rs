//! Per-entity emission of host binding source.
//!
//! The emitter is formatting only: everything semantic arrives in the
//! [`BindingPlan`], and the output is host (Kotlin) source that routes every
//! member through the host-side runtime. Layout is not emitted; generated
//! code probes it lazily through the planned layout symbol.

use tether_core::{
    EntityKind, LockDiscipline, Method, MethodKind, Ownership, Primitive, TypeDefinition, TypeRef,
};
use tether_ffi::BindingPlan;

use super::writer::SourceWriter;
use crate::options::BindOptions;

/// Emit the binding source for one entity.
pub fn entity_source(def: &TypeDefinition, plan: &BindingPlan, options: &BindOptions) -> String {
    let mut w = SourceWriter::new(options.indent_width);
    w.line("// Generated by tether. Do not edit.");
    w.line(format!("package {}", def.package));
    w.blank();

    for doc in &def.docs {
        w.line(format!("// {doc}"));
    }
    match def.kind {
        EntityKind::FreeFunction => emit_free_functions(&mut w, def, plan),
        EntityKind::Enum if !def.has_payload_variants() && def.fields.is_empty() => {
            emit_plain_enum(&mut w, def)
        }
        _ => emit_class(&mut w, def, plan),
    }
    w.finish()
}

fn host_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(p) => match p {
            Primitive::Bool => "Boolean",
            Primitive::I8 => "Byte",
            Primitive::I16 => "Short",
            Primitive::I32 => "Int",
            Primitive::I64 => "Long",
            Primitive::U8 => "UByte",
            Primitive::U16 => "UShort",
            Primitive::U32 => "UInt",
            Primitive::U64 => "ULong",
            Primitive::F32 => "Float",
            Primitive::F64 => "Double",
        }
        .to_string(),
        TypeRef::Str => "String".to_string(),
        TypeRef::RawPtr => "NativePointer".to_string(),
        TypeRef::Object { signature, .. } => signature
            .rsplit("::")
            .next()
            .unwrap_or(signature)
            .to_string(),
        TypeRef::Optional(inner) => format!("{}?", host_type(inner)),
        TypeRef::ResultOf { ok, .. } => format!("Result<{}>", host_type(ok)),
        TypeRef::List(item) => format!("List<{}>", host_type(item)),
        TypeRef::Map { key, value } => format!("Map<{}, {}>", host_type(key), host_type(value)),
        TypeRef::Async(inner) => host_type(inner),
    }
}

fn discipline_name(discipline: LockDiscipline) -> &'static str {
    match discipline {
        LockDiscipline::None => "NONE",
        LockDiscipline::AtomicCas => "ATOMIC_CAS",
        LockDiscipline::FairWrite => "FAIR_WRITE",
        LockDiscipline::OptimisticRead => "OPTIMISTIC_READ",
        LockDiscipline::ReadLock => "READ_LOCK",
        LockDiscipline::WriteLock => "WRITE_LOCK",
    }
}

fn parameter_list(method: &Method) -> String {
    method
        .args
        .iter()
        .map(|arg| format!("{}: {}", arg.name, host_type(&arg.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn argument_list(method: &Method) -> String {
    method
        .args
        .iter()
        .map(|arg| arg.name.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit_plain_enum(w: &mut SourceWriter, def: &TypeDefinition) {
    let variants = def
        .variants
        .iter()
        .map(|v| v.name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    w.line(format!("public enum class {} {{ {variants} }}", def.name));
}

fn emit_class(w: &mut SourceWriter, def: &TypeDefinition, plan: &BindingPlan) {
    w.block(
        format!(
            "public class {} internal constructor(runtime: BoundInstance) : NativeObject(runtime), AutoCloseable {{",
            def.name
        ),
        "}",
        |w| {
            emit_fields(w, def);
            emit_methods(w, def);
            w.blank();
            w.block("override fun close() {", "}", |w| {
                w.line("runtime.release()");
            });
            w.blank();
            emit_companion(w, def, plan);
        },
    );
}

fn emit_fields(w: &mut SourceWriter, def: &TypeDefinition) {
    for field in &def.fields {
        let ty = host_type(&field.ty);
        match &field.ty {
            TypeRef::Str => {
                w.block(format!("public var {}: {ty}", field.name), "", |w| {
                    w.line(format!("get() = runtime.readString(\"{}\")", field.name));
                    w.line(format!(
                        "set(value) {{ runtime.writeString(\"{}\", value) }}",
                        field.name
                    ));
                });
            }
            TypeRef::Optional(_) | TypeRef::ResultOf { .. } => {
                w.block(format!("public var {}: {ty}", field.name), "", |w| {
                    w.line(format!("get() = runtime.accessorGet(\"{}\")", field.name));
                    w.line(format!(
                        "set(value) {{ runtime.accessorSet(\"{}\", value) }}",
                        field.name
                    ));
                });
            }
            TypeRef::Object { ownership, .. } => {
                // Derived wrapper; validity is derivative of this instance.
                let accessor = match ownership {
                    Ownership::MutBorrowed => "fieldObjectMut",
                    _ => "fieldObject",
                };
                w.line(format!(
                    "public val {}: {ty} get() = runtime.{accessor}(\"{}\")",
                    field.name, field.name
                ));
            }
            _ => {
                w.block(format!("public var {}: {ty}", field.name), "", |w| {
                    w.line(format!("get() = runtime.readScalar(\"{}\")", field.name));
                    w.line(format!(
                        "set(value) {{ runtime.writeScalar(\"{}\", value) }}",
                        field.name
                    ));
                });
            }
        }
    }
}

fn emit_methods(w: &mut SourceWriter, def: &TypeDefinition) {
    for method in def.methods.iter().filter(|m| !m.is_constructor) {
        if method.kind == MethodKind::Static {
            continue; // statics live on the companion
        }
        w.blank();
        let params = parameter_list(method);
        let args = argument_list(method);
        let call_args = if args.is_empty() {
            format!("\"{}\"", method.name)
        } else {
            format!("\"{}\", {args}", method.name)
        };
        let ret = method
            .ret
            .as_ref()
            .map(|ty| format!(": {}", host_type(ty)))
            .unwrap_or_default();
        if method.is_async {
            w.line(format!(
                "public suspend fun {}({params}){ret} = runtime.callAsync({call_args})",
                method.name
            ));
        } else {
            w.line(format!(
                "public fun {}({params}){ret} = runtime.call({call_args})",
                method.name
            ));
        }
    }
}

fn emit_companion(w: &mut SourceWriter, def: &TypeDefinition, plan: &BindingPlan) {
    w.block("public companion object {", "}", |w| {
        emit_binding_table(w, def, plan);
        w.blank();

        if let Some(lifecycle) = &plan.lifecycle {
            w.line(format!(
                "public fun create(): {} = Runtime.construct(binding)",
                def.name
            ));
            if lifecycle.duplicate.is_some() {
                w.line(format!(
                    "public fun copyOf(source: {0}): {0} = Runtime.duplicate(binding, source)",
                    def.name
                ));
            }
        }
        for method in def.methods.iter().filter(|m| m.is_constructor) {
            let params = parameter_list(method);
            let args = argument_list(method);
            let tail = if args.is_empty() {
                String::new()
            } else {
                format!(", {args}")
            };
            w.line(format!(
                "public fun {}({params}): {} = Runtime.constructVia(binding, \"{}\"{tail})",
                method.name, def.name, method.name
            ));
        }
        for method in def
            .methods
            .iter()
            .filter(|m| m.kind == MethodKind::Static && !m.is_constructor)
        {
            let params = parameter_list(method);
            let args = argument_list(method);
            let tail = if args.is_empty() {
                String::new()
            } else {
                format!(", {args}")
            };
            let ret = method
                .ret
                .as_ref()
                .map(|ty| format!(": {}", host_type(ty)))
                .unwrap_or_default();
            w.line(format!(
                "public fun {}({params}){ret} = Runtime.callStatic(binding, \"{}\"{tail})",
                method.name, method.name
            ));
        }
    });
}

fn emit_binding_table(w: &mut SourceWriter, def: &TypeDefinition, plan: &BindingPlan) {
    w.block("internal val binding: EntityBinding = EntityBinding(", ")", |w| {
        w.line(format!("signature = \"{}\",", plan.signature));
        w.line(format!("stringFree = \"{}\",", plan.string_free_symbol));
        if let Some(lifecycle) = &plan.lifecycle {
            w.block("lifecycle = Lifecycle(", "),", |w| {
                w.line(format!("construct = \"{}\",", lifecycle.construct));
                w.line(format!("destroy = \"{}\",", lifecycle.destroy));
                match &lifecycle.duplicate {
                    Some(symbol) => w.line(format!("duplicate = \"{symbol}\",")),
                    None => w.line("duplicate = null,"),
                }
                w.line(format!("borrow = \"{}\",", lifecycle.borrow));
                w.line(format!("borrowMut = \"{}\",", lifecycle.borrow_mut));
                w.line(format!("layoutProbe = \"{}\",", lifecycle.layout_probe));
            });
        }
        if !plan.accessors.is_empty() {
            w.block("accessors = mapOf(", "),", |w| {
                for accessor in &plan.accessors {
                    w.line(format!(
                        "\"{}\" to AccessorPair(\"{}\", \"{}\"),",
                        accessor.field, accessor.get_symbol, accessor.set_symbol
                    ));
                }
            });
        }
        if !plan.methods.is_empty() {
            w.block("methods = mapOf(", "),", |w| {
                for method in &plan.methods {
                    w.line(format!(
                        "\"{}\" to MethodBinding(\"{}\", async = {}, selfLock = {}),",
                        method.name,
                        method.symbol,
                        method.is_async,
                        discipline_name(method.self_lock)
                    ));
                }
            });
        }
        if !plan.locks.is_empty() {
            w.block("locks = mapOf(", "),", |w| {
                for lock in &plan.locks {
                    w.line(format!(
                        "\"{}\" to LockPlan(read = {}, write = {}),",
                        lock.member,
                        discipline_name(lock.read),
                        discipline_name(lock.write)
                    ));
                }
            });
        }
    });
}

fn emit_free_functions(w: &mut SourceWriter, def: &TypeDefinition, plan: &BindingPlan) {
    let object_name = {
        let mut chars = def.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => def.name.clone(),
        }
    };
    w.block(format!("public object {object_name} {{"), "}", |w| {
        emit_binding_table(w, def, plan);
        w.blank();
        for method in &def.methods {
            let params = parameter_list(method);
            let args = argument_list(method);
            let tail = if args.is_empty() {
                String::new()
            } else {
                format!(", {args}")
            };
            let ret = method
                .ret
                .as_ref()
                .map(|ty| format!(": {}", host_type(ty)))
                .unwrap_or_default();
            let keyword = if method.is_async {
                "suspend fun"
            } else {
                "fun"
            };
            w.line(format!(
                "public {keyword} {}({params}){ret} = Runtime.callStatic(binding, \"{}\"{tail})",
                method.name, method.name
            ));
        }
    });
}
