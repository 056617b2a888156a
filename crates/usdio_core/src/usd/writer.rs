//! USDA serialization.

use std::fmt::Write;

use super::stage::{Attribute, Prim, PrimId, Property, Reference, Stage, Variability};
use super::value::Value;

const INDENT: &str = "    ";

/// Serialize a stage to USDA text.
pub fn write_stage(stage: &Stage) -> String {
    let mut out = String::from("#usda 1.0\n");
    write_layer_metadata(stage, &mut out);
    for &root in stage.root_prims() {
        out.push('\n');
        write_prim(stage, root, 0, &mut out);
    }
    out
}

fn write_layer_metadata(stage: &Stage, out: &mut String) {
    let meta = &stage.metadata;
    let mut entries: Vec<String> = Vec::new();
    if let Some(doc) = &meta.documentation {
        entries.push(quote(doc));
    }
    if let Some(p) = &meta.default_prim {
        entries.push(format!("defaultPrim = {}", quote(p)));
    }
    if let Some(v) = meta.end_time_code {
        entries.push(format!("endTimeCode = {}", v));
    }
    if let Some(v) = meta.meters_per_unit {
        entries.push(format!("metersPerUnit = {}", v));
    }
    if let Some(v) = meta.start_time_code {
        entries.push(format!("startTimeCode = {}", v));
    }
    if let Some(v) = meta.time_codes_per_second {
        entries.push(format!("timeCodesPerSecond = {}", v));
    }
    if let Some(axis) = &meta.up_axis {
        entries.push(format!("upAxis = {}", quote(axis)));
    }
    for (k, v) in &meta.other {
        entries.push(format!("{} = {}", k, format_value(v, false)));
    }
    if entries.is_empty() {
        return;
    }
    out.push_str("(\n");
    for e in entries {
        let _ = writeln!(out, "{}{}", INDENT, e);
    }
    out.push_str(")\n");
}

fn write_prim(stage: &Stage, id: PrimId, depth: usize, out: &mut String) {
    let prim = stage.prim(id);
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);

    let _ = write!(out, "{}{} ", pad, prim.specifier.keyword());
    if !prim.type_name.is_empty() {
        let _ = write!(out, "{} ", prim.type_name);
    }
    let _ = write!(out, "{}", quote(&prim.name));

    let metadata = prim_metadata_entries(prim);
    if metadata.is_empty() {
        out.push('\n');
    } else {
        out.push_str(" (\n");
        for entry in metadata {
            let _ = writeln!(out, "{}{}", inner, entry);
        }
        let _ = writeln!(out, "{})", pad);
    }
    let _ = writeln!(out, "{}{{", pad);

    for property in &prim.properties {
        match property {
            Property::Attribute(attr) => write_attribute(attr, &inner, out),
            Property::Relationship(rel) => {
                let custom = if rel.custom { "custom " } else { "" };
                let _ = write!(out, "{}{}rel {}", inner, custom, rel.name);
                match rel.targets.as_slice() {
                    [] => out.push('\n'),
                    [single] => {
                        let _ = writeln!(out, " = <{}>", single);
                    }
                    many => {
                        let list: Vec<String> = many.iter().map(|t| format!("<{}>", t)).collect();
                        let _ = writeln!(out, " = [{}]", list.join(", "));
                    }
                }
            }
        }
    }

    for (i, &child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.properties.is_empty() {
            out.push('\n');
        }
        write_prim(stage, child, depth + 1, out);
    }
    let _ = writeln!(out, "{}}}", pad);
}

fn prim_metadata_entries(prim: &Prim) -> Vec<String> {
    let meta = &prim.metadata;
    let mut entries = Vec::new();
    if let Some(doc) = &meta.documentation {
        entries.push(format!("doc = {}", quote(doc)));
    }
    if let Some(active) = meta.active {
        entries.push(format!("active = {}", active));
    }
    if let Some(kind) = &meta.kind {
        entries.push(format!("kind = {}", quote(kind)));
    }
    if let Some(instanceable) = meta.instanceable {
        entries.push(format!("instanceable = {}", instanceable));
    }
    match meta.references.as_slice() {
        [] => {}
        [single] => entries.push(format!("prepend references = {}", format_reference(single))),
        many => {
            let list: Vec<String> = many.iter().map(format_reference).collect();
            entries.push(format!("prepend references = [{}]", list.join(", ")));
        }
    }
    for (k, v) in &meta.other {
        entries.push(format!("{} = {}", k, format_value(v, false)));
    }
    entries
}

fn format_reference(reference: &Reference) -> String {
    let mut s = String::new();
    if let Some(asset) = &reference.asset_path {
        let _ = write!(s, "@{}@", asset);
    }
    if let Some(path) = &reference.prim_path {
        let _ = write!(s, "<{}>", path);
    }
    s
}

fn write_attribute(attr: &Attribute, pad: &str, out: &mut String) {
    let mut decl = String::new();
    if attr.custom {
        decl.push_str("custom ");
    }
    if attr.variability == Variability::Uniform {
        decl.push_str("uniform ");
    }
    let _ = write!(decl, "{} {}", attr.type_name, attr.name);
    let single = is_single_precision(&attr.type_name);

    let has_declaration_line = attr.default.is_some()
        || !attr.metadata.is_empty()
        || (attr.time_samples.is_empty() && attr.connections.is_empty());
    if has_declaration_line {
        let _ = write!(out, "{}{}", pad, decl);
        if let Some(value) = &attr.default {
            let _ = write!(out, " = {}", format_value(value, single));
        }
        if attr.metadata.is_empty() {
            out.push('\n');
        } else {
            out.push_str(" (\n");
            for (k, v) in &attr.metadata {
                let _ = writeln!(out, "{}{}{} = {}", pad, INDENT, k, format_value(v, false));
            }
            let _ = writeln!(out, "{})", pad);
        }
    }

    if !attr.time_samples.is_empty() {
        let _ = writeln!(out, "{}{}.timeSamples = {{", pad, decl);
        for (t, v) in &attr.time_samples {
            let _ = writeln!(out, "{}{}{}: {},", pad, INDENT, t, format_value(v, single));
        }
        let _ = writeln!(out, "{}}}", pad);
    }

    match attr.connections.as_slice() {
        [] => {}
        [single_target] => {
            let _ = writeln!(out, "{}{}.connect = <{}>", pad, decl, single_target);
        }
        many => {
            let list: Vec<String> = many.iter().map(|t| format!("<{}>", t)).collect();
            let _ = writeln!(out, "{}{}.connect = [{}]", pad, decl, list.join(", "));
        }
    }
}

/// Value types stored as 32-bit floats; written with `f32` precision.
fn is_single_precision(type_name: &str) -> bool {
    let base = type_name.trim_end_matches("[]");
    base.starts_with("float")
        || base.starts_with("half")
        || base.ends_with('f')
        || base.ends_with('h')
}

fn format_number(n: f64, single: bool) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if n.is_nan() {
        return "nan".into();
    }
    if single {
        format!("{}", n as f32)
    } else {
        format!("{}", n)
    }
}

fn format_value(value: &Value, single: bool) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n, single),
        Value::String(s) => quote(s),
        Value::Token(t) => t.clone(),
        Value::Asset(a) => format!("@{}@", a),
        Value::Path(p) => format!("<{}>", p),
        Value::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|v| format_value(v, single)).collect();
            format!("({})", parts.join(", "))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(|v| format_value(v, single)).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Dictionary(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} = {}", k, format_value(v, single)))
                .collect();
            format!("{{ {} }}", parts.join("; "))
        }
        Value::Blocked => "None".to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
