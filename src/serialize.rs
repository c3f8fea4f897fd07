//! Content-type–driven serialization: json/yaml/toml/xml (`spec.md` §6).
//!
//! The core only needs enough of each format to round-trip SLIP's own value
//! model (`Int`/`Float`/`Bool`/`Null`/`Str`/`List`/`Dict`); none of these
//! crates were in `ouros`'s own dependency table (a sandboxed Python
//! interpreter has no reason to speak YAML/XML), so they're pulled in from
//! `other_examples/manifests/typst-typst/Cargo.toml`, the closest pack
//! example that already serializes through this same format set.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{EvalResult, SlipError};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    Yaml,
    Toml,
    Xml,
    Text,
}

/// Picks a format from an explicit content-type/extension hint, falling
/// back to the file's extension, and finally to plain text.
pub(crate) fn detect_format(hint: Option<&str>, path: &Path) -> Format {
    if let Some(hint) = hint {
        if let Some(fmt) = format_from_token(hint) {
            return fmt;
        }
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format_from_token(ext).unwrap_or(Format::Text),
        None => Format::Text,
    }
}

fn format_from_token(token: &str) -> Option<Format> {
    let token = token.rsplit('/').next().unwrap_or(token);
    match token.to_ascii_lowercase().as_str() {
        "json" | "application/json" => Some(Format::Json),
        "yaml" | "yml" | "application/yaml" | "text/yaml" => Some(Format::Yaml),
        "toml" | "application/toml" => Some(Format::Toml),
        "xml" | "application/xml" | "text/xml" => Some(Format::Xml),
        "txt" | "text/plain" => Some(Format::Text),
        _ => None,
    }
}

pub(crate) fn decode_bytes(bytes: &[u8], path: &Path, hint: Option<&str>) -> EvalResult<Value> {
    match detect_format(hint, path) {
        Format::Json => {
            let v: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| SlipError::runtime(format!("invalid json: {e}")))?;
            Ok(json_to_value(&v))
        }
        Format::Yaml => {
            let v: serde_yaml::Value = serde_yaml::from_slice(bytes).map_err(|e| SlipError::runtime(format!("invalid yaml: {e}")))?;
            Ok(yaml_to_value(&v))
        }
        Format::Toml => {
            let text = std::str::from_utf8(bytes).map_err(|e| SlipError::runtime(format!("invalid utf-8 toml: {e}")))?;
            let doc: toml_edit::DocumentMut = text.parse().map_err(|e| SlipError::runtime(format!("invalid toml: {e}")))?;
            Ok(toml_item_to_value(doc.as_item()))
        }
        Format::Xml => {
            let text = std::str::from_utf8(bytes).map_err(|e| SlipError::runtime(format!("invalid utf-8 xml: {e}")))?;
            let doc = roxmltree::Document::parse(text).map_err(|e| SlipError::runtime(format!("invalid xml: {e}")))?;
            Ok(xml_node_to_value(doc.root_element()))
        }
        Format::Text => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            Ok(Value::str(text))
        }
    }
}

pub(crate) fn encode_value(value: &Value, path: &Path, hint: Option<&str>) -> EvalResult<Vec<u8>> {
    match detect_format(hint, path) {
        Format::Json => {
            let v = value_to_json(value);
            serde_json::to_vec_pretty(&v).map_err(|e| SlipError::runtime(format!("cannot serialize to json: {e}")))
        }
        Format::Yaml => {
            let v = value_to_yaml(value);
            serde_yaml::to_string(&v).map(String::into_bytes).map_err(|e| SlipError::runtime(format!("cannot serialize to yaml: {e}")))
        }
        Format::Toml => {
            let doc = value_to_toml_document(value)?;
            Ok(doc.to_string().into_bytes())
        }
        Format::Xml => encode_xml(value),
        Format::Text => Ok(value.to_string().into_bytes()),
    }
}

/// For locator writes where no path extension is available (e.g. an HTTP
/// PUT body): defaults to JSON for dict/list, plain text otherwise
/// (`spec.md` §4.2 `set`: "Default to JSON when no content-type is provided
/// and value is dict/list").
pub(crate) fn encode_for_wire(value: &Value, hint: Option<&str>) -> EvalResult<Vec<u8>> {
    let fmt = hint.and_then(format_from_token).unwrap_or_else(|| match value {
        Value::Dict(_) | Value::List(_) => Format::Json,
        _ => Format::Text,
    });
    match fmt {
        Format::Json => serde_json::to_vec_pretty(&value_to_json(value)).map_err(|e| SlipError::runtime(format!("cannot serialize to json: {e}"))),
        Format::Yaml => serde_yaml::to_string(&value_to_yaml(value)).map(String::into_bytes).map_err(|e| SlipError::runtime(format!("cannot serialize to yaml: {e}"))),
        Format::Toml => Ok(value_to_toml_document(value)?.to_string().into_bytes()),
        Format::Xml => encode_xml(value),
        Format::Text => Ok(value.to_string().into_bytes()),
    }
}

fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::str(s.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                out.insert(k.clone(), json_to_value(v));
            }
            Value::dict(out)
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::BigInt(b) => serde_json::Value::String(b.to_string()),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::Str(s) | Value::IString(s) => serde_json::Value::String(s.to_string()),
        Value::List(l) => serde_json::Value::Array(l.borrow().iter().map(value_to_json).collect()),
        Value::Dict(d) => {
            let mut map = serde_json::Map::new();
            for (k, v) in d.borrow().iter() {
                map.insert(k.clone(), value_to_json(v));
            }
            serde_json::Value::Object(map)
        }
        other => serde_json::Value::String(other.to_string()),
    }
}

fn yaml_to_value(v: &serde_yaml::Value) -> Value {
    match v {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_yaml::Value::String(s) => Value::str(s.clone()),
        serde_yaml::Value::Sequence(items) => Value::list(items.iter().map(yaml_to_value).collect()),
        serde_yaml::Value::Mapping(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    out.insert(key.to_owned(), yaml_to_value(v));
                }
            }
            Value::dict(out)
        }
        serde_yaml::Value::Tagged(t) => yaml_to_value(&t.value),
    }
}

fn value_to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Int(i) => serde_yaml::Value::Number((*i).into()),
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Null => serde_yaml::Value::Null,
        Value::Str(s) | Value::IString(s) => serde_yaml::Value::String(s.to_string()),
        Value::List(l) => serde_yaml::Value::Sequence(l.borrow().iter().map(value_to_yaml).collect()),
        Value::Dict(d) => {
            let mut map = serde_yaml::Mapping::new();
            for (k, v) in d.borrow().iter() {
                map.insert(serde_yaml::Value::String(k.clone()), value_to_yaml(v));
            }
            serde_yaml::Value::Mapping(map)
        }
        other => serde_yaml::Value::String(other.to_string()),
    }
}

fn toml_item_to_value(item: &toml_edit::Item) -> Value {
    match item {
        toml_edit::Item::None => Value::Null,
        toml_edit::Item::Value(v) => toml_value_to_value(v),
        toml_edit::Item::Table(t) => {
            let mut out = IndexMap::new();
            for (k, v) in t.iter() {
                out.insert(k.to_owned(), toml_item_to_value(v));
            }
            Value::dict(out)
        }
        toml_edit::Item::ArrayOfTables(arr) => Value::list(arr.iter().map(|t| toml_item_to_value(&toml_edit::Item::Table(t.clone()))).collect()),
    }
}

fn toml_value_to_value(v: &toml_edit::Value) -> Value {
    match v {
        toml_edit::Value::String(s) => Value::str(s.value().clone()),
        toml_edit::Value::Integer(i) => Value::Int(*i.value()),
        toml_edit::Value::Float(f) => Value::Float(*f.value()),
        toml_edit::Value::Boolean(b) => Value::Bool(*b.value()),
        toml_edit::Value::Datetime(d) => Value::str(d.value().to_string()),
        toml_edit::Value::Array(arr) => Value::list(arr.iter().map(toml_value_to_value).collect()),
        toml_edit::Value::InlineTable(t) => {
            let mut out = IndexMap::new();
            for (k, v) in t.iter() {
                out.insert(k.to_owned(), toml_value_to_value(v));
            }
            Value::dict(out)
        }
    }
}

fn value_to_toml_document(value: &Value) -> EvalResult<toml_edit::DocumentMut> {
    let Value::Dict(_) = value else {
        return Err(SlipError::type_error("toml serialization requires a dict at the top level"));
    };
    let item = value_to_toml_item(value);
    let mut doc = toml_edit::DocumentMut::new();
    if let toml_edit::Item::Table(table) = item {
        *doc.as_table_mut() = table;
    }
    Ok(doc)
}

fn value_to_toml_item(value: &Value) -> toml_edit::Item {
    match value {
        Value::Dict(d) => {
            let mut table = toml_edit::Table::new();
            for (k, v) in d.borrow().iter() {
                table.insert(k, value_to_toml_item(v));
            }
            toml_edit::Item::Table(table)
        }
        other => toml_edit::Item::Value(value_to_toml_value(other)),
    }
}

fn value_to_toml_value(value: &Value) -> toml_edit::Value {
    match value {
        Value::Int(i) => (*i).into(),
        Value::Float(f) => (*f).into(),
        Value::Bool(b) => (*b).into(),
        Value::Str(s) | Value::IString(s) => s.to_string().into(),
        Value::List(l) => {
            let mut arr = toml_edit::Array::new();
            for v in l.borrow().iter() {
                arr.push(value_to_toml_value(v));
            }
            arr.into()
        }
        Value::Dict(d) => {
            let mut table = toml_edit::InlineTable::new();
            for (k, v) in d.borrow().iter() {
                table.insert(k, value_to_toml_value(v));
            }
            table.into()
        }
        other => other.to_string().into(),
    }
}

const XML_LIST_ITEM_TAG: &str = "item";

fn xml_node_to_value(node: roxmltree::Node) -> Value {
    if node.children().all(|c| c.is_text()) && !node.has_children_with_tag(XML_LIST_ITEM_TAG) {
        let text: String = node.text().unwrap_or("").trim().to_owned();
        return Value::str(text);
    }
    let child_elements: Vec<roxmltree::Node> = node.children().filter(roxmltree::Node::is_element).collect();
    if !child_elements.is_empty() && child_elements.iter().all(|c| c.tag_name().name() == XML_LIST_ITEM_TAG) {
        return Value::list(child_elements.iter().map(|c| xml_node_to_value(*c)).collect());
    }
    let mut out = IndexMap::new();
    for child in child_elements {
        out.insert(child.tag_name().name().to_owned(), xml_node_to_value(child));
    }
    Value::dict(out)
}

trait NodeExt {
    fn has_children_with_tag(&self, tag: &str) -> bool;
}

impl NodeExt for roxmltree::Node<'_, '_> {
    fn has_children_with_tag(&self, tag: &str) -> bool {
        self.children().any(|c| c.is_element() && c.tag_name().name() == tag)
    }
}

fn encode_xml(value: &Value) -> EvalResult<Vec<u8>> {
    let mut w = xmlwriter::XmlWriter::new(xmlwriter::Options::default());
    write_xml_node(&mut w, "root", value);
    Ok(w.end_document().into_bytes())
}

fn write_xml_node(w: &mut xmlwriter::XmlWriter, tag: &str, value: &Value) {
    match value {
        Value::Dict(d) => {
            w.start_element(tag);
            for (k, v) in d.borrow().iter() {
                write_xml_node(w, k, v);
            }
            w.end_element();
        }
        Value::List(l) => {
            w.start_element(tag);
            for item in l.borrow().iter() {
                write_xml_node(w, XML_LIST_ITEM_TAG, item);
            }
            w.end_element();
        }
        other => {
            w.start_element(tag);
            w.write_text(&other.to_string());
            w.end_element();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_a_nested_dict() {
        let mut inner = IndexMap::new();
        inner.insert("hp".to_owned(), Value::Int(10));
        let value = Value::dict(inner);
        let bytes = encode_value(&value, Path::new("save.json"), None).unwrap();
        let decoded = decode_bytes(&bytes, Path::new("save.json"), None).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn detect_format_prefers_explicit_hint_over_extension() {
        assert_eq!(detect_format(Some("application/yaml"), Path::new("data.json")), Format::Yaml);
        assert_eq!(detect_format(None, Path::new("data.toml")), Format::Toml);
    }
}
