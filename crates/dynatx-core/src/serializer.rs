//! Conversion between model values and tagged DynamoDB attribute values.
//!
//! Model values arrive as `serde_json::Value` (the model's serde form) and are
//! coerced to the declared [`AttributeType`]. Numbers keep their exact decimal
//! text; binary values travel as base64 strings or byte arrays. Values below a
//! list or map attribute have no declared type and are converted dynamically.

use std::collections::HashSet;
use std::hash::Hash;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use dynatx_model::{AttributeValue, Item, Key};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::schema::{AttributeSchema, AttributeType, TableSchema};

/// Errors produced while converting values to or from the wire format.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The value cannot be coerced to the declared type.
    #[error("attribute {attribute}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The attribute name.
        attribute: String,
        /// The expected kind of value.
        expected: &'static str,
        /// The kind of value found.
        found: &'static str,
    },
    /// A string does not hold a valid DynamoDB number.
    #[error("attribute {attribute}: {value:?} is not a valid number")]
    InvalidNumber {
        /// The attribute name.
        attribute: String,
        /// The offending text.
        value: String,
    },
    /// A binary value is neither valid base64 nor a byte array.
    #[error("attribute {attribute}: invalid binary value: {message}")]
    InvalidBinary {
        /// The attribute name.
        attribute: String,
        /// Explanation.
        message: String,
    },
    /// A required attribute has no value.
    #[error("attribute {attribute} cannot be null")]
    NullAttribute {
        /// The attribute name.
        attribute: String,
    },
    /// A key attribute has no value.
    #[error("missing required key attribute: {attribute}")]
    MissingKeyAttribute {
        /// The attribute name.
        attribute: String,
    },
    /// A range key was given for a table that has none.
    #[error("table {table} has no range key")]
    UnexpectedRangeKey {
        /// The table name.
        table: String,
    },
    /// The model's serde form is not a JSON object.
    #[error("model must serialize to an object, found {found}")]
    NotAnObject {
        /// The kind of value found.
        found: &'static str,
    },
    /// The model could not be converted to or from its serde form.
    #[error("model conversion failed: {0}")]
    Model(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Single values
// ---------------------------------------------------------------------------

/// Serialize `raw` as a value of `attribute`.
///
/// `null` is accepted only for nullable attributes and becomes `NULL`.
pub fn serialize(attribute: &AttributeSchema, raw: &Value) -> Result<AttributeValue, SerializeError> {
    if raw.is_null() {
        return if attribute.nullable {
            Ok(AttributeValue::Null(true))
        } else {
            Err(SerializeError::NullAttribute {
                attribute: attribute.name.clone(),
            })
        };
    }
    serialize_as(&attribute.name, attribute.attr_type, raw)
}

/// Serialize `raw` as `attr_type`, reporting errors against `name`.
pub fn serialize_as(
    name: &str,
    attr_type: AttributeType,
    raw: &Value,
) -> Result<AttributeValue, SerializeError> {
    match attr_type {
        AttributeType::String => raw
            .as_str()
            .map(|s| AttributeValue::S(s.to_owned()))
            .ok_or_else(|| mismatch(name, "string", raw)),
        AttributeType::Number => number_text(name, raw).map(AttributeValue::N),
        AttributeType::Binary => binary(name, raw).map(AttributeValue::B),
        AttributeType::Boolean => raw
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| mismatch(name, "bool", raw)),
        AttributeType::StringSet => {
            let members = set_members(name, raw)?
                .iter()
                .map(|m| {
                    m.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| mismatch(name, "string", m))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::Ss(dedup(members)))
        }
        AttributeType::NumberSet => {
            let members = set_members(name, raw)?
                .iter()
                .map(|m| number_text(name, m))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::Ns(dedup(members)))
        }
        AttributeType::BinarySet => {
            let members = set_members(name, raw)?
                .iter()
                .map(|m| binary(name, m))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::Bs(dedup(members)))
        }
        AttributeType::List => raw
            .as_array()
            .map(|items| AttributeValue::L(items.iter().map(serialize_dynamic).collect()))
            .ok_or_else(|| mismatch(name, "array", raw)),
        AttributeType::Map => raw
            .as_object()
            .map(|obj| {
                AttributeValue::M(
                    obj.iter()
                        .map(|(k, v)| (k.clone(), serialize_dynamic(v)))
                        .collect(),
                )
            })
            .ok_or_else(|| mismatch(name, "object", raw)),
    }
}

/// Serialize an untyped value by its JSON shape.
#[must_use]
pub fn serialize_dynamic(raw: &Value) -> AttributeValue {
    match raw {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(serialize_dynamic).collect()),
        Value::Object(obj) => AttributeValue::M(
            obj.iter()
                .map(|(k, v)| (k.clone(), serialize_dynamic(v)))
                .collect(),
        ),
    }
}

/// Decode `value` as a value of `attribute`. Inverse of [`serialize`].
pub fn deserialize(attribute: &AttributeSchema, value: &AttributeValue) -> Result<Value, SerializeError> {
    if let AttributeValue::Null(_) = value {
        return if attribute.nullable {
            Ok(Value::Null)
        } else {
            Err(SerializeError::NullAttribute {
                attribute: attribute.name.clone(),
            })
        };
    }
    let name = attribute.name.as_str();
    match (attribute.attr_type, value) {
        (AttributeType::String, AttributeValue::S(s)) => Ok(Value::String(s.clone())),
        (AttributeType::Number, AttributeValue::N(n)) => parse_number(name, n),
        (AttributeType::Binary, AttributeValue::B(b)) => Ok(Value::String(STANDARD.encode(b))),
        (AttributeType::Boolean, AttributeValue::Bool(b)) => Ok(Value::Bool(*b)),
        (AttributeType::StringSet, AttributeValue::Ss(members)) => Ok(Value::Array(
            members.iter().cloned().map(Value::String).collect(),
        )),
        (AttributeType::NumberSet, AttributeValue::Ns(members)) => members
            .iter()
            .map(|n| parse_number(name, n))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (AttributeType::BinarySet, AttributeValue::Bs(members)) => Ok(Value::Array(
            members
                .iter()
                .map(|b| Value::String(STANDARD.encode(b)))
                .collect(),
        )),
        (AttributeType::List, AttributeValue::L(_)) | (AttributeType::Map, AttributeValue::M(_)) => {
            deserialize_dynamic(name, value)
        }
        (expected, other) => Err(SerializeError::TypeMismatch {
            attribute: name.to_owned(),
            expected: expected.type_descriptor(),
            found: other.type_descriptor(),
        }),
    }
}

/// Decode an untyped value. Binary values become base64 strings.
pub fn deserialize_dynamic(name: &str, value: &AttributeValue) -> Result<Value, SerializeError> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(name, n)?,
        AttributeValue::B(b) => Value::String(STANDARD.encode(b)),
        AttributeValue::Ss(members) => Value::Array(members.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(members) => Value::Array(
            members
                .iter()
                .map(|n| parse_number(name, n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Bs(members) => Value::Array(
            members
                .iter()
                .map(|b| Value::String(STANDARD.encode(b)))
                .collect(),
        ),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(|v| deserialize_dynamic(name, v))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), deserialize_dynamic(name, v)?)))
                .collect::<Result<Map<_, _>, SerializeError>>()?,
        ),
    })
}

// ---------------------------------------------------------------------------
// Items and keys
// ---------------------------------------------------------------------------

/// Convert a model into its serde form.
pub fn to_raw<M: Serialize>(model: &M) -> Result<Value, SerializeError> {
    serde_json::to_value(model).map_err(SerializeError::Model)
}

/// Serialize every declared attribute of `raw` into an item.
///
/// Null attributes and empty sets are omitted; they are errors for key and
/// non-nullable attributes. Fields not declared in the schema are ignored.
pub fn serialize_item(schema: &TableSchema, raw: &Value) -> Result<Item, SerializeError> {
    let object = as_object(raw)?;
    let mut item = Item::new();
    for attr in schema.attributes() {
        let value = object.get(&attr.name).unwrap_or(&Value::Null);
        if is_absent(attr, value) {
            if attr.is_key() {
                return Err(SerializeError::MissingKeyAttribute {
                    attribute: attr.name.clone(),
                });
            }
            if !attr.nullable {
                return Err(SerializeError::NullAttribute {
                    attribute: attr.name.clone(),
                });
            }
            continue;
        }
        item.insert(attr.name.clone(), serialize_as(&attr.name, attr.attr_type, value)?);
    }
    Ok(item)
}

/// Serialize a primary key from raw hash and range values.
pub fn serialize_key(
    schema: &TableSchema,
    hash_key: &Value,
    range_key: Option<&Value>,
) -> Result<Key, SerializeError> {
    let mut key = Key::new();
    let hash_attr = schema.hash_key();
    key.insert(hash_attr.name.clone(), serialize_key_part(hash_attr, hash_key)?);

    let range_key = range_key.filter(|v| !v.is_null());
    match (schema.range_key(), range_key) {
        (Some(attr), Some(value)) => {
            key.insert(attr.name.clone(), serialize_key_part(attr, value)?);
        }
        (Some(attr), None) => {
            return Err(SerializeError::MissingKeyAttribute {
                attribute: attr.name.clone(),
            });
        }
        (None, Some(_)) => {
            return Err(SerializeError::UnexpectedRangeKey {
                table: schema.table_name().to_owned(),
            });
        }
        (None, None) => {}
    }
    Ok(key)
}

/// Extract and serialize the primary key of a model's serde form.
pub fn model_key(schema: &TableSchema, raw: &Value) -> Result<Key, SerializeError> {
    let object = as_object(raw)?;
    let hash = object.get(&schema.hash_key().name).unwrap_or(&Value::Null);
    let range = schema
        .range_key()
        .map(|attr| object.get(&attr.name).unwrap_or(&Value::Null));
    serialize_key(schema, hash, range)
}

/// Decode the declared attributes of `item` into a serde object.
///
/// Undeclared attributes are dropped; absent attributes stay absent.
pub fn deserialize_item(schema: &TableSchema, item: &Item) -> Result<Value, SerializeError> {
    let mut object = Map::new();
    for attr in schema.attributes() {
        if let Some(value) = item.get(&attr.name) {
            object.insert(attr.name.clone(), deserialize(attr, value)?);
        }
    }
    Ok(Value::Object(object))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn serialize_key_part(attr: &AttributeSchema, raw: &Value) -> Result<AttributeValue, SerializeError> {
    if raw.is_null() {
        return Err(SerializeError::MissingKeyAttribute {
            attribute: attr.name.clone(),
        });
    }
    serialize_as(&attr.name, attr.attr_type, raw)
}

fn is_absent(attr: &AttributeSchema, value: &Value) -> bool {
    value.is_null() || (attr.attr_type.is_set() && value.as_array().is_some_and(Vec::is_empty))
}

fn as_object(raw: &Value) -> Result<&Map<String, Value>, SerializeError> {
    raw.as_object().ok_or(SerializeError::NotAnObject {
        found: json_kind(raw),
    })
}

fn set_members<'a>(name: &str, raw: &'a Value) -> Result<&'a [Value], SerializeError> {
    raw.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| mismatch(name, "array", raw))
}

fn number_text(name: &str, raw: &Value) -> Result<String, SerializeError> {
    match raw {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if number_from_text(s).is_some() => Ok(s.clone()),
        Value::String(s) => Err(SerializeError::InvalidNumber {
            attribute: name.to_owned(),
            value: s.clone(),
        }),
        other => Err(mismatch(name, "number", other)),
    }
}

fn parse_number(name: &str, text: &str) -> Result<Value, SerializeError> {
    number_from_text(text)
        .map(Value::Number)
        .ok_or_else(|| SerializeError::InvalidNumber {
            attribute: name.to_owned(),
            value: text.to_owned(),
        })
}

/// Numeric text in JSON number grammar, without surrounding whitespace.
/// Serializing and deserializing both go through here.
fn number_from_text(text: &str) -> Option<Number> {
    if text.trim() != text {
        return None;
    }
    serde_json::from_str::<Number>(text).ok()
}

fn binary(name: &str, raw: &Value) -> Result<Bytes, SerializeError> {
    match raw {
        Value::String(encoded) => STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|e| SerializeError::InvalidBinary {
                attribute: name.to_owned(),
                message: e.to_string(),
            }),
        Value::Array(items) => items
            .iter()
            .map(|b| {
                b.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| SerializeError::InvalidBinary {
                        attribute: name.to_owned(),
                        message: format!("{b} is not a byte"),
                    })
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Bytes::from),
        other => Err(mismatch(name, "base64 string or byte array", other)),
    }
}

fn dedup<T: Eq + Hash + Clone>(members: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(members.len());
    members.into_iter().filter(|m| seen.insert(m.clone())).collect()
}

fn mismatch(name: &str, expected: &'static str, found: &Value) -> SerializeError {
    SerializeError::TypeMismatch {
        attribute: name.to_owned(),
        expected,
        found: json_kind(found),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attr(name: &str, attr_type: AttributeType) -> AttributeSchema {
        AttributeSchema {
            name: name.to_owned(),
            attr_type,
            nullable: true,
            key_type: None,
        }
    }

    fn raw(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    fn schema() -> TableSchema {
        TableSchema::builder("mock")
            .hash_key("mock_hash", AttributeType::Number)
            .range_key("mock_range", AttributeType::Number)
            .nullable("mock_toot", AttributeType::String)
            .nullable("tags", AttributeType::StringSet)
            .attribute("active", AttributeType::Boolean)
            .version("mock_version")
            .build()
            .unwrap()
    }

    #[test]
    fn test_should_roundtrip_every_type_tag() {
        let cases = [
            (AttributeType::String, raw(r#""hello""#), "S"),
            (AttributeType::Number, raw("12.50"), "N"),
            (AttributeType::Binary, raw(r#""aGVsbG8=""#), "B"),
            (AttributeType::Boolean, raw("true"), "BOOL"),
            (AttributeType::StringSet, raw(r#"["a","b"]"#), "SS"),
            (AttributeType::NumberSet, raw("[1, 2.5]"), "NS"),
            (AttributeType::BinarySet, raw(r#"["AQI=","AwQ="]"#), "BS"),
            (AttributeType::List, raw(r#"[1, "x", null, [true]]"#), "L"),
            (AttributeType::Map, raw(r#"{"a": {"b": 1}, "c": "d"}"#), "M"),
            (AttributeType::String, Value::Null, "NULL"),
        ];
        for (attr_type, value, tag) in cases {
            let attribute = attr("a", attr_type);
            let encoded = serialize(&attribute, &value).unwrap();
            assert_eq!(encoded.type_descriptor(), tag);
            let decoded = deserialize(&attribute, &encoded).unwrap();
            assert_eq!(decoded, value, "round trip of {tag}");
        }
    }

    #[test]
    fn test_should_preserve_exact_number_text() {
        let attribute = attr("n", AttributeType::Number);
        let big = raw("3.14159265358979323846264338327950288");
        assert_eq!(
            serialize(&attribute, &big).unwrap(),
            AttributeValue::N("3.14159265358979323846264338327950288".to_owned())
        );
        assert_eq!(
            serialize(&attribute, &json!("0.1")).unwrap(),
            AttributeValue::N("0.1".to_owned())
        );
        assert_eq!(
            serialize(&attribute, &json!(1)).unwrap(),
            AttributeValue::N("1".to_owned())
        );
    }

    #[test]
    fn test_should_reject_invalid_number_text() {
        let attribute = attr("n", AttributeType::Number);
        for bad in ["", "abc", "1.2.3", " 1", "1e", "NaN", "-"] {
            let err = serialize(&attribute, &json!(bad)).unwrap_err();
            assert!(matches!(err, SerializeError::InvalidNumber { .. }), "{bad:?}");
        }
        assert!(number_from_text("-1.5E+10").is_some());
    }

    #[test]
    fn test_should_accept_only_numbers_that_decode_again() {
        let attribute = attr("n", AttributeType::Number);
        for bad in [".5", "5.", "+1", "007"] {
            let err = serialize(&attribute, &json!(bad)).unwrap_err();
            assert!(matches!(err, SerializeError::InvalidNumber { .. }), "{bad:?}");
        }
        for good in ["-0.5", "5", "1e-3", "-1.5E+10", "100"] {
            let encoded = serialize(&attribute, &json!(good)).unwrap();
            assert_eq!(encoded, AttributeValue::N(good.to_owned()));
            let decoded = deserialize(&attribute, &encoded).unwrap();
            assert_eq!(decoded.to_string(), good, "{good:?}");
        }
    }

    #[test]
    fn test_should_reject_type_mismatch() {
        let attribute = attr("flag", AttributeType::Boolean);
        let err = serialize(&attribute, &json!("yes")).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::TypeMismatch {
                expected: "bool",
                found: "string",
                ..
            }
        ));
    }

    #[test]
    fn test_should_reject_null_for_required_attribute() {
        let mut attribute = attr("a", AttributeType::String);
        attribute.nullable = false;
        let err = serialize(&attribute, &Value::Null).unwrap_err();
        assert!(matches!(err, SerializeError::NullAttribute { .. }));
    }

    #[test]
    fn test_should_accept_byte_arrays_for_binary() {
        let attribute = attr("b", AttributeType::Binary);
        assert_eq!(
            serialize(&attribute, &json!([104, 105])).unwrap(),
            AttributeValue::B(Bytes::from_static(b"hi"))
        );
        let err = serialize(&attribute, &json!([256])).unwrap_err();
        assert!(matches!(err, SerializeError::InvalidBinary { .. }));
    }

    #[test]
    fn test_should_dedup_set_members_keeping_first_occurrence() {
        let attribute = attr("s", AttributeType::StringSet);
        assert_eq!(
            serialize(&attribute, &json!(["b", "a", "b"])).unwrap(),
            AttributeValue::Ss(vec!["b".to_owned(), "a".to_owned()])
        );
    }

    #[test]
    fn test_should_reject_mismatched_tag_on_deserialize() {
        let attribute = attr("a", AttributeType::Number);
        let err = deserialize(&attribute, &AttributeValue::S("1".to_owned())).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::TypeMismatch {
                expected: "N",
                found: "S",
                ..
            }
        ));
        let list = attr("l", AttributeType::List);
        assert!(deserialize(&list, &AttributeValue::M(Default::default())).is_err());
    }

    #[test]
    fn test_should_serialize_item_skipping_absent_nullable_attributes() {
        let item = serialize_item(
            &schema(),
            &json!({"mock_hash": 3, "mock_range": 5, "mock_toot": null, "tags": [], "active": true, "extra": 1}),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "active": {"BOOL": true},
                "mock_hash": {"N": "3"},
                "mock_range": {"N": "5"},
            })
        );
    }

    #[test]
    fn test_should_reject_item_without_key_or_required_attribute() {
        let err = serialize_item(&schema(), &json!({"mock_hash": 1, "active": true})).unwrap_err();
        assert!(matches!(err, SerializeError::MissingKeyAttribute { attribute } if attribute == "mock_range"));

        let err = serialize_item(&schema(), &json!({"mock_hash": 1, "mock_range": 2})).unwrap_err();
        assert!(matches!(err, SerializeError::NullAttribute { attribute } if attribute == "active"));

        let err = serialize_item(&schema(), &json!([1, 2])).unwrap_err();
        assert!(matches!(err, SerializeError::NotAnObject { found: "array" }));
    }

    #[test]
    fn test_should_serialize_key_with_hash_and_range() {
        let key = serialize_key(&schema(), &json!(1), Some(&json!(2))).unwrap();
        assert_eq!(
            serde_json::to_value(&key).unwrap(),
            json!({"mock_hash": {"N": "1"}, "mock_range": {"N": "2"}})
        );
        let err = serialize_key(&schema(), &json!(1), None).unwrap_err();
        assert!(matches!(err, SerializeError::MissingKeyAttribute { .. }));
    }

    #[test]
    fn test_should_reject_range_key_for_hash_only_table() {
        let schema = TableSchema::builder("users")
            .hash_key("id", AttributeType::String)
            .build()
            .unwrap();
        let err = serialize_key(&schema, &json!("u1"), Some(&json!("x"))).unwrap_err();
        assert!(matches!(err, SerializeError::UnexpectedRangeKey { .. }));
        assert_eq!(serialize_key(&schema, &json!("u1"), None).unwrap().len(), 1);
    }

    #[test]
    fn test_should_extract_model_key_ignoring_other_fields() {
        let key = model_key(&schema(), &json!({"mock_hash": 2, "mock_range": 4, "active": "not checked"}))
            .unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key.get("mock_range"), Some(&AttributeValue::N("4".to_owned())));
    }

    #[test]
    fn test_should_deserialize_item_dropping_undeclared_attributes() {
        let item = Item::from([
            ("mock_hash".to_owned(), AttributeValue::N("1".to_owned())),
            ("mock_range".to_owned(), AttributeValue::N("2".to_owned())),
            ("mock_version".to_owned(), AttributeValue::N("7".to_owned())),
            ("legacy".to_owned(), AttributeValue::S("x".to_owned())),
        ]);
        let value = deserialize_item(&schema(), &item).unwrap();
        assert_eq!(value, json!({"mock_hash": 1, "mock_range": 2, "mock_version": 7}));
    }
}
