//! Versioned record schemas and the migration engine.
//!
//! Every persisted record kind carries a `schema_version` tag and a
//! [`RecordSchema`] describing:
//!
//! - the latest version it is written at,
//! - an ordered table of upgrade steps keyed by the version they start from,
//! - the fields that must be present once a record is at the latest version,
//! - the fields with a documented default, which are left out of the stored
//!   form when they hold that default ("minified") and restored on read.
//!
//! Reads go through [`decode`], writes through [`encode`]. Nothing outside
//! this module looks at `schema_version`.
//!
//! ```text
//! stored doc ──▶ migrate (v → v+1 → … → latest) ──▶ reconstitute defaults
//!                                                   ──▶ check required ──▶ T
//! T ──▶ serialize ──▶ minify defaults ──▶ tag latest version ──▶ stored doc
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DataIntegrityError;

/// Key holding the version tag inside a stored document.
pub const VERSION_FIELD: &str = "schema_version";

/// A single upgrade from version `n` to `n + 1`.
///
/// Steps only add or reshape fields; they must not fail on well-formed
/// input at their source version.
pub type UpgradeStep = fn(&mut Map<String, Value>);

/// Documented default for an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    False,
    EmptyList,
}

impl FieldDefault {
    pub fn value(self) -> Value {
        match self {
            FieldDefault::False => Value::Bool(false),
            FieldDefault::EmptyList => Value::Array(Vec::new()),
        }
    }
}

/// Static description of one record kind's storage schema.
#[derive(Debug)]
pub struct RecordSchema {
    pub kind: &'static str,
    pub latest: u32,
    pub upgrades: &'static [(u32, UpgradeStep)],
    pub required: &'static [&'static str],
    pub defaults: &'static [(&'static str, FieldDefault)],
}

/// A record type persisted through the migration engine.
pub trait Versioned: Serialize + DeserializeOwned {
    fn schema() -> &'static RecordSchema;
}

/// Reads the version tag of a stored document.
///
/// Documents written before versioning existed carry no tag and are
/// treated as version 1.
pub fn stored_version(
    schema: &RecordSchema,
    doc: &Map<String, Value>,
) -> Result<u32, DataIntegrityError> {
    let raw = match doc.get(VERSION_FIELD) {
        None | Some(Value::Null) => return Ok(1),
        Some(v) => v,
    };

    let found = raw.as_i64().ok_or_else(|| DataIntegrityError::Malformed {
        kind: schema.kind,
        detail: format!("{} is not an integer: {}", VERSION_FIELD, raw),
    })?;

    if found < 1 || found > i64::from(schema.latest) {
        return Err(DataIntegrityError::UnknownVersion {
            kind: schema.kind,
            found,
            latest: schema.latest,
        });
    }

    Ok(found as u32)
}

/// Upgrades a stored document to `schema.latest`.
///
/// Applies exactly the steps between the stored version and the latest, in
/// increasing order. A document already at the latest version comes back
/// unchanged, so migrating twice equals migrating once.
pub fn migrate(schema: &RecordSchema, doc: Value) -> Result<Value, DataIntegrityError> {
    let mut map = into_object(schema, doc)?;
    let mut version = stored_version(schema, &map)?;

    while version < schema.latest {
        let step = schema
            .upgrades
            .iter()
            .find(|(from, _)| *from == version)
            .map(|(_, step)| *step)
            .ok_or(DataIntegrityError::MissingStep {
                kind: schema.kind,
                from: version,
            })?;
        step(&mut map);
        version += 1;
    }

    map.insert(VERSION_FIELD.to_string(), Value::from(schema.latest));
    Ok(Value::Object(map))
}

/// Restores defaulted fields that were omitted on write.
pub fn reconstitute(schema: &RecordSchema, doc: &mut Map<String, Value>) {
    for (field, default) in schema.defaults {
        match doc.get(*field) {
            None | Some(Value::Null) => {
                doc.insert((*field).to_string(), default.value());
            }
            Some(_) => {}
        }
    }
}

/// Drops defaulted fields whose value equals the default.
pub fn minify(schema: &RecordSchema, doc: &mut Map<String, Value>) {
    for (field, default) in schema.defaults {
        if doc.get(*field) == Some(&default.value()) {
            doc.remove(*field);
        }
    }
}

/// Serializes a record into its compact stored form at the latest version.
pub fn encode<T: Versioned>(record: &T) -> Result<Value, serde_json::Error> {
    let schema = T::schema();
    let mut map = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(serde::ser::Error::custom(format!(
                "{} did not serialize to an object: {}",
                schema.kind, other
            )))
        }
    };
    minify(schema, &mut map);
    map.insert(VERSION_FIELD.to_string(), Value::from(schema.latest));
    Ok(Value::Object(map))
}

/// Turns a stored document of any known version into a latest-schema record.
pub fn decode<T: Versioned>(doc: Value) -> Result<T, DataIntegrityError> {
    let schema = T::schema();
    let mut map = into_object(schema, migrate(schema, doc)?)?;
    reconstitute(schema, &mut map);

    for field in schema.required {
        match map.get(*field) {
            None | Some(Value::Null) => {
                return Err(DataIntegrityError::MissingField {
                    kind: schema.kind,
                    field: *field,
                })
            }
            Some(_) => {}
        }
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| DataIntegrityError::Malformed {
        kind: schema.kind,
        detail: e.to_string(),
    })
}

fn into_object(
    schema: &RecordSchema,
    doc: Value,
) -> Result<Map<String, Value>, DataIntegrityError> {
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(DataIntegrityError::Malformed {
            kind: schema.kind,
            detail: format!("expected a JSON object, got {}", json_type_name(&other)),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn add_color(doc: &mut Map<String, Value>) {
        doc.entry("color").or_insert(json!("red"));
    }

    fn rename_size(doc: &mut Map<String, Value>) {
        if let Some(size) = doc.remove("size") {
            doc.insert("length".to_string(), size);
        }
    }

    static WIDGET: RecordSchema = RecordSchema {
        kind: "Widget",
        latest: 3,
        // deliberately out of order: lookup is by source version
        upgrades: &[(2, rename_size), (1, add_color)],
        required: &["name", "color", "length"],
        defaults: &[("archived", FieldDefault::False), ("tags", FieldDefault::EmptyList)],
    };

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        color: String,
        length: u32,
        #[serde(default)]
        archived: bool,
        #[serde(default)]
        tags: Vec<String>,
    }

    impl Versioned for Widget {
        fn schema() -> &'static RecordSchema {
            &WIDGET
        }
    }

    #[test]
    fn test_untagged_document_is_version_one() {
        let doc = json!({"name": "w"});
        assert_eq!(stored_version(&WIDGET, doc.as_object().unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_migrate_applies_steps_in_order() {
        let migrated = migrate(&WIDGET, json!({"name": "w", "size": 4})).unwrap();
        assert_eq!(
            migrated,
            json!({"name": "w", "color": "red", "length": 4, "schema_version": 3})
        );
    }

    #[test]
    fn test_migrate_starts_at_stored_version() {
        // a v2 record already has its color; only the rename applies
        let migrated =
            migrate(&WIDGET, json!({"name": "w", "color": "blue", "size": 1, "schema_version": 2}))
                .unwrap();
        assert_eq!(migrated["color"], "blue");
        assert_eq!(migrated["length"], 1);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let once = migrate(&WIDGET, json!({"name": "w", "size": 2})).unwrap();
        let twice = migrate(&WIDGET, once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_future_version_rejected() {
        let err = migrate(&WIDGET, json!({"name": "w", "schema_version": 4})).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::UnknownVersion {
                kind: "Widget",
                found: 4,
                latest: 3
            }
        );
    }

    #[test]
    fn test_zero_and_non_integer_versions_rejected() {
        assert!(matches!(
            migrate(&WIDGET, json!({"schema_version": 0})),
            Err(DataIntegrityError::UnknownVersion { found: 0, .. })
        ));
        assert!(matches!(
            migrate(&WIDGET, json!({"schema_version": "two"})),
            Err(DataIntegrityError::Malformed { .. })
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            migrate(&WIDGET, json!([1, 2])),
            Err(DataIntegrityError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_step_reported() {
        static GAPPY: RecordSchema = RecordSchema {
            kind: "Gappy",
            latest: 2,
            upgrades: &[],
            required: &[],
            defaults: &[],
        };
        assert_eq!(
            migrate(&GAPPY, json!({})).unwrap_err(),
            DataIntegrityError::MissingStep {
                kind: "Gappy",
                from: 1
            }
        );
    }

    #[test]
    fn test_encode_omits_defaults() {
        let widget = Widget {
            name: "w".into(),
            color: "red".into(),
            length: 1,
            archived: false,
            tags: vec![],
        };
        let stored = encode(&widget).unwrap();
        let map = stored.as_object().unwrap();
        assert!(!map.contains_key("archived"));
        assert!(!map.contains_key("tags"));
        assert_eq!(map[VERSION_FIELD], 3);
    }

    #[test]
    fn test_encode_keeps_non_default_values() {
        let widget = Widget {
            name: "w".into(),
            color: "red".into(),
            length: 1,
            archived: true,
            tags: vec!["x".into()],
        };
        let stored = encode(&widget).unwrap();
        assert_eq!(stored["archived"], true);
        assert_eq!(stored["tags"], json!(["x"]));
    }

    #[test]
    fn test_decode_restores_defaults() {
        let widget: Widget = decode(json!({"name": "w", "size": 9})).unwrap();
        assert_eq!(widget.length, 9);
        assert!(!widget.archived);
        assert!(widget.tags.is_empty());
    }

    #[test]
    fn test_decode_missing_required_field() {
        let err = decode::<Widget>(json!({"size": 9})).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::MissingField {
                kind: "Widget",
                field: "name"
            }
        );
    }

    #[test]
    fn test_decode_wrong_field_type() {
        let err = decode::<Widget>(json!({"name": "w", "color": "red", "length": "long", "schema_version": 3}))
            .unwrap_err();
        assert!(matches!(err, DataIntegrityError::Malformed { .. }));
    }
}
