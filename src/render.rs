//! JSON rendering of stored documents.
//!
//! ObjectIds become hex strings, dates become RFC 3339 strings and binary
//! payloads become base64, so API clients never see extended JSON wrappers.

use crate::error::ApiError;
use crate::store::StoreError;
use base64::Engine;
use bson::{Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::Binary(binary) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(binary.bytes))
        }
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Double(n) => Value::from(n),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_json(doc: Document) -> Value {
    let mut out = Map::new();
    for (key, value) in doc {
        out.insert(key, bson_to_json(value));
    }
    Value::Object(out)
}

pub fn documents_to_json(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(document_to_json).collect())
}

/// Render a model, dropping `hidden` fields.
pub fn model<T: Serialize>(model: &T, hidden: &[&str]) -> Result<Value, ApiError> {
    let mut doc = bson::to_document(model).map_err(StoreError::from)?;
    for field in hidden {
        doc.remove(*field);
    }
    Ok(document_to_json(doc))
}

pub fn models<T: Serialize>(models: &[T], hidden: &[&str]) -> Result<Value, ApiError> {
    models
        .iter()
        .map(|m| model(m, hidden))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    #[test]
    fn test_ids_and_dates_are_plain_strings() {
        let id = ObjectId::new();
        let rendered = document_to_json(doc! {
            "_id": id,
            "createdAt": bson::DateTime::from_millis(0),
            "tags": [id],
        });
        assert_eq!(rendered["_id"], id.to_hex());
        assert!(rendered["createdAt"]
            .as_str()
            .unwrap()
            .starts_with("1970-01-01T00:00:00"));
        assert_eq!(rendered["tags"][0], id.to_hex());
    }

    #[test]
    fn test_hidden_fields_removed() {
        #[derive(Serialize)]
        struct Secretive {
            name: String,
            password: String,
        }
        let rendered = model(
            &Secretive {
                name: "a".into(),
                password: "b".into(),
            },
            &["password"],
        )
        .unwrap();
        assert_eq!(rendered["name"], "a");
        assert!(rendered.get("password").is_none());
    }
}
