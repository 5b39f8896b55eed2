use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::Result;

/// A record viewed through the filter's attribute schema.
///
/// Serializing the view walks the schema in declared order and emits each
/// attribute's value from the record, substituting JSON `null` for
/// attributes the record does not carry. An attribute stored explicitly as
/// `null` is therefore indistinguishable from an absent one; both forms map
/// to the same filter positions.
struct SchemaView<'a> {
    record: &'a Value,
    attributes: &'a [String],
}

impl Serialize for SchemaView<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for attribute in self.attributes {
            let value = self.record.get(attribute.as_str()).unwrap_or(&Value::Null);
            map.serialize_entry(attribute, value)?;
        }
        map.end()
    }
}

/// Canonical byte form of a record under an attribute schema.
///
/// Key order is fixed by the schema, never by the record's own key order,
/// so two records that agree on every schema attribute produce identical
/// bytes, whatever extra fields they carry. A non-object record matches no
/// attribute and serializes as an all-null map.
pub fn serialize_record(record: &Value, attributes: &[String]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SchemaView { record, attributes })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_attribute_order_follows_schema() {
        let attributes = schema(&["email", "password"]);
        let record = json!({"password": "hunter2", "email": "a@b.com"});

        let bytes = serialize_record(&record, &attributes).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"email":"a@b.com","password":"hunter2"}"#,
            "Schema order must win over record key order"
        );
    }

    #[test]
    fn test_absent_equals_explicit_null() {
        let attributes = schema(&["email", "password"]);
        let absent = json!({"email": "a@b.com"});
        let explicit = json!({"email": "a@b.com", "password": null});

        assert_eq!(
            serialize_record(&absent, &attributes).unwrap(),
            serialize_record(&explicit, &attributes).unwrap(),
            "Missing attribute and explicit null must serialize identically"
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let attributes = schema(&["email"]);
        let plain = json!({"email": "a@b.com"});
        let noisy = json!({"email": "a@b.com", "role": "admin", "id": 7});

        assert_eq!(
            serialize_record(&plain, &attributes).unwrap(),
            serialize_record(&noisy, &attributes).unwrap(),
            "Fields outside the schema must not affect the payload"
        );
    }

    #[test]
    fn test_schema_order_changes_payload() {
        let record = json!({"email": "a@b.com", "password": "hunter2"});
        let forward = serialize_record(&record, &schema(&["email", "password"]));
        let reversed = serialize_record(&record, &schema(&["password", "email"]));
        assert_ne!(forward.unwrap(), reversed.unwrap());
    }

    #[test]
    fn test_non_object_record_is_all_null() {
        let attributes = schema(&["email", "password"]);
        let scalar = serialize_record(&json!("just a string"), &attributes);
        let empty = serialize_record(&json!({}), &attributes);
        assert_eq!(
            scalar.unwrap(),
            empty.unwrap(),
            "A non-object record carries no attributes"
        );
    }

    #[test]
    fn test_nested_values_pass_through() {
        let attributes = schema(&["tags"]);
        let record = json!({"tags": ["a", {"k": 1}]});
        let bytes = serialize_record(&record, &attributes).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"tags":["a",{"k":1}]}"#
        );
    }
}
