use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type the model can be asked to answer with, under strict JSON-schema mode.
///
/// Strict mode only accepts closed objects whose properties are all listed as
/// required (optional fields become nullable) and a schema with no `$ref`s.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn strict_schema() -> Value {
        let generator = SchemaSettings::draft07()
            .with(|settings| {
                settings.inline_subschemas = true;
                settings.option_add_null_type = true;
            })
            .into_generator();
        let root = generator.into_root_schema_for::<Self>();
        let mut value = serde_json::to_value(root).unwrap_or_default();
        if let Value::Object(map) = &mut value {
            map.remove("$schema");
            map.remove("definitions");
        }
        close_objects(&mut value);
        value
    }

    fn output_name() -> String {
        let name: String = <Self as JsonSchema>::schema_name()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        if name.is_empty() {
            "structured_response".to_string()
        } else {
            name
        }
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let has_properties = matches!(map.get("properties"), Some(Value::Object(_)));
            if has_properties {
                let required: Vec<Value> = match map.get("properties") {
                    Some(Value::Object(props)) => {
                        props.keys().map(|k| Value::String(k.clone())).collect()
                    }
                    _ => Vec::new(),
                };
                map.insert("required".to_string(), Value::Array(required));
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            // Strict mode rejects `format` annotations on strings.
            if matches!(map.get("type"), Some(Value::String(_)) | Some(Value::Array(_))) {
                map.remove("format");
            }
            for (_, child) in map.iter_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                close_objects(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{CombinedSearchResponse, PlatformResult};

    fn find_hit_schema(schema: &Value) -> &Value {
        &schema["properties"]["hits"]["items"]
    }

    #[test]
    fn test_platform_result_schema_is_closed_and_inlined() {
        let schema = PlatformResult::strict_schema();
        let text = serde_json::to_string(&schema).unwrap();
        assert!(!text.contains("$ref"));
        assert!(schema.get("definitions").is_none());
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["additionalProperties"], Value::Bool(false));

        let hit = find_hit_schema(&schema);
        assert_eq!(hit["type"], "object");
        assert_eq!(hit["additionalProperties"], Value::Bool(false));
    }

    #[test]
    fn test_optional_hit_fields_are_required_but_nullable() {
        let schema = PlatformResult::strict_schema();
        let hit = find_hit_schema(&schema);
        let required: Vec<&str> = hit["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in ["title", "url", "rating", "price", "image_url"] {
            assert!(required.contains(&field), "{field} missing from required");
        }
        let price_types = hit["properties"]["price"]["type"].as_array().unwrap();
        assert!(price_types.contains(&Value::String("null".to_string())));
    }

    #[test]
    fn test_platform_is_a_plain_string_property() {
        let schema = PlatformResult::strict_schema();
        assert_eq!(schema["properties"]["platform"]["type"], "string");
    }

    #[test]
    fn test_combined_schema_nests_platform_blocks() {
        let schema = CombinedSearchResponse::strict_schema();
        let block = &schema["properties"]["platforms"]["items"];
        assert_eq!(block["type"], "object");
        assert_eq!(block["properties"]["hits"]["type"], "array");
    }

    #[test]
    fn test_output_name_is_api_safe() {
        assert_eq!(PlatformResult::output_name(), "PlatformResult");
    }
}
