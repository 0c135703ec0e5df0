//! Terraform JSON writer

use serde_json::{Map, Value as Json, json};

use super::config::RequiredProvider;
use super::escape_template;
use crate::resource::{ExportedResource, Value};

pub(super) fn to_document(
    resources: &[&ExportedResource],
    providers: &[RequiredProvider],
    depends_on: bool,
) -> Json {
    let mut by_type: Map<String, Json> = Map::new();
    for resource in resources {
        let mut body = match to_json(&Value::Map(resource.attributes.clone())) {
            Json::Object(body) => body,
            _ => Map::new(),
        };
        let dependencies: Vec<Json> = resource
            .depends_on
            .iter()
            .filter(|dep| **dep != resource.address)
            .map(|dep| Json::String(dep.to_string()))
            .collect();
        if depends_on && !dependencies.is_empty() {
            body.insert("depends_on".to_string(), Json::Array(dependencies));
        }

        let labels = by_type
            .entry(resource.address.resource_type.clone())
            .or_insert_with(|| Json::Object(Map::new()));
        if let Json::Object(labels) = labels {
            labels.insert(resource.address.label.clone(), Json::Object(body));
        }
    }

    let mut document = Map::new();
    if !by_type.is_empty() {
        document.insert("resource".to_string(), Json::Object(by_type));
    }
    if !providers.is_empty() {
        let required: Map<String, Json> = providers
            .iter()
            .map(|p| {
                let mut settings = json!({ "source": p.source });
                if let (Some(version), Json::Object(settings)) = (&p.version, &mut settings) {
                    settings.insert("version".to_string(), Json::String(version.clone()));
                }
                (p.name.clone(), settings)
            })
            .collect();
        document.insert(
            "terraform".to_string(),
            json!({ "required_providers": required }),
        );
    }
    Json::Object(document)
}

/// Like `Value::to_json`, with template sequences in literals escaped
fn to_json(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::String(escape_template(s)),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => Json::Object(map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect()),
        other => other.to_json(),
    }
}
