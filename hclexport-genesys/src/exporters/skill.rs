//! genesyscloud_routing_skill

use std::sync::Arc;

use hclexport_core::registry::ResourceExporter;
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_routing_skill";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/routing/skills",
        "/api/v2/routing/skills/{id}",
        flatten,
    );
    ResourceExporter::new(handler).with_schema(
        ResourceSchema::new(RESOURCE_TYPE)
            .attribute(AttributeSchema::new("name", AttributeType::String).required()),
    )
}

fn flatten(skill: &Json) -> Attributes {
    Flattener::new(skill).scalar("name", "name").finish()
}

#[cfg(test)]
mod tests {
    use hclexport_core::resource::Value;
    use serde_json::json;

    use super::*;

    #[test]
    fn flatten_keeps_name_only() {
        let attrs = flatten(&json!({"id": "s1", "name": "Spanish", "state": "active"}));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["name"], Value::from("Spanish"));
    }
}
