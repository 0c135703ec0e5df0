//! genesyscloud_group

use std::sync::Arc;

use hclexport_core::registry::{RefAttrSettings, ResourceExporter};
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener, user};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_group";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/groups",
        "/api/v2/groups/{id}",
        flatten,
    );
    ResourceExporter::new(handler)
        .with_schema(schema())
        .ref_attr("owner_ids", RefAttrSettings::to_type(user::RESOURCE_TYPE))
}

fn schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new(
            "type",
            AttributeType::Enum(vec!["official".to_string(), "social".to_string()]),
        ))
        .attribute(AttributeSchema::new(
            "visibility",
            AttributeType::Enum(vec!["public".to_string(), "members".to_string()]),
        ))
        .attribute(AttributeSchema::new("rules_visible", AttributeType::Bool))
        .attribute(AttributeSchema::new("owner_ids", types::id_list()))
}

fn flatten(group: &Json) -> Attributes {
    Flattener::new(group)
        .scalar("name", "name")
        .scalar("description", "description")
        .scalar("type", "type")
        .scalar("visibility", "visibility")
        .scalar("rules_visible", "rulesVisible")
        .id_list("owner_ids", "owners")
        .finish()
}
