//! genesyscloud_auth_division

use std::sync::Arc;

use hclexport_core::registry::ResourceExporter;
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_auth_division";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/authorization/divisions",
        "/api/v2/authorization/divisions/{id}",
        flatten,
    );
    ResourceExporter::new(handler).with_schema(schema())
}

fn schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
}

fn flatten(division: &Json) -> Attributes {
    Flattener::new(division)
        .scalar("name", "name")
        .scalar("description", "description")
        .finish()
}
