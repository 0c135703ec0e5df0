//! genesyscloud_routing_wrapupcode

use std::sync::Arc;

use hclexport_core::registry::{RefAttrSettings, ResourceExporter};
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener, division};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_routing_wrapupcode";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/routing/wrapupcodes",
        "/api/v2/routing/wrapupcodes/{id}",
        flatten,
    );
    ResourceExporter::new(handler)
        .with_schema(
            ResourceSchema::new(RESOURCE_TYPE)
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
                .attribute(AttributeSchema::new("division_id", AttributeType::String)),
        )
        .ref_attr("division_id", RefAttrSettings::to_type(division::RESOURCE_TYPE))
}

fn flatten(code: &Json) -> Attributes {
    Flattener::new(code)
        .scalar("name", "name")
        .nested_id("division_id", "division")
        .finish()
}
