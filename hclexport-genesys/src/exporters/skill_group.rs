//! genesyscloud_routing_skill_group
//!
//! Skill groups are listed with cursor pagination. Their skill conditions
//! are kept as JSON text and written with `jsonencode`.

use std::sync::Arc;

use hclexport_core::registry::{RefAttrSettings, ResourceExporter};
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener, Listing, division};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_routing_skill_group";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/routing/skillgroups",
        "/api/v2/routing/skillgroups/{id}",
        flatten,
    )
    .with_listing(Listing::Cursor);
    ResourceExporter::new(handler)
        .with_schema(
            ResourceSchema::new(RESOURCE_TYPE)
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
                .attribute(AttributeSchema::new("description", AttributeType::String))
                .attribute(AttributeSchema::new("division_id", AttributeType::String))
                .attribute(AttributeSchema::new("skill_conditions", AttributeType::String)),
        )
        .ref_attr("division_id", RefAttrSettings::to_type(division::RESOURCE_TYPE))
        .json_encode_attribute("skill_conditions")
}

fn flatten(group: &Json) -> Attributes {
    Flattener::new(group)
        .scalar("name", "name")
        .scalar("description", "description")
        .nested_id("division_id", "division")
        .json_string("skill_conditions", "skillConditions")
        .finish()
}
