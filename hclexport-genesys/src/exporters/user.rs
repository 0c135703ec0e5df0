//! genesyscloud_user
//!
//! Users are labelled by email. Routing skills and languages are read
//! through the `expand` parameter of the user endpoint.

use std::sync::Arc;

use hclexport_core::registry::{RefAttrSettings, ResourceExporter};
use hclexport_core::resource::Attributes;
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener, division, skill};
use crate::client::GenesysClient;

pub const RESOURCE_TYPE: &str = "genesyscloud_user";

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = ApiHandler::new(
        client,
        RESOURCE_TYPE,
        "/api/v2/users",
        "/api/v2/users/{id}",
        flatten,
    )
    .with_name_field("email")
    .with_read_query("expand", "skills,languages,locations");

    ResourceExporter::new(handler)
        .with_schema(schema())
        .ref_attr("division_id", RefAttrSettings::to_type(division::RESOURCE_TYPE))
        .ref_attr("manager", RefAttrSettings::to_type(RESOURCE_TYPE))
        .ref_attr(
            "routing_skills.skill_id",
            RefAttrSettings::to_type(skill::RESOURCE_TYPE).remove_outer_item(),
        )
        // Languages are not exported
        .ref_attr("routing_languages.language_id", RefAttrSettings::undefined())
        .remove_if_missing("", ["manager"])
        .allow_zero_value("routing_skills.proficiency")
        .allow_zero_value("routing_languages.proficiency")
}

fn schema() -> ResourceSchema {
    let proficiency = || AttributeSchema::new("proficiency", AttributeType::Float);
    ResourceSchema::new(RESOURCE_TYPE)
        .attribute(AttributeSchema::new("email", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "state",
            AttributeType::Enum(vec!["active".to_string(), "inactive".to_string()]),
        ))
        .attribute(AttributeSchema::new("department", AttributeType::String))
        .attribute(AttributeSchema::new("title", AttributeType::String))
        .attribute(AttributeSchema::new("division_id", AttributeType::String))
        .attribute(AttributeSchema::new("manager", AttributeType::String))
        .attribute(AttributeSchema::new(
            "routing_skills",
            types::blocks(vec![
                AttributeSchema::new("skill_id", AttributeType::String).required(),
                proficiency(),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "routing_languages",
            types::blocks(vec![
                AttributeSchema::new("language_id", AttributeType::String).required(),
                proficiency(),
            ]),
        ))
}

fn flatten(user: &Json) -> Attributes {
    Flattener::new(user)
        .scalar("email", "email")
        .scalar("name", "name")
        .scalar("state", "state")
        .scalar("department", "department")
        .scalar("title", "title")
        .nested_id("division_id", "division")
        .nested_id("manager", "manager")
        .blocks("routing_skills", "skills", |s| {
            Flattener::new(s)
                .scalar("skill_id", "id")
                .scalar("proficiency", "proficiency")
                .finish()
        })
        .blocks("routing_languages", "languages", |l| {
            Flattener::new(l)
                .scalar("language_id", "id")
                .scalar("proficiency", "proficiency")
                .finish()
        })
        .finish()
}
