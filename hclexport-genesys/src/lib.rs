//! hclexport Genesys Cloud
//!
//! REST client and resource exporters for Genesys Cloud organizations.

pub mod client;
pub mod config;
pub mod exporters;
pub mod listing;

use std::sync::Arc;

use hclexport_core::emitter::RequiredProvider;
use hclexport_core::registry::ExporterRegistry;

pub use client::{ClientError, GenesysClient};
pub use config::ClientConfig;

use exporters::{division, group, queue, skill, skill_group, user, wrapupcode};

pub const PROVIDER_NAME: &str = "genesyscloud";
pub const PROVIDER_SOURCE: &str = "mypurecloud/genesyscloud";

/// Every resource type the registry can export, in registry order
pub const RESOURCE_TYPES: &[&str] = &[
    division::RESOURCE_TYPE,
    group::RESOURCE_TYPE,
    queue::RESOURCE_TYPE,
    skill::RESOURCE_TYPE,
    skill_group::RESOURCE_TYPE,
    wrapupcode::RESOURCE_TYPE,
    user::RESOURCE_TYPE,
];

/// Provider block for the generated `terraform` configuration
pub fn required_provider() -> RequiredProvider {
    RequiredProvider::new(PROVIDER_NAME, PROVIDER_SOURCE)
}

/// Registry of every supported resource type
pub fn registry(client: Arc<GenesysClient>) -> ExporterRegistry {
    ExporterRegistry::new()
        .with_exporter(division::RESOURCE_TYPE, division::exporter(client.clone()))
        .with_exporter(group::RESOURCE_TYPE, group::exporter(client.clone()))
        .with_exporter(queue::RESOURCE_TYPE, queue::exporter(client.clone()))
        .with_exporter(skill::RESOURCE_TYPE, skill::exporter(client.clone()))
        .with_exporter(skill_group::RESOURCE_TYPE, skill_group::exporter(client.clone()))
        .with_exporter(user::RESOURCE_TYPE, user::exporter(client.clone()))
        .with_exporter(wrapupcode::RESOURCE_TYPE, wrapupcode::exporter(client))
}
