//! Terraform state file structures (format version 4)

use hclexport_core::resource::ExportedResource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Top-level state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub terraform_version: String,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage
    pub lineage: String,
    #[serde(default)]
    pub outputs: Map<String, Json>,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 4;
    /// Oldest Terraform release that reads this format
    pub const TERRAFORM_VERSION: &'static str = "1.0.0";

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            terraform_version: Self::TERRAFORM_VERSION.to_string(),
            serial: 1,
            lineage,
            outputs: Map::new(),
            resources: Vec::new(),
        }
    }

    /// State for a set of exported resources, all managed by `provider_source`
    pub fn from_exported(resources: &[ExportedResource], provider_source: &str) -> Self {
        let mut state = Self::new();
        let provider = provider_address(provider_source);
        for resource in resources {
            state.upsert_resource(ResourceState::from_exported(resource, &provider));
        }
        state
    }

    /// Take over the lineage of a previous state and supersede its serial
    pub fn continue_lineage(&mut self, previous: &StateFile) {
        self.lineage = previous.lineage.clone();
        self.serial = previous.serial + 1;
    }

    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or replace a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Fully qualified provider address as written in state
pub fn provider_address(source: &str) -> String {
    format!("provider[\"registry.terraform.io/{}\"]", source)
}

/// One resource block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub mode: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub provider: String,
    pub instances: Vec<InstanceState>,
}

impl ResourceState {
    pub fn from_exported(resource: &ExportedResource, provider: &str) -> Self {
        let mut attributes: Map<String, Json> = resource
            .raw
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        attributes.insert("id".to_string(), Json::String(resource.id.clone()));

        let dependencies = resource
            .depends_on
            .iter()
            .filter(|dep| **dep != resource.address)
            .map(ToString::to_string)
            .collect();

        Self {
            mode: "managed".to_string(),
            resource_type: resource.address.resource_type.clone(),
            name: resource.address.label.clone(),
            provider: provider.to_string(),
            instances: vec![InstanceState {
                schema_version: 0,
                attributes,
                sensitive_attributes: Vec::new(),
                dependencies,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub schema_version: u32,
    pub attributes: Map<String, Json>,
    #[serde(default)]
    pub sensitive_attributes: Vec<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use hclexport_core::resource::{Attributes, ResourceAddress, Value};
    use serde_json::json;

    use super::*;

    fn exported(resource_type: &str, label: &str, id: &str) -> ExportedResource {
        let mut raw = Attributes::new();
        raw.insert("name".to_string(), Value::from(label));
        ExportedResource {
            address: ResourceAddress::new(resource_type, label),
            id: id.to_string(),
            attributes: raw.clone(),
            raw,
            depends_on: BTreeSet::new(),
            json_encoded: BTreeSet::new(),
        }
    }

    #[test]
    fn new_state_is_version_4() {
        let state = StateFile::new();
        assert_eq!(state.version, 4);
        assert_eq!(state.serial, 1);
        assert!(uuid::Uuid::parse_str(&state.lineage).is_ok());
    }

    #[test]
    fn from_exported_resources() {
        let division = exported("genesyscloud_auth_division", "Home", "d-1");
        let mut queue = exported("genesyscloud_routing_queue", "Tier1", "q-1");
        queue.depends_on.insert(division.address.clone());
        queue.depends_on.insert(queue.address.clone());

        let state = StateFile::from_exported(&[division, queue], "mypurecloud/genesyscloud");
        assert_eq!(state.resources.len(), 2);

        let queue = state
            .find_resource("genesyscloud_routing_queue", "Tier1")
            .unwrap();
        assert_eq!(queue.mode, "managed");
        assert_eq!(
            queue.provider,
            "provider[\"registry.terraform.io/mypurecloud/genesyscloud\"]"
        );
        let instance = &queue.instances[0];
        assert_eq!(instance.attributes["id"], json!("q-1"));
        assert_eq!(instance.attributes["name"], json!("Tier1"));
        assert_eq!(instance.dependencies, vec!["genesyscloud_auth_division.Home"]);
    }

    #[test]
    fn serialized_layout() {
        let state = StateFile::from_exported(
            &[exported("genesyscloud_routing_skill", "Spanish", "s-1")],
            "mypurecloud/genesyscloud",
        );
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["version"], 4);
        assert_eq!(json["outputs"], json!({}));
        assert_eq!(json["resources"][0]["type"], "genesyscloud_routing_skill");
        assert_eq!(json["resources"][0]["instances"][0]["schema_version"], 0);
        assert!(json["resources"][0]["instances"][0].get("dependencies").is_none());
    }

    #[test]
    fn continue_lineage_bumps_serial() {
        let mut previous = StateFile::new();
        previous.serial = 7;
        let mut state = StateFile::new();
        state.continue_lineage(&previous);
        assert_eq!(state.lineage, previous.lineage);
        assert_eq!(state.serial, 8);
    }

    #[test]
    fn upsert_replaces_same_address() {
        let mut state = StateFile::new();
        let provider = provider_address("mypurecloud/genesyscloud");
        state.upsert_resource(ResourceState::from_exported(
            &exported("genesyscloud_group", "Admins", "g-1"),
            &provider,
        ));
        state.upsert_resource(ResourceState::from_exported(
            &exported("genesyscloud_group", "Admins", "g-2"),
            &provider,
        ));
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].instances[0].attributes["id"], json!("g-2"));
    }
}
