//! Emitter - Serializing resolved resources as Terraform configuration
//!
//! Produces HCL native syntax (`.tf`) or Terraform JSON (`.tf.json`).
//! Lists of maps are written as repeated nested blocks, references as
//! traversals to the target's `id`.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use hclexport_core::emitter::{Emitter, FormatConfig};
//! use hclexport_core::resource::{Attributes, ExportedResource, ResourceAddress, Value};
//!
//! let mut attributes = Attributes::new();
//! attributes.insert("name".to_string(), Value::from("Home"));
//! let resource = ExportedResource {
//!     address: ResourceAddress::new("genesyscloud_auth_division", "Home"),
//!     id: "d-1".to_string(),
//!     raw: attributes.clone(),
//!     attributes,
//!     depends_on: BTreeSet::new(),
//!     json_encoded: BTreeSet::new(),
//! };
//!
//! let hcl = Emitter::new(FormatConfig::default()).hcl(&[resource]);
//! assert!(hcl.contains("resource \"genesyscloud_auth_division\" \"Home\" {\n  name = \"Home\"\n}"));
//! ```

mod config;
mod hcl;
mod json;

pub use config::{FormatConfig, RequiredProvider};

use crate::resource::ExportedResource;

/// Escape template sequences so Terraform reads them literally
pub fn escape_template(s: &str) -> String {
    s.replace("${", "$${").replace("%{", "%%{")
}

/// Serializes resources with a fixed set of options
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    config: FormatConfig,
    providers: Vec<RequiredProvider>,
    depends_on: bool,
}

impl Emitter {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            depends_on: false,
        }
    }

    pub fn with_provider(mut self, provider: RequiredProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Write explicit `depends_on` lists from resolved references
    pub fn with_depends_on(mut self, depends_on: bool) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// HCL native syntax, resources sorted by type then label
    pub fn hcl(&self, resources: &[ExportedResource]) -> String {
        let mut writer = hcl::HclWriter::new(&self.config);
        writer.write_terraform_block(&self.providers);
        for resource in sorted(resources) {
            writer.write_resource(resource, self.depends_on);
        }
        writer.finish()
    }

    /// Terraform JSON syntax
    pub fn json(&self, resources: &[ExportedResource]) -> Result<String, serde_json::Error> {
        let document = json::to_document(&sorted(resources), &self.providers, self.depends_on);
        let mut text = serde_json::to_string_pretty(&document)?;
        text.push('\n');
        Ok(text)
    }
}

fn sorted(resources: &[ExportedResource]) -> Vec<&ExportedResource> {
    let mut sorted: Vec<&ExportedResource> = resources.iter().collect();
    sorted.sort_by(|a, b| a.address.cmp(&b.address));
    sorted
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::resource::{Attributes, ResourceAddress, Value};

    fn attrs(entries: Vec<(&str, Value)>) -> Attributes {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn resource(resource_type: &str, label: &str, attributes: Attributes) -> ExportedResource {
        ExportedResource {
            address: ResourceAddress::new(resource_type, label),
            id: format!("{}-id", label),
            raw: attributes.clone(),
            attributes,
            depends_on: BTreeSet::new(),
            json_encoded: BTreeSet::new(),
        }
    }

    fn queue() -> ExportedResource {
        let division = ResourceAddress::new("genesyscloud_auth_division", "Home");
        let ring = attrs(vec![
            ("expansion_timeout_seconds", Value::Int(0)),
            (
                "skills_to_remove",
                Value::List(vec![Value::from("s-1"), Value::from("s-2")]),
            ),
        ]);
        let mut queue = resource(
            "genesyscloud_routing_queue",
            "Sales_Queue",
            attrs(vec![
                ("name", Value::from("Sales Queue")),
                ("division_id", Value::ResourceRef(division.clone())),
                ("description", Value::from("Costs ${price} at 100%{x}")),
                ("auto_answer_only", Value::Bool(false)),
                ("default_script_ids", Value::Map(attrs(vec![("CALL", Value::from("sc-1"))]))),
                ("bullseye_rings", Value::List(vec![Value::Map(ring)])),
            ]),
        );
        queue.depends_on.insert(division);
        queue
    }

    #[test]
    fn escape_template_sequences() {
        assert_eq!(escape_template("${a} %{b} $c"), "$${a} %%{b} $c");
    }

    #[test]
    fn hcl_resource_block() {
        let hcl = Emitter::new(FormatConfig::default()).hcl(&[queue()]);
        let expected = r#"resource "genesyscloud_routing_queue" "Sales_Queue" {
  auto_answer_only   = false
  default_script_ids = {
    CALL = "sc-1"
  }
  description        = "Costs $${price} at 100%%{x}"
  division_id        = genesyscloud_auth_division.Home.id
  name               = "Sales Queue"
  bullseye_rings {
    expansion_timeout_seconds = 0
    skills_to_remove          = ["s-1", "s-2"]
  }
}
"#;
        assert_eq!(hcl, expected);
    }

    #[test]
    fn hcl_depends_on_and_providers() {
        let emitter = Emitter::new(FormatConfig {
            align_attributes: false,
            ..Default::default()
        })
        .with_provider(
            RequiredProvider::new("genesyscloud", "mypurecloud/genesyscloud").with_version("1.40.0"),
        )
        .with_depends_on(true);
        let division = resource(
            "genesyscloud_auth_division",
            "Home",
            attrs(vec![("name", Value::from("Home"))]),
        );
        let hcl = emitter.hcl(&[queue(), division]);

        assert!(hcl.starts_with(
            "terraform {\n  required_providers {\n    genesyscloud = {\n      source = \"mypurecloud/genesyscloud\"\n      version = \"1.40.0\"\n    }\n  }\n}\n\n"
        ));
        assert!(hcl.contains("  depends_on = [genesyscloud_auth_division.Home]\n"));
        // Sorted by type
        let division_at = hcl.find("\"genesyscloud_auth_division\"").unwrap();
        let queue_at = hcl.find("\"genesyscloud_routing_queue\"").unwrap();
        assert!(division_at < queue_at);
    }

    #[test]
    fn json_document() {
        let emitter = Emitter::new(FormatConfig::default())
            .with_provider(RequiredProvider::new("genesyscloud", "mypurecloud/genesyscloud"))
            .with_depends_on(true);
        let text = emitter.json(&[queue()]).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();

        let body = &doc["resource"]["genesyscloud_routing_queue"]["Sales_Queue"];
        assert_eq!(body["division_id"], "${genesyscloud_auth_division.Home.id}");
        assert_eq!(body["description"], "Costs $${price} at 100%%{x}");
        assert_eq!(body["bullseye_rings"][0]["expansion_timeout_seconds"], 0);
        assert_eq!(body["depends_on"][0], "genesyscloud_auth_division.Home");
        assert_eq!(
            doc["terraform"]["required_providers"]["genesyscloud"]["source"],
            "mypurecloud/genesyscloud"
        );
    }

    #[test]
    fn json_encoded_attributes() {
        let conditions = r#"[{"operator":"And","routingSkillConditions":[{"comparator":"GreaterThan","proficiency":2,"routingSkill":"Spanish"}]}]"#;
        let mut group = resource(
            "genesyscloud_routing_skill_group",
            "Tier1",
            attrs(vec![
                ("name", Value::from("Tier1")),
                ("skill_conditions", Value::from(conditions)),
            ]),
        );
        group.json_encoded.insert("skill_conditions".to_string());
        let emitter = Emitter::new(FormatConfig {
            align_attributes: false,
            ..Default::default()
        });

        let expected = r#"resource "genesyscloud_routing_skill_group" "Tier1" {
  name = "Tier1"
  skill_conditions = jsonencode([{
    operator = "And"
    routingSkillConditions = [{
      comparator = "GreaterThan"
      proficiency = 2
      routingSkill = "Spanish"
    }]
  }])
}
"#;
        assert_eq!(emitter.hcl(&[group.clone()]), expected);

        // JSON output keeps the encoded document as a string
        let doc: serde_json::Value = serde_json::from_str(&emitter.json(&[group]).unwrap()).unwrap();
        assert_eq!(
            doc["resource"]["genesyscloud_routing_skill_group"]["Tier1"]["skill_conditions"],
            conditions
        );
    }

    #[test]
    fn invalid_json_encoded_attribute_is_quoted() {
        let mut group = resource(
            "genesyscloud_routing_skill_group",
            "Tier1",
            attrs(vec![("skill_conditions", Value::from("not json"))]),
        );
        group.json_encoded.insert("skill_conditions".to_string());
        let hcl = Emitter::new(FormatConfig::default()).hcl(&[group]);
        assert!(hcl.contains("skill_conditions = \"not json\""));
    }

    #[test]
    fn empty_export_is_empty_hcl() {
        assert_eq!(Emitter::new(FormatConfig::default()).hcl(&[]), "");
    }
}
