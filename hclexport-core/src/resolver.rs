//! Resolver - Rewrites raw IDs into references between exported resources
//!
//! The resolver walks one resource's flattened attributes. Paths are built
//! from map keys only, so a path that reaches a list applies to every
//! element. Reference attributes whose ID is in the target type's sanitized
//! map become `Value::ResourceRef`; everything else is cleaned up according
//! to the exporter's policies. Resolution never fails.

use std::collections::BTreeSet;

use log::debug;

use crate::registry::{ExporterRegistry, RefAttrSettings, RefTarget, ResourceExporter};
use crate::resource::{Attributes, ResourceAddress, Value};

/// What happened to a reference whose target was not exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingAction {
    /// Raw ID left in place
    Kept,
    /// Attribute (or list element) dropped
    RemovedAttribute,
    /// Containing block dropped
    RemovedBlock,
}

/// A reference that could not be turned into an interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub path: String,
    pub id: String,
    pub target_type: String,
    pub action: MissingAction,
}

/// Output of resolving one resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub attributes: Attributes,
    /// Every resource referenced by the resolved attributes
    pub references: BTreeSet<ResourceAddress>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Resolver options
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Keep raw IDs of missing targets that no policy removes.
    /// When false they are dropped like `remove_if_missing` attributes.
    pub keep_unresolved: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            keep_unresolved: true,
        }
    }
}

/// Resolves references against every sanitized map of a run
pub struct Resolver<'a> {
    registry: &'a ExporterRegistry,
    config: ResolverConfig,
}

enum Outcome {
    Keep(Value),
    Remove,
    RemoveBlock,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ExporterRegistry) -> Self {
        Self {
            registry,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the attributes of one resource of `exporter`'s type
    pub fn resolve(&self, exporter: &ResourceExporter, attributes: &Attributes) -> Resolution {
        let mut walk = Walk {
            resolver: self,
            exporter,
            references: BTreeSet::new(),
            unresolved: Vec::new(),
        };
        let attributes = walk.walk_map("", attributes).unwrap_or_default();
        Resolution {
            attributes,
            references: walk.references,
            unresolved: walk.unresolved,
        }
    }
}

struct Walk<'r, 'a> {
    resolver: &'r Resolver<'a>,
    exporter: &'r ResourceExporter,
    references: BTreeSet<ResourceAddress>,
    unresolved: Vec<UnresolvedReference>,
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

impl Walk<'_, '_> {
    /// Returns `None` when the block itself must be dropped
    fn walk_map(&mut self, prefix: &str, map: &Attributes) -> Option<Attributes> {
        let root = prefix.is_empty();
        let mut out = Attributes::new();

        for (key, value) in map {
            if root && key == "id" {
                continue;
            }
            let path = join_path(prefix, key);
            if self.exporter.is_excluded(&path) {
                continue;
            }

            let resolved = match self.walk_value(&path, value, map) {
                Outcome::Keep(v) => v,
                Outcome::Remove => continue,
                // Top-level attributes have no enclosing block
                Outcome::RemoveBlock if root => continue,
                Outcome::RemoveBlock => return None,
            };

            if resolved.is_zero() && !self.exporter.allows_zero(&path) {
                continue;
            }
            out.insert(key.clone(), resolved);
        }
        Some(out)
    }

    fn walk_value(&mut self, path: &str, value: &Value, siblings: &Attributes) -> Outcome {
        match value {
            Value::Map(map) => match self.walk_map(path, map) {
                Some(map) => Outcome::Keep(Value::Map(map)),
                None => Outcome::Remove,
            },
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.walk_value(path, item, siblings) {
                        Outcome::Keep(Value::Map(map)) if map.is_empty() => {}
                        Outcome::Keep(v) => out.push(v),
                        Outcome::Remove => {}
                        Outcome::RemoveBlock => return Outcome::RemoveBlock,
                    }
                }
                Outcome::Keep(Value::List(out))
            }
            Value::String(id) => {
                let exporter = self.exporter;
                match exporter.ref_settings(path) {
                    Some(settings) => self.resolve_id(path, id, settings, siblings),
                    None => Outcome::Keep(value.clone()),
                }
            }
            _ => Outcome::Keep(value.clone()),
        }
    }

    fn resolve_id(
        &mut self,
        path: &str,
        id: &str,
        settings: &RefAttrSettings,
        siblings: &Attributes,
    ) -> Outcome {
        if id.is_empty() || settings.alt_values.contains(id) {
            return Outcome::Keep(Value::from(id));
        }

        let target_type = match &settings.target {
            RefTarget::Type(t) => t.as_str(),
            RefTarget::Discriminated { field, targets } => {
                let discriminator = siblings.get(field).and_then(Value::as_str);
                match discriminator.and_then(|d| targets.get(d)) {
                    Some(t) => t.as_str(),
                    None => {
                        debug!(
                            "{}: no target type for {}={:?}, keeping {}",
                            path, field, discriminator, id
                        );
                        return Outcome::Keep(Value::from(id));
                    }
                }
            }
            RefTarget::Undefined => return Outcome::Keep(Value::from(id)),
        };

        if let Some(label) = self.resolver.registry.sanitized_label(target_type, id) {
            let address = ResourceAddress::new(target_type, label);
            self.references.insert(address.clone());
            return Outcome::Keep(Value::ResourceRef(address));
        }

        let (action, outcome) = if settings.remove_outer_item {
            (MissingAction::RemovedBlock, Outcome::RemoveBlock)
        } else if self.exporter.removes_if_missing(path) || !self.resolver.config.keep_unresolved {
            (MissingAction::RemovedAttribute, Outcome::Remove)
        } else {
            (MissingAction::Kept, Outcome::Keep(Value::from(id)))
        };
        self.unresolved.push(UnresolvedReference {
            path: path.to_string(),
            id: id.to_string(),
            target_type: target_type.to_string(),
            action,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::StaticHandler;
    use crate::resource::{LabeledMeta, ResourceMeta};

    fn attrs(entries: Vec<(&str, Value)>) -> Attributes {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn labeled(registry: &mut ExporterRegistry, resource_type: &str, id: &str, label: &str) {
        if registry.get(resource_type).is_none() {
            registry.register(resource_type, ResourceExporter::new(StaticHandler::new()));
        }
        if let Some(exporter) = registry.get_mut(resource_type) {
            exporter.sanitized.insert(
                id.to_string(),
                LabeledMeta {
                    label: label.to_string(),
                    meta: ResourceMeta::new(label),
                },
            );
        }
    }

    fn queue_exporter() -> ResourceExporter {
        ResourceExporter::new(StaticHandler::new())
            .ref_attr("division_id", RefAttrSettings::to_type("genesyscloud_auth_division"))
            .ref_attr(
                "queue_flow_id",
                RefAttrSettings::to_type("genesyscloud_flow").with_alt_values(["default"]),
            )
            .ref_attr("whisper_prompt_id", RefAttrSettings::undefined())
            .ref_attr("wrapup_codes", RefAttrSettings::to_type("genesyscloud_routing_wrapupcode"))
            .ref_attr("members.user_id", RefAttrSettings::to_type("genesyscloud_user"))
            .ref_attr(
                "conditional_group_routing_rules.queue_id",
                RefAttrSettings::to_type("genesyscloud_routing_queue").remove_outer_item(),
            )
            .ref_attr(
                "bullseye_rings.member_groups.member_group_id",
                RefAttrSettings::discriminated(
                    "member_group_type",
                    [
                        ("SKILLGROUP", "genesyscloud_routing_skill_group"),
                        ("GROUP", "genesyscloud_group"),
                    ],
                ),
            )
            .remove_if_missing("members", ["user_id"])
            .allow_zero_value("bullseye_rings.expansion_timeout_seconds")
    }

    #[test]
    fn found_id_becomes_reference() {
        let mut registry = ExporterRegistry::new();
        labeled(&mut registry, "genesyscloud_auth_division", "div-1", "Home");
        let exporter = queue_exporter();

        let result = Resolver::new(&registry)
            .resolve(&exporter, &attrs(vec![("division_id", Value::from("div-1"))]));

        let expected = ResourceAddress::new("genesyscloud_auth_division", "Home");
        assert_eq!(
            result.attributes["division_id"],
            Value::ResourceRef(expected.clone())
        );
        assert_eq!(expected.interpolation(), "${genesyscloud_auth_division.Home.id}");
        assert!(result.references.contains(&expected));
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn root_id_is_stripped() {
        let registry = ExporterRegistry::new();
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![("id", Value::from("q-1")), ("name", Value::from("Sales"))]),
        );
        assert!(!result.attributes.contains_key("id"));
        assert_eq!(result.attributes["name"], Value::from("Sales"));
    }

    #[test]
    fn alt_values_pass_through() {
        let registry = ExporterRegistry::new();
        let result = Resolver::new(&registry)
            .resolve(&queue_exporter(), &attrs(vec![("queue_flow_id", Value::from("default"))]));
        assert_eq!(result.attributes["queue_flow_id"], Value::from("default"));
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn undefined_target_is_left_unresolved() {
        let registry = ExporterRegistry::new();
        let result = Resolver::new(&registry)
            .resolve(&queue_exporter(), &attrs(vec![("whisper_prompt_id", Value::from("p-1"))]));
        assert_eq!(result.attributes["whisper_prompt_id"], Value::from("p-1"));
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn missing_target_keeps_raw_id_without_policy() {
        let mut registry = ExporterRegistry::new();
        labeled(&mut registry, "genesyscloud_auth_division", "div-1", "Home");
        let result = Resolver::new(&registry)
            .resolve(&queue_exporter(), &attrs(vec![("division_id", Value::from("div-9"))]));

        assert_eq!(result.attributes["division_id"], Value::from("div-9"));
        assert_eq!(result.unresolved.len(), 1);
        assert_eq!(result.unresolved[0].action, MissingAction::Kept);
        assert_eq!(result.unresolved[0].target_type, "genesyscloud_auth_division");
    }

    #[test]
    fn missing_target_dropped_when_not_keeping_unresolved() {
        let registry = ExporterRegistry::new();
        let result = Resolver::new(&registry)
            .with_config(ResolverConfig {
                keep_unresolved: false,
            })
            .resolve(&queue_exporter(), &attrs(vec![("division_id", Value::from("div-9"))]));
        assert!(!result.attributes.contains_key("division_id"));
    }

    #[test]
    fn remove_if_missing_drops_only_the_attribute() {
        let registry = ExporterRegistry::new();
        let member = attrs(vec![
            ("user_id", Value::from("u-404")),
            ("ring_num", Value::Int(2)),
        ]);
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![("members", Value::List(vec![Value::Map(member)]))]),
        );

        let Value::List(members) = &result.attributes["members"] else {
            panic!("members should remain a list");
        };
        assert_eq!(members.len(), 1);
        let Value::Map(member) = &members[0] else {
            panic!("member should be a block");
        };
        assert!(!member.contains_key("user_id"));
        assert_eq!(member["ring_num"], Value::Int(2));
        assert_eq!(result.unresolved[0].action, MissingAction::RemovedAttribute);
    }

    #[test]
    fn remove_outer_item_drops_the_block() {
        let mut registry = ExporterRegistry::new();
        labeled(&mut registry, "genesyscloud_routing_queue", "q-2", "Overflow");
        let rule = |queue: &str, wait: i64| {
            Value::Map(attrs(vec![
                ("queue_id", Value::from(queue)),
                ("wait_seconds", Value::Int(wait)),
            ]))
        };
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![(
                "conditional_group_routing_rules",
                Value::List(vec![rule("q-404", 5), rule("q-2", 10)]),
            )]),
        );

        let Value::List(rules) = &result.attributes["conditional_group_routing_rules"] else {
            panic!("rules should remain a list");
        };
        assert_eq!(rules.len(), 1);
        let Value::Map(kept) = &rules[0] else {
            panic!("rule should be a block");
        };
        assert_eq!(
            kept["queue_id"],
            Value::ResourceRef(ResourceAddress::new("genesyscloud_routing_queue", "Overflow"))
        );
        assert_eq!(result.unresolved[0].action, MissingAction::RemovedBlock);
    }

    #[test]
    fn list_of_ids_resolves_each_element() {
        let mut registry = ExporterRegistry::new();
        labeled(&mut registry, "genesyscloud_routing_wrapupcode", "w-1", "Resolved");
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![(
                "wrapup_codes",
                Value::List(vec![Value::from("w-1"), Value::from("w-2")]),
            )]),
        );
        assert_eq!(
            result.attributes["wrapup_codes"],
            Value::List(vec![
                Value::ResourceRef(ResourceAddress::new(
                    "genesyscloud_routing_wrapupcode",
                    "Resolved"
                )),
                Value::from("w-2"),
            ])
        );
    }

    #[test]
    fn discriminated_member_group_resolves_by_type() {
        let mut registry = ExporterRegistry::new();
        labeled(&mut registry, "genesyscloud_routing_skill_group", "abc123", "Tier1");
        let group = attrs(vec![
            ("member_group_id", Value::from("abc123")),
            ("member_group_type", Value::from("SKILLGROUP")),
        ]);
        let ring = attrs(vec![("member_groups", Value::List(vec![Value::Map(group)]))]);
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![("bullseye_rings", Value::List(vec![Value::Map(ring)]))]),
        );

        let Value::List(rings) = &result.attributes["bullseye_rings"] else {
            panic!("rings should remain a list");
        };
        let Value::Map(ring) = &rings[0] else {
            panic!("ring should be a block");
        };
        let Value::List(groups) = &ring["member_groups"] else {
            panic!("member_groups should remain a list");
        };
        let Value::Map(group) = &groups[0] else {
            panic!("member group should be a block");
        };
        let Value::ResourceRef(address) = &group["member_group_id"] else {
            panic!("member_group_id should resolve");
        };
        assert_eq!(
            address.interpolation(),
            "${genesyscloud_routing_skill_group.Tier1.id}"
        );
    }

    #[test]
    fn unknown_discriminator_keeps_raw_id() {
        let registry = ExporterRegistry::new();
        let group = attrs(vec![
            ("member_group_id", Value::from("abc123")),
            ("member_group_type", Value::from("TEAM")),
        ]);
        let ring = attrs(vec![("member_groups", Value::List(vec![Value::Map(group.clone())]))]);
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![("bullseye_rings", Value::List(vec![Value::Map(ring.clone())]))]),
        );
        assert_eq!(
            result.attributes["bullseye_rings"],
            Value::List(vec![Value::Map(ring)])
        );
    }

    #[test]
    fn zero_values_removed_unless_allowed() {
        let registry = ExporterRegistry::new();
        let ring = attrs(vec![
            ("expansion_timeout_seconds", Value::Int(0)),
            ("skills_to_remove", Value::List(vec![])),
        ]);
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![
                ("description", Value::from("")),
                ("priority", Value::Int(0)),
                ("auto_answer_only", Value::Bool(false)),
                ("bullseye_rings", Value::List(vec![Value::Map(ring)])),
            ]),
        );

        assert!(!result.attributes.contains_key("description"));
        assert!(!result.attributes.contains_key("priority"));
        assert_eq!(result.attributes["auto_answer_only"], Value::Bool(false));
        assert_eq!(
            result.attributes["bullseye_rings"],
            Value::List(vec![Value::Map(attrs(vec![(
                "expansion_timeout_seconds",
                Value::Int(0)
            )]))])
        );
    }

    #[test]
    fn excluded_attributes_are_removed() {
        let registry = ExporterRegistry::new();
        let exporter = queue_exporter().exclude_attribute("media_settings.call");
        let media = attrs(vec![
            ("call", Value::Map(attrs(vec![("alerting_timeout_sec", Value::Int(8))]))),
            ("email", Value::Map(attrs(vec![("alerting_timeout_sec", Value::Int(300))]))),
        ]);
        let result = Resolver::new(&registry)
            .resolve(&exporter, &attrs(vec![("media_settings", Value::Map(media))]));

        let Value::Map(media) = &result.attributes["media_settings"] else {
            panic!("media_settings should remain a map");
        };
        assert!(!media.contains_key("call"));
        assert!(media.contains_key("email"));
    }

    #[test]
    fn emptied_blocks_are_removed() {
        let registry = ExporterRegistry::new();
        let member = attrs(vec![("user_id", Value::from("u-404"))]);
        let result = Resolver::new(&registry).resolve(
            &queue_exporter(),
            &attrs(vec![("members", Value::List(vec![Value::Map(member)]))]),
        );
        assert!(!result.attributes.contains_key("members"));
    }
}
