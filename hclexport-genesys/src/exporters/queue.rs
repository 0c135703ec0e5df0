//! genesyscloud_routing_queue
//!
//! A queue read combines three endpoints: the queue itself, its members
//! and its wrap-up codes. Member groups are split into `skill_groups`,
//! `groups` and `teams` by their type; the bullseye and conditional
//! routing blocks carry typed member groups whose target is chosen by
//! `member_group_type`.

use std::sync::Arc;

use hclexport_core::provider::{BoxFuture, ProviderResult, ResourceHandler};
use hclexport_core::registry::{RefAttrSettings, ResourceExporter};
use hclexport_core::resource::{Attributes, ResourceIdMetaMap, ResourceMeta, Value};
use hclexport_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

use super::{ApiHandler, Flattener, division, group, skill, skill_group, user, wrapupcode};
use crate::client::GenesysClient;
use crate::listing::list_pages;

pub const RESOURCE_TYPE: &str = "genesyscloud_routing_queue";

const BULLSEYE_TIMEOUT: &str = "TIMEOUT_SECONDS";

/// Discriminator targets shared by every `member_group_id`
const MEMBER_GROUP_TARGETS: [(&str, &str); 2] = [
    ("SKILLGROUP", skill_group::RESOURCE_TYPE),
    ("GROUP", group::RESOURCE_TYPE),
];

pub fn exporter(client: Arc<GenesysClient>) -> ResourceExporter {
    let handler = QueueHandler {
        queues: ApiHandler::new(
            client.clone(),
            RESOURCE_TYPE,
            "/api/v2/routing/queues",
            "/api/v2/routing/queues/{id}",
            |queue| flatten(queue, &[], &[]),
        ),
        client,
    };
    let member_group = || RefAttrSettings::discriminated("member_group_type", MEMBER_GROUP_TARGETS);

    ResourceExporter::new(handler)
        .with_schema(schema())
        .ref_attr("division_id", RefAttrSettings::to_type(division::RESOURCE_TYPE))
        // Flows, prompts, scripts, SMS addresses and teams are not exported
        .ref_attr("queue_flow_id", RefAttrSettings::undefined())
        .ref_attr("whisper_prompt_id", RefAttrSettings::undefined())
        .ref_attr("outbound_messaging_sms_address_id", RefAttrSettings::undefined())
        .ref_attr("default_script_ids.*", RefAttrSettings::undefined())
        .ref_attr("teams", RefAttrSettings::undefined())
        .ref_attr(
            "members.user_id",
            RefAttrSettings::to_type(user::RESOURCE_TYPE).remove_outer_item(),
        )
        .ref_attr("wrapup_codes", RefAttrSettings::to_type(wrapupcode::RESOURCE_TYPE))
        .ref_attr("skill_groups", RefAttrSettings::to_type(skill_group::RESOURCE_TYPE))
        .ref_attr("groups", RefAttrSettings::to_type(group::RESOURCE_TYPE))
        .ref_attr(
            "bullseye_rings.skills_to_remove",
            RefAttrSettings::to_type(skill::RESOURCE_TYPE),
        )
        .ref_attr("bullseye_rings.member_groups.member_group_id", member_group())
        .ref_attr(
            "conditional_group_routing_rules.groups.member_group_id",
            member_group(),
        )
        .ref_attr(
            "conditional_group_routing_rules.queue_id",
            RefAttrSettings::to_type(RESOURCE_TYPE).remove_outer_item(),
        )
        .allow_zero_value("bullseye_rings.expansion_timeout_seconds")
        .allow_zero_value("members.ring_num")
}

struct QueueHandler {
    queues: ApiHandler,
    client: Arc<GenesysClient>,
}

impl QueueHandler {
    async fn sub_entities(&self, id: &str, collection: &str) -> ProviderResult<Vec<Json>> {
        let path = format!("/api/v2/routing/queues/{}/{}", id, collection);
        list_pages(&self.client, &path, &[])
            .await
            .map_err(|e| e.for_resource(RESOURCE_TYPE, id))
    }
}

impl ResourceHandler for QueueHandler {
    fn list(&self) -> BoxFuture<'_, ProviderResult<ResourceIdMetaMap>> {
        self.queues.list()
    }

    fn read(&self, id: &str, _meta: &ResourceMeta) -> BoxFuture<'_, ProviderResult<Option<Attributes>>> {
        let id = id.to_string();
        Box::pin(async move {
            let Some(queue) = self.queues.fetch(&id).await? else {
                return Ok(None);
            };
            let members = self.sub_entities(&id, "members").await?;
            let codes = self.sub_entities(&id, "wrapupcodes").await?;
            Ok(Some(flatten(&queue, &members, &codes)))
        })
    }
}

fn schema() -> ResourceSchema {
    let member_groups = || {
        types::blocks(vec![
            AttributeSchema::new("member_group_id", AttributeType::String).required(),
            AttributeSchema::new(
                "member_group_type",
                AttributeType::Enum(vec![
                    "SKILLGROUP".to_string(),
                    "GROUP".to_string(),
                    "TEAM".to_string(),
                ]),
            )
            .required(),
        ])
    };

    ResourceSchema::new(RESOURCE_TYPE)
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("division_id", AttributeType::String))
        .attribute(AttributeSchema::new("acw_wrapup_prompt", AttributeType::String))
        .attribute(AttributeSchema::new("acw_timeout_ms", AttributeType::Int))
        .attribute(AttributeSchema::new("skill_evaluation_method", AttributeType::String))
        .attribute(AttributeSchema::new("queue_flow_id", AttributeType::String))
        .attribute(AttributeSchema::new("whisper_prompt_id", AttributeType::String))
        .attribute(AttributeSchema::new("auto_answer_only", AttributeType::Bool))
        .attribute(AttributeSchema::new("enable_transcription", AttributeType::Bool))
        .attribute(AttributeSchema::new("enable_manual_assignment", AttributeType::Bool))
        .attribute(AttributeSchema::new("calling_party_name", AttributeType::String))
        .attribute(AttributeSchema::new("calling_party_number", AttributeType::String))
        .attribute(AttributeSchema::new(
            "default_script_ids",
            AttributeType::Map(Box::new(AttributeType::String)),
        ))
        .attribute(AttributeSchema::new(
            "outbound_messaging_sms_address_id",
            AttributeType::String,
        ))
        .attribute(AttributeSchema::new(
            "media_settings_call",
            types::blocks(vec![
                AttributeSchema::new("alerting_timeout_sec", AttributeType::Int),
                AttributeSchema::new("service_level_percentage", AttributeType::Float),
                AttributeSchema::new("service_level_duration_ms", AttributeType::Int),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "bullseye_rings",
            types::blocks(vec![
                AttributeSchema::new("expansion_timeout_seconds", AttributeType::Float),
                AttributeSchema::new("skills_to_remove", types::id_list()),
                AttributeSchema::new("member_groups", member_groups()),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "conditional_group_routing_rules",
            types::blocks(vec![
                AttributeSchema::new("queue_id", AttributeType::String),
                AttributeSchema::new("operator", AttributeType::String),
                AttributeSchema::new("metric", AttributeType::String),
                AttributeSchema::new("condition_value", AttributeType::Float),
                AttributeSchema::new("wait_seconds", AttributeType::Int),
                AttributeSchema::new("groups", member_groups()),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "members",
            types::blocks(vec![
                AttributeSchema::new("user_id", AttributeType::String).required(),
                AttributeSchema::new("ring_num", AttributeType::Int),
            ]),
        ))
        .attribute(AttributeSchema::new("wrapup_codes", types::id_list()))
        .attribute(AttributeSchema::new("skill_groups", types::id_list()))
        .attribute(AttributeSchema::new("groups", types::id_list()))
        .attribute(AttributeSchema::new("teams", types::id_list()))
}

fn flatten(queue: &Json, members: &[Json], codes: &[Json]) -> Attributes {
    let mut attrs = Flattener::new(queue)
        .scalar("name", "name")
        .scalar("description", "description")
        .nested_id("division_id", "division")
        .scalar("skill_evaluation_method", "skillEvaluationMethod")
        .nested_id("queue_flow_id", "queueFlow")
        .nested_id("whisper_prompt_id", "whisperPrompt")
        .scalar("auto_answer_only", "autoAnswerOnly")
        .scalar("enable_transcription", "enableTranscription")
        .scalar("enable_manual_assignment", "enableManualAssignment")
        .scalar("calling_party_name", "callingPartyName")
        .scalar("calling_party_number", "callingPartyNumber")
        .finish();

    if let Some(acw) = queue.get("acwSettings") {
        attrs.extend(
            Flattener::new(acw)
                .scalar("acw_wrapup_prompt", "wrapupPrompt")
                .scalar("acw_timeout_ms", "timeoutMs")
                .finish(),
        );
    }
    if let Some(sms) = queue.pointer("/outboundMessagingAddresses/smsAddress/id").and_then(Json::as_str) {
        attrs.insert("outbound_messaging_sms_address_id".to_string(), Value::from(sms));
    }
    if let Some(scripts) = queue.get("defaultScripts").and_then(Json::as_object) {
        let ids: Attributes = scripts
            .iter()
            .filter_map(|(media, script)| {
                let id = script.get("id").and_then(Json::as_str)?;
                Some((media.clone(), Value::from(id)))
            })
            .collect();
        attrs.insert("default_script_ids".to_string(), Value::Map(ids));
    }
    if let Some(call) = queue.pointer("/mediaSettings/call") {
        let mut settings = Flattener::new(call)
            .scalar("alerting_timeout_sec", "alertingTimeoutSeconds")
            .finish();
        if let Some(level) = call.get("serviceLevel") {
            settings.extend(
                Flattener::new(level)
                    .scalar("service_level_percentage", "percentage")
                    .scalar("service_level_duration_ms", "durationMs")
                    .finish(),
            );
        }
        attrs.insert(
            "media_settings_call".to_string(),
            Value::List(vec![Value::Map(settings)]),
        );
    }

    if let Some(rings) = queue.pointer("/bullseye/rings").and_then(Json::as_array) {
        attrs.insert("bullseye_rings".to_string(), flatten_bullseye_rings(rings));
    }
    if let Some(rules) = queue
        .pointer("/conditionalGroupRouting/rules")
        .and_then(Json::as_array)
        .filter(|rules| !rules.is_empty())
    {
        attrs.insert(
            "conditional_group_routing_rules".to_string(),
            flatten_conditional_rules(rules),
        );
    }

    for (attr, group_type) in [("skill_groups", "SKILLGROUP"), ("groups", "GROUP"), ("teams", "TEAM")] {
        let ids = member_groups_of_type(queue, group_type);
        if !ids.is_empty() {
            attrs.insert(attr.to_string(), Value::List(ids));
        }
    }

    let members: Vec<Value> = members
        .iter()
        .map(|member| {
            Value::Map(
                Flattener::new(member)
                    .scalar("user_id", "id")
                    .scalar("ring_num", "ringNumber")
                    .finish(),
            )
        })
        .collect();
    if !members.is_empty() {
        attrs.insert("members".to_string(), Value::List(members));
    }

    let codes: Vec<Value> = codes
        .iter()
        .filter_map(|code| code.get("id").and_then(Json::as_str))
        .map(Value::from)
        .collect();
    if !codes.is_empty() {
        attrs.insert("wrapup_codes".to_string(), Value::List(codes));
    }

    attrs
}

fn flatten_member_group(group: &Json) -> Attributes {
    Flattener::new(group)
        .scalar("member_group_id", "id")
        .scalar("member_group_type", "type")
        .finish()
}

/// The final ring is the implicit default and is not configurable
fn flatten_bullseye_rings(rings: &[Json]) -> Value {
    let configurable = &rings[..rings.len().saturating_sub(1)];
    let blocks = configurable
        .iter()
        .map(|ring| {
            let mut block = Flattener::new(ring)
                .blocks("member_groups", "memberGroups", flatten_member_group)
                .finish();
            let timeout = ring
                .get("expansionCriteria")
                .and_then(Json::as_array)
                .into_iter()
                .flatten()
                .find(|c| c.get("type").and_then(Json::as_str) == Some(BULLSEYE_TIMEOUT))
                .and_then(|c| c.get("threshold"));
            if let Some(threshold) = timeout.and_then(Json::as_f64) {
                block.insert("expansion_timeout_seconds".to_string(), Value::Float(threshold));
            }
            if let Some(actions) = ring.get("actions") {
                block.extend(
                    Flattener::new(actions)
                        .id_list("skills_to_remove", "skillsToRemove")
                        .finish(),
                );
            }
            Value::Map(block)
        })
        .collect();
    Value::List(blocks)
}

/// The first rule always applies to the queue itself, so it has no `queue_id`
fn flatten_conditional_rules(rules: &[Json]) -> Value {
    let blocks = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let mut block = Flattener::new(rule)
                .scalar("operator", "operator")
                .scalar("metric", "metric")
                .scalar("condition_value", "conditionValue")
                .scalar("wait_seconds", "waitSeconds")
                .blocks("groups", "groups", flatten_member_group)
                .finish();
            if i > 0 {
                block.extend(Flattener::new(rule).nested_id("queue_id", "queue").finish());
            }
            Value::Map(block)
        })
        .collect();
    Value::List(blocks)
}

fn member_groups_of_type(queue: &Json, group_type: &str) -> Vec<Value> {
    queue
        .get("memberGroups")
        .and_then(Json::as_array)
        .into_iter()
        .flatten()
        .filter(|g| g.get("type").and_then(Json::as_str) == Some(group_type))
        .filter_map(|g| g.get("id").and_then(Json::as_str))
        .map(Value::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json as AxumJson, Router};
    use hclexport_core::registry::ExporterRegistry;
    use hclexport_core::resolver::Resolver;
    use hclexport_core::resource::{LabeledMeta, ResourceAddress};
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::exporters::offline_client;

    fn tier1() -> Json {
        json!({
            "id": "q1",
            "name": "Tier1",
            "division": {"id": "d1"},
            "acwSettings": {"wrapupPrompt": "MANDATORY_TIMEOUT", "timeoutMs": 30000},
            "queueFlow": {"id": "flow-1"},
            "defaultScripts": {"CALL": {"id": "script-1"}},
            "mediaSettings": {"call": {"alertingTimeoutSeconds": 8, "serviceLevel": {"percentage": 0.8, "durationMs": 20000}}},
            "bullseye": {"rings": [
                {
                    "expansionCriteria": [{"type": "TIMEOUT_SECONDS", "threshold": 0.0}],
                    "actions": {"skillsToRemove": [{"id": "s1"}]},
                    "memberGroups": [{"id": "sg1", "type": "SKILLGROUP"}, {"id": "t1", "type": "TEAM"}]
                },
                {"expansionCriteria": [{"type": "TIMEOUT_SECONDS", "threshold": 30.0}]}
            ]},
            "conditionalGroupRouting": {"rules": [
                {"operator": "GreaterThan", "metric": "EstimatedWaitTime", "conditionValue": 30.0, "waitSeconds": 20,
                 "queue": {"id": "q1"}, "groups": [{"id": "g1", "type": "GROUP"}]},
                {"operator": "GreaterThan", "metric": "EstimatedWaitTime", "conditionValue": 60.0, "waitSeconds": 20,
                 "queue": {"id": "q-gone"}, "groups": [{"id": "g1", "type": "GROUP"}]}
            ]},
            "memberGroups": [
                {"id": "sg1", "type": "SKILLGROUP"},
                {"id": "g1", "type": "GROUP"},
                {"id": "t1", "type": "TEAM"}
            ]
        })
    }

    fn labeled(exporter: &mut ResourceExporter, id: &str, label: &str) {
        exporter.sanitized.insert(
            id.to_string(),
            LabeledMeta {
                label: label.to_string(),
                meta: ResourceMeta::new(label),
            },
        );
    }

    fn list_of_maps(value: &Value) -> Vec<&Attributes> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Map(map) => map,
                    other => panic!("expected block, got {:?}", other),
                })
                .collect(),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn flatten_queue() {
        let members = vec![json!({"id": "u1", "ringNumber": 1}), json!({"id": "u-gone", "ringNumber": 2})];
        let codes = vec![json!({"id": "w1", "name": "Resolved"})];
        let attrs = flatten(&tier1(), &members, &codes);

        assert_eq!(attrs["acw_timeout_ms"], Value::Int(30000));
        assert_eq!(attrs["queue_flow_id"], Value::from("flow-1"));
        assert_eq!(attrs["skill_groups"], Value::List(vec![Value::from("sg1")]));
        assert_eq!(attrs["teams"], Value::List(vec![Value::from("t1")]));
        assert_eq!(attrs["wrapup_codes"], Value::List(vec![Value::from("w1")]));

        // Default ring is left out
        let rings = list_of_maps(&attrs["bullseye_rings"]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0]["expansion_timeout_seconds"], Value::Float(0.0));

        let rules = list_of_maps(&attrs["conditional_group_routing_rules"]);
        assert!(!rules[0].contains_key("queue_id"));
        assert_eq!(rules[1]["queue_id"], Value::from("q-gone"));

        let call = list_of_maps(&attrs["media_settings_call"]);
        assert_eq!(call[0]["service_level_duration_ms"], Value::Int(20000));

        assert!(schema().validate(&attrs).is_ok());
    }

    #[test]
    fn resolve_tier1_references() {
        let client = offline_client();
        let mut skills = skill::exporter(client.clone());
        labeled(&mut skills, "s1", "Spanish");
        let mut skill_groups = skill_group::exporter(client.clone());
        labeled(&mut skill_groups, "sg1", "Bilingual");
        let mut groups = group::exporter(client.clone());
        labeled(&mut groups, "g1", "Supervisors");
        let mut users = user::exporter(client.clone());
        labeled(&mut users, "u1", "jane_example_com");
        let mut queues = exporter(client);
        labeled(&mut queues, "q1", "Tier1");

        let registry = ExporterRegistry::new()
            .with_exporter(skill::RESOURCE_TYPE, skills)
            .with_exporter(skill_group::RESOURCE_TYPE, skill_groups)
            .with_exporter(group::RESOURCE_TYPE, groups)
            .with_exporter(user::RESOURCE_TYPE, users)
            .with_exporter(RESOURCE_TYPE, queues.clone());

        let members = vec![json!({"id": "u1", "ringNumber": 1}), json!({"id": "u-gone", "ringNumber": 2})];
        let raw = flatten(&tier1(), &members, &[]);
        let resolution = Resolver::new(&registry).resolve(&queues, &raw);
        let attrs = &resolution.attributes;

        let rings = list_of_maps(&attrs["bullseye_rings"]);
        assert_eq!(rings[0]["expansion_timeout_seconds"], Value::Float(0.0));
        assert_eq!(
            rings[0]["skills_to_remove"],
            Value::List(vec![Value::ResourceRef(ResourceAddress::new(skill::RESOURCE_TYPE, "Spanish"))])
        );
        let ring_groups = list_of_maps(&rings[0]["member_groups"]);
        assert_eq!(
            ring_groups[0]["member_group_id"],
            Value::ResourceRef(ResourceAddress::new(skill_group::RESOURCE_TYPE, "Bilingual"))
        );
        // Teams have no target type and keep their raw ID
        assert_eq!(ring_groups[1]["member_group_id"], Value::from("t1"));

        // Rule pointing at an unexported queue is dropped
        let rules = list_of_maps(&attrs["conditional_group_routing_rules"]);
        assert_eq!(rules.len(), 1);
        let rule_groups = list_of_maps(&rules[0]["groups"]);
        assert_eq!(
            rule_groups[0]["member_group_id"],
            Value::ResourceRef(ResourceAddress::new(group::RESOURCE_TYPE, "Supervisors"))
        );

        // Member whose user is not exported is dropped
        let members = list_of_maps(&attrs["members"]);
        assert_eq!(members.len(), 1);

        assert_eq!(attrs["queue_flow_id"], Value::from("flow-1"));
        assert!(resolution.references.contains(&ResourceAddress::new(user::RESOURCE_TYPE, "jane_example_com")));
    }

    #[tokio::test]
    async fn read_combines_sub_resources() {
        let app = Router::new()
            .route("/api/v2/routing/queues/q1", get(|| async { AxumJson(tier1()) }))
            .route(
                "/api/v2/routing/queues/q1/members",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let entities = if q["pageNumber"] == "1" {
                        json!([{"id": "u1", "ringNumber": 1}])
                    } else {
                        json!([])
                    };
                    AxumJson(json!({"entities": entities}))
                }),
            )
            .route(
                "/api/v2/routing/queues/q1/wrapupcodes",
                get(|| async { AxumJson(json!({"entities": []})) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = Arc::new(
            GenesysClient::new(ClientConfig {
                access_token: Some("token".to_string()),
                api_url: Some(base),
                ..Default::default()
            })
            .unwrap(),
        );

        let exporter = exporter(client);
        let attrs = exporter
            .handler
            .read("q1", &ResourceMeta::new("Tier1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(list_of_maps(&attrs["members"]).len(), 1);
        assert!(!attrs.contains_key("wrapup_codes"));

        let missing = exporter.handler.read("q2", &ResourceMeta::new("gone")).await.unwrap();
        assert!(missing.is_none());
    }
}
