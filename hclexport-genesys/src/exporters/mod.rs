//! Resource exporters for Genesys Cloud object types
//!
//! Each submodule builds the `ResourceExporter` for one Terraform resource
//! type: how it is listed and read, how API payloads are flattened, and
//! which attributes reference other exported types.

pub mod division;
pub mod group;
pub mod queue;
pub mod skill;
pub mod skill_group;
pub mod user;
pub mod wrapupcode;

use std::sync::Arc;

use hclexport_core::provider::{BoxFuture, ProviderError, ProviderResult, ResourceHandler};
use hclexport_core::resource::{Attributes, ResourceIdMetaMap, ResourceMeta, Value};
use serde_json::Value as Json;

use crate::client::GenesysClient;
use crate::listing::{is_deleted, list_cursor, list_pages};

/// Converts an API payload into flattened attributes
pub type Flatten = fn(&Json) -> Attributes;

/// How a collection endpoint pages its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Pages,
    Cursor,
}

/// Handler for types that map one-to-one onto a collection endpoint
pub struct ApiHandler {
    client: Arc<GenesysClient>,
    resource_type: &'static str,
    list_path: &'static str,
    listing: Listing,
    list_query: Vec<(&'static str, String)>,
    name_field: &'static str,
    /// Item path; `{id}` is replaced with the object ID
    read_path: &'static str,
    read_query: Vec<(&'static str, String)>,
    flatten: Flatten,
}

impl ApiHandler {
    pub fn new(
        client: Arc<GenesysClient>,
        resource_type: &'static str,
        list_path: &'static str,
        read_path: &'static str,
        flatten: Flatten,
    ) -> Self {
        Self {
            client,
            resource_type,
            list_path,
            listing: Listing::Pages,
            list_query: Vec::new(),
            name_field: "name",
            read_path,
            read_query: Vec::new(),
            flatten,
        }
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_list_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.list_query.push((key, value.into()));
        self
    }

    pub fn with_read_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.read_query.push((key, value.into()));
        self
    }

    /// Entity field holding the display name
    pub fn with_name_field(mut self, field: &'static str) -> Self {
        self.name_field = field;
        self
    }

    fn item_path(&self, id: &str) -> String {
        self.read_path.replace("{id}", id)
    }

    async fn fetch(&self, id: &str) -> ProviderResult<Option<Json>> {
        let body = self
            .client
            .get(&self.item_path(id), &self.read_query)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(self.resource_type, id))?;
        Ok(body.filter(|entity| !is_deleted(entity)))
    }
}

impl ResourceHandler for ApiHandler {
    fn list(&self) -> BoxFuture<'_, ProviderResult<ResourceIdMetaMap>> {
        Box::pin(async move {
            let entities = match self.listing {
                Listing::Pages => list_pages(&self.client, self.list_path, &self.list_query).await,
                Listing::Cursor => list_cursor(&self.client, self.list_path).await,
            }
            .map_err(|e| e.for_type(self.resource_type))?;
            Ok(id_meta_map(&entities, self.name_field))
        })
    }

    fn read(&self, id: &str, _meta: &ResourceMeta) -> BoxFuture<'_, ProviderResult<Option<Attributes>>> {
        let id = id.to_string();
        Box::pin(async move {
            let entity = self.fetch(&id).await?;
            Ok(entity.map(|e| (self.flatten)(&e)))
        })
    }
}

/// ID -> meta map of the live entities of a listing
pub fn id_meta_map(entities: &[Json], name_field: &str) -> ResourceIdMetaMap {
    entities
        .iter()
        .filter(|entity| !is_deleted(entity))
        .filter_map(|entity| {
            let id = entity.get("id").and_then(Json::as_str)?;
            let name = entity
                .get(name_field)
                .and_then(Json::as_str)
                .unwrap_or_default();
            Some((id.to_string(), ResourceMeta::new(name)))
        })
        .collect()
}

/// Builder for flattened attributes
#[derive(Debug, Default)]
pub struct Flattener<'a> {
    source: Option<&'a Json>,
    out: Attributes,
}

impl<'a> Flattener<'a> {
    pub fn new(source: &'a Json) -> Self {
        Self {
            source: Some(source),
            out: Attributes::new(),
        }
    }

    fn field(&self, key: &str) -> Option<&'a Json> {
        self.source.and_then(|s| s.get(key)).filter(|v| !v.is_null())
    }

    /// Copy a scalar field under a new name
    pub fn scalar(mut self, attr: &str, key: &str) -> Self {
        if let Some(v) = self.field(key) {
            self.out.insert(attr.to_string(), Value::from_json(v.clone()));
        }
        self
    }

    /// `key.id` of an embedded reference object
    pub fn nested_id(mut self, attr: &str, key: &str) -> Self {
        if let Some(id) = self.field(key).and_then(|v| v.get("id")).and_then(Json::as_str) {
            self.out.insert(attr.to_string(), Value::from(id));
        }
        self
    }

    /// List of `id`s of an array of embedded reference objects
    pub fn id_list(mut self, attr: &str, key: &str) -> Self {
        if let Some(items) = self.field(key).and_then(Json::as_array) {
            let ids = items
                .iter()
                .filter_map(|item| item.get("id").and_then(Json::as_str))
                .map(Value::from)
                .collect::<Vec<_>>();
            self.out.insert(attr.to_string(), Value::List(ids));
        }
        self
    }

    /// Nested blocks built from an array field
    pub fn blocks(mut self, attr: &str, key: &str, block: impl Fn(&Json) -> Attributes) -> Self {
        if let Some(items) = self.field(key).and_then(Json::as_array) {
            let blocks = items.iter().map(|item| Value::Map(block(item))).collect();
            self.out.insert(attr.to_string(), Value::List(blocks));
        }
        self
    }

    /// Serialize a field as a JSON-encoded string
    pub fn json_string(mut self, attr: &str, key: &str) -> Self {
        if let Some(v) = self.field(key) {
            self.out.insert(attr.to_string(), Value::String(v.to_string()));
        }
        self
    }

    pub fn set(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.out.insert(attr.to_string(), value.into());
        self
    }

    pub fn finish(self) -> Attributes {
        self.out
    }
}

/// Client pointed at an unroutable address; construction never touches the network
#[cfg(test)]
pub(crate) fn offline_client() -> Arc<GenesysClient> {
    use crate::config::ClientConfig;

    let config = ClientConfig {
        access_token: Some("token".to_string()),
        api_url: Some("http://127.0.0.1:9".to_string()),
        ..Default::default()
    };
    Arc::new(GenesysClient::new(config).unwrap())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn id_meta_map_skips_deleted_and_nameless_ids() {
        let entities = vec![
            json!({"id": "a", "name": "Alpha"}),
            json!({"id": "b", "name": "Beta", "state": "deleted"}),
            json!({"name": "no id"}),
            json!({"id": "c"}),
        ];
        let map = id_meta_map(&entities, "name");
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"].name, "Alpha");
        assert_eq!(map["c"].name, "");
    }

    #[test]
    fn flattener_builds_attributes() {
        let source = json!({
            "name": "Sales",
            "memberCount": 3,
            "description": null,
            "division": {"id": "div-1", "name": "Home"},
            "owners": [{"id": "u1"}, {"id": "u2"}],
            "rules": {"a": 1}
        });
        let attrs = Flattener::new(&source)
            .scalar("name", "name")
            .scalar("description", "description")
            .scalar("member_count", "memberCount")
            .nested_id("division_id", "division")
            .id_list("owner_ids", "owners")
            .json_string("rules", "rules")
            .set("enabled", true)
            .finish();

        assert_eq!(attrs["name"], Value::from("Sales"));
        assert!(!attrs.contains_key("description"));
        assert_eq!(attrs["member_count"], Value::Int(3));
        assert_eq!(attrs["division_id"], Value::from("div-1"));
        assert_eq!(
            attrs["owner_ids"],
            Value::List(vec![Value::from("u1"), Value::from("u2")])
        );
        assert_eq!(attrs["rules"], Value::from(r#"{"a":1}"#));
        assert_eq!(attrs["enabled"], Value::Bool(true));
    }
}
