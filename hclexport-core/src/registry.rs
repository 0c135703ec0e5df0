//! Registry - Per-run table of resource exporters
//!
//! Each resource type is described by a `ResourceExporter`: the handler
//! that lists and reads it, plus the policies the resolver applies to its
//! attributes. The registry is built for one export run and passed
//! explicitly to every phase.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::provider::ResourceHandler;
use crate::resource::SanitizedResourceMap;
use crate::schema::ResourceSchema;

/// How a reference attribute finds its target type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Look the ID up in the sanitized map of this type
    Type(String),
    /// The target type is chosen by a sibling field of the same block
    Discriminated {
        field: String,
        targets: BTreeMap<String, String>,
    },
    /// A reference whose target type is not exported; left unresolved
    Undefined,
}

/// Resolution policy of one reference attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAttrSettings {
    pub target: RefTarget,
    /// Drop the whole containing block when the target is missing
    pub remove_outer_item: bool,
    /// Literal values that are not IDs and pass through unchanged
    pub alt_values: BTreeSet<String>,
}

impl RefAttrSettings {
    fn with_target(target: RefTarget) -> Self {
        Self {
            target,
            remove_outer_item: false,
            alt_values: BTreeSet::new(),
        }
    }

    pub fn to_type(resource_type: impl Into<String>) -> Self {
        Self::with_target(RefTarget::Type(resource_type.into()))
    }

    pub fn discriminated<'a>(
        field: impl Into<String>,
        targets: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self::with_target(RefTarget::Discriminated {
            field: field.into(),
            targets: targets
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    pub fn undefined() -> Self {
        Self::with_target(RefTarget::Undefined)
    }

    pub fn remove_outer_item(mut self) -> Self {
        self.remove_outer_item = true;
        self
    }

    pub fn with_alt_values<'a>(mut self, values: impl IntoIterator<Item = &'a str>) -> Self {
        self.alt_values
            .extend(values.into_iter().map(str::to_string));
        self
    }
}

/// Descriptor of one exportable resource type
#[derive(Clone)]
pub struct ResourceExporter {
    pub handler: Arc<dyn ResourceHandler>,
    pub schema: Option<ResourceSchema>,
    /// Attribute path -> reference policy
    pub ref_attrs: BTreeMap<String, RefAttrSettings>,
    /// Paths whose zero values are kept
    pub allow_zero_values: BTreeSet<String>,
    /// Block path -> attributes dropped (not the block) when unresolvable.
    /// The empty block path addresses top-level attributes.
    pub remove_if_missing: BTreeMap<String, BTreeSet<String>>,
    /// Paths removed from the output entirely
    pub excluded_attributes: BTreeSet<String>,
    /// Top-level attributes whose string value is a JSON document
    pub json_encode_attributes: BTreeSet<String>,
    /// Labels assigned for this run
    pub sanitized: SanitizedResourceMap,
}

impl std::fmt::Debug for ResourceExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceExporter")
            .field("ref_attrs", &self.ref_attrs)
            .field("allow_zero_values", &self.allow_zero_values)
            .field("remove_if_missing", &self.remove_if_missing)
            .field("excluded_attributes", &self.excluded_attributes)
            .field("json_encode_attributes", &self.json_encode_attributes)
            .field("sanitized", &self.sanitized.len())
            .finish_non_exhaustive()
    }
}

impl ResourceExporter {
    pub fn new(handler: impl ResourceHandler + 'static) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    pub fn from_arc(handler: Arc<dyn ResourceHandler>) -> Self {
        Self {
            handler,
            schema: None,
            ref_attrs: BTreeMap::new(),
            allow_zero_values: BTreeSet::new(),
            remove_if_missing: BTreeMap::new(),
            excluded_attributes: BTreeSet::new(),
            json_encode_attributes: BTreeSet::new(),
            sanitized: SanitizedResourceMap::new(),
        }
    }

    pub fn with_schema(mut self, schema: ResourceSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn ref_attr(mut self, path: impl Into<String>, settings: RefAttrSettings) -> Self {
        self.ref_attrs.insert(path.into(), settings);
        self
    }

    pub fn allow_zero_value(mut self, path: impl Into<String>) -> Self {
        self.allow_zero_values.insert(path.into());
        self
    }

    pub fn remove_if_missing<'a>(
        mut self,
        block: impl Into<String>,
        attributes: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.remove_if_missing
            .entry(block.into())
            .or_default()
            .extend(attributes.into_iter().map(str::to_string));
        self
    }

    pub fn exclude_attribute(mut self, path: impl Into<String>) -> Self {
        self.excluded_attributes.insert(path.into());
        self
    }

    pub fn json_encode_attribute(mut self, name: impl Into<String>) -> Self {
        self.json_encode_attributes.insert(name.into());
        self
    }

    /// Reference settings for a path, falling back to a `parent.*` wildcard
    pub fn ref_settings(&self, path: &str) -> Option<&RefAttrSettings> {
        self.ref_attrs.get(path).or_else(|| {
            let (parent, _) = path.rsplit_once('.')?;
            self.ref_attrs.get(&format!("{}.*", parent))
        })
    }

    pub fn allows_zero(&self, path: &str) -> bool {
        self.allow_zero_values.contains(path)
    }

    pub fn removes_if_missing(&self, path: &str) -> bool {
        let (block, attr) = path.rsplit_once('.').unwrap_or(("", path));
        self.remove_if_missing
            .get(block)
            .is_some_and(|attrs| attrs.contains(attr))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_attributes.iter().any(|excluded| {
            path == excluded
                || path
                    .strip_prefix(excluded.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Every type this exporter's references can point at
    pub fn referenced_types(&self) -> BTreeSet<&str> {
        let mut types = BTreeSet::new();
        for settings in self.ref_attrs.values() {
            match &settings.target {
                RefTarget::Type(t) => {
                    types.insert(t.as_str());
                }
                RefTarget::Discriminated { targets, .. } => {
                    types.extend(targets.values().map(String::as_str));
                }
                RefTarget::Undefined => {}
            }
        }
        types
    }
}

/// Resource type name -> exporter, for one run
#[derive(Debug, Clone, Default)]
pub struct ExporterRegistry {
    exporters: BTreeMap<String, ResourceExporter>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exporter(mut self, resource_type: impl Into<String>, exporter: ResourceExporter) -> Self {
        self.register(resource_type, exporter);
        self
    }

    pub fn register(&mut self, resource_type: impl Into<String>, exporter: ResourceExporter) {
        self.exporters.insert(resource_type.into(), exporter);
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceExporter> {
        self.exporters.get(resource_type)
    }

    pub fn get_mut(&mut self, resource_type: &str) -> Option<&mut ResourceExporter> {
        self.exporters.get_mut(resource_type)
    }

    pub fn remove(&mut self, resource_type: &str) -> Option<ResourceExporter> {
        self.exporters.remove(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.exporters.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceExporter)> {
        self.exporters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ResourceExporter)> {
        self.exporters.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.exporters.retain(|k, _| keep(k));
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    /// Label assigned to an object of a type in this run
    pub fn sanitized_label(&self, resource_type: &str, id: &str) -> Option<&str> {
        self.exporters
            .get(resource_type)?
            .sanitized
            .get(id)
            .map(|m| m.label.as_str())
    }
}
