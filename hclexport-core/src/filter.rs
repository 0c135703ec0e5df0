//! Filter - Narrowing an export to selected types, objects and attributes
//!
//! Type filters are written `<type>` or `<type>::<regex>`. A bare type
//! selects the whole type; a regex selects objects whose display name (or
//! the label derived from it) matches.

use regex::Regex;
use thiserror::Error;

use crate::registry::ExporterRegistry;
use crate::resource::ResourceIdMetaMap;
use crate::sanitizer::sanitize_label;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter '{filter}': {source}")]
    InvalidRegex {
        filter: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    #[error("Invalid excluded attribute '{0}': expected <type>.<attribute>")]
    InvalidExcludedAttribute(String),

    #[error("Resource type '{0}' in excluded attributes is not being exported")]
    UnknownExcludedType(String),
}

/// One `<type>[::<regex>]` entry
#[derive(Debug, Clone)]
pub struct TypeFilter {
    pub resource_type: String,
    pub name: Option<Regex>,
}

impl TypeFilter {
    pub fn parse(entry: &str) -> Result<Self, FilterError> {
        match entry.split_once("::") {
            Some((resource_type, pattern)) => {
                let name = Regex::new(pattern).map_err(|source| FilterError::InvalidRegex {
                    filter: entry.to_string(),
                    source,
                })?;
                Ok(Self {
                    resource_type: resource_type.to_string(),
                    name: Some(name),
                })
            }
            None => Ok(Self {
                resource_type: entry.to_string(),
                name: None,
            }),
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        match &self.name {
            Some(re) => re.is_match(name) || re.is_match(&sanitize_label(name)),
            None => true,
        }
    }
}

/// Include and exclude filters of one run
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    include: Vec<TypeFilter>,
    exclude: Vec<TypeFilter>,
}

impl ResourceFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            include: include
                .iter()
                .map(|e| TypeFilter::parse(e))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|e| TypeFilter::parse(e))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn includes_type(&self, resource_type: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|f| f.resource_type == resource_type);
        let excluded = self
            .exclude
            .iter()
            .any(|f| f.resource_type == resource_type && f.name.is_none());
        included && !excluded
    }

    /// Drop unselected types from the registry
    pub fn apply_types(&self, registry: &mut ExporterRegistry) -> Result<(), FilterError> {
        for filter in self.include.iter().chain(&self.exclude) {
            if registry.get(&filter.resource_type).is_none() {
                return Err(FilterError::UnknownResourceType(filter.resource_type.clone()));
            }
        }
        registry.retain(|t| self.includes_type(t));
        Ok(())
    }

    /// Whether an exclude filter drops this object
    pub fn excludes_object(&self, resource_type: &str, name: &str) -> bool {
        self.exclude
            .iter()
            .any(|f| f.resource_type == resource_type && f.matches_name(name))
    }

    /// Keep only the selected objects of one type
    pub fn filter_objects(&self, resource_type: &str, objects: ResourceIdMetaMap) -> ResourceIdMetaMap {
        let includes: Vec<&TypeFilter> = self
            .include
            .iter()
            .filter(|f| f.resource_type == resource_type)
            .collect();
        let excludes: Vec<&TypeFilter> = self
            .exclude
            .iter()
            .filter(|f| f.resource_type == resource_type && f.name.is_some())
            .collect();

        objects
            .into_iter()
            .filter(|(_, meta)| {
                (includes.is_empty() || includes.iter().any(|f| f.matches_name(&meta.name)))
                    && !excludes.iter().any(|f| f.matches_name(&meta.name))
            })
            .collect()
    }
}

/// Register `<type>.<attribute path>` exclusions on the named exporters
pub fn apply_excluded_attributes(
    registry: &mut ExporterRegistry,
    entries: &[String],
) -> Result<(), FilterError> {
    for entry in entries {
        let (resource_type, attribute) = entry
            .split_once('.')
            .filter(|(t, a)| !t.is_empty() && !a.is_empty())
            .ok_or_else(|| FilterError::InvalidExcludedAttribute(entry.clone()))?;

        let exporter = registry
            .get_mut(resource_type)
            .ok_or_else(|| FilterError::UnknownExcludedType(resource_type.to_string()))?;
        log::debug!("Excluding attribute {} on {} resources", attribute, resource_type);
        exporter.excluded_attributes.insert(attribute.to_string());
    }
    Ok(())
}
