//! Export - Run an export from enumeration to resolved resources
//!
//! An export runs in strict phases. Every type is enumerated and labeled
//! before any object is read, and every read has finished (with vanished
//! objects pruned) before references are resolved. The registry is only
//! mutated between phases.
//!
//! With dependency resolution, objects that the selection references but
//! the filters left out are listed, labeled and read in further rounds
//! until no new reference turns up. Only then is anything resolved.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::dependency::DependencyGraph;
use crate::emitter::FormatConfig;
use crate::enumerate::{EnumerateOptions, enumerate_all};
use crate::filter::{FilterError, ResourceFilter, apply_excluded_attributes};
use crate::provider::ProviderError;
use crate::registry::ExporterRegistry;
use crate::resolver::{Resolver, ResolverConfig, UnresolvedReference};
use crate::resource::{Attributes, ExportedResource, ResourceAddress, ResourceIdMetaMap};
use crate::sanitizer::Sanitizer;

/// Output syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Hcl,
    Json,
    /// Both HCL and JSON
    HclJson,
}

impl ExportFormat {
    pub fn writes_hcl(self) -> bool {
        matches!(self, ExportFormat::Hcl | ExportFormat::HclJson)
    }

    pub fn writes_json(self) -> bool {
        matches!(self, ExportFormat::Json | ExportFormat::HclJson)
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// `<type>` or `<type>::<name regex>`; empty means every type
    pub resource_types: Vec<String>,
    /// `<type>` or `<type>::<name regex>`
    pub exclude_resource_types: Vec<String>,
    /// `<type>.<attribute path>`
    pub exclude_attributes: Vec<String>,
    pub format: ExportFormat,
    pub include_state_file: bool,
    /// Write one file per resource type
    pub split_files_by_resource: bool,
    /// Write `depends_on` lists from resolved references
    pub depends_on: bool,
    /// Skip failing types instead of aborting the run
    pub continue_on_error: bool,
    /// Log permission errors and skip the type instead of failing
    pub log_permission_errors: bool,
    /// Also export objects referenced by the selected ones
    pub enable_dependency_resolution: bool,
    /// Only warn about reference cycles
    pub ignore_cyclic_deps: bool,
    /// Keep raw IDs of references that cannot be resolved
    pub keep_unresolved: bool,
    pub format_options: FormatConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            resource_types: Vec::new(),
            exclude_resource_types: Vec::new(),
            exclude_attributes: Vec::new(),
            format: ExportFormat::default(),
            include_state_file: false,
            split_files_by_resource: false,
            depends_on: false,
            continue_on_error: true,
            log_permission_errors: false,
            enable_dependency_resolution: false,
            ignore_cyclic_deps: true,
            keep_unresolved: true,
            format_options: FormatConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("No resource types selected for export")]
    NothingSelected,

    #[error("Reference cycle: {0}")]
    CyclicDependency(String),
}

/// Result of an export run
#[derive(Debug, Default)]
pub struct ExportResult {
    pub resources: Vec<ExportedResource>,
    /// Types that failed to list or read
    pub failures: Vec<ProviderError>,
    /// Types skipped for lack of permissions
    pub permission_denied: Vec<ProviderError>,
    pub unresolved: Vec<(ResourceAddress, UnresolvedReference)>,
    /// Objects that vanished between listing and reading
    pub vanished: usize,
    /// Objects exported only because a selected resource references them
    pub dependencies: usize,
    pub graph: DependencyGraph,
}

impl ExportResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

type ObjectKey = (String, String);
type Reads = BTreeMap<ObjectKey, Attributes>;
type ReadOutcome = (String, String, Result<Option<Attributes>, ProviderError>);

/// Outcome of reading one set of objects
#[derive(Default)]
struct ReadBatch {
    reads: Reads,
    vanished: Vec<ObjectKey>,
    failed_types: BTreeSet<String>,
}

/// Objects selected for export, and everything listed so far
#[derive(Default)]
struct Selection {
    /// Type -> objects being exported
    selected: BTreeMap<String, ResourceIdMetaMap>,
    /// Type -> every object the listing returned
    listed: BTreeMap<String, ResourceIdMetaMap>,
    /// Types that failed and are left out
    dropped: BTreeSet<String>,
}

/// Runs one export against a registry
pub struct Exporter {
    registry: ExporterRegistry,
    config: ExportConfig,
    sanitizer: Sanitizer,
}

impl Exporter {
    pub fn new(registry: ExporterRegistry) -> Self {
        Self {
            registry,
            config: ExportConfig::default(),
            sanitizer: Sanitizer::default(),
        }
    }

    pub fn with_config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    fn enumerate_options(&self) -> EnumerateOptions {
        EnumerateOptions {
            fail_fast: !self.config.continue_on_error,
            log_permission_errors: self.config.log_permission_errors,
        }
    }

    pub async fn run(mut self) -> Result<ExportResult, ExportError> {
        let filter = ResourceFilter::new(
            &self.config.resource_types,
            &self.config.exclude_resource_types,
        )?;
        // Unfiltered registry that referenced objects are drawn from
        let mut pool = self
            .config
            .enable_dependency_resolution
            .then(|| self.registry.clone());
        filter.apply_types(&mut self.registry)?;
        apply_excluded_attributes(&mut self.registry, &self.config.exclude_attributes)?;
        if self.registry.is_empty() {
            return Err(ExportError::NothingSelected);
        }
        if let Some(pool) = pool.as_mut() {
            apply_excluded_attributes(pool, &self.config.exclude_attributes)?;
        }

        let mut result = ExportResult::default();
        let mut selection = Selection::default();

        info!("Enumerating {} resource types", self.registry.len());
        let report = enumerate_all(&self.registry, self.enumerate_options()).await?;
        result.failures.extend(report.failures);
        result.permission_denied.extend(report.permission_denied);
        selection.dropped = self
            .registry
            .resource_types()
            .filter(|t| !report.objects.contains_key(*t))
            .map(str::to_string)
            .collect();
        for (resource_type, objects) in report.objects {
            if pool.is_some() {
                selection.listed.insert(resource_type.clone(), objects.clone());
            }
            let objects = filter.filter_objects(&resource_type, objects);
            self.label(&resource_type, &objects);
            selection.selected.insert(resource_type, objects);
        }

        let targets: Vec<ObjectKey> = self
            .registry
            .iter()
            .flat_map(|(t, e)| e.sanitized.keys().map(move |id| (t.to_string(), id.clone())))
            .collect();
        let batch = self.read_objects(targets, &mut result).await?;
        let mut reads = Reads::new();
        self.apply_batch(batch, &mut reads, &mut selection, &mut result);

        if let Some(pool) = &pool {
            self.add_dependencies(pool, &filter, &mut selection, &mut reads, &mut result)
                .await?;
        }
        reads.retain(|(t, id), _| self.registry.sanitized_label(t, id).is_some());

        info!("Resolving references for {} resources", reads.len());
        let resolver = Resolver::new(&self.registry).with_config(ResolverConfig {
            keep_unresolved: self.config.keep_unresolved,
        });
        for ((resource_type, id), raw) in reads {
            let Some(exporter) = self.registry.get(&resource_type) else {
                continue;
            };
            let Some(labeled) = exporter.sanitized.get(&id) else {
                continue;
            };
            let address = ResourceAddress::new(&resource_type, &labeled.label);

            if let Some(schema) = &exporter.schema
                && let Err(errors) = schema.validate(&raw)
            {
                for error in errors {
                    warn!("{}: {}", address, error);
                }
            }

            let resolution = resolver.resolve(exporter, &raw);
            for unresolved in resolution.unresolved {
                debug!(
                    "{}: {} {} not exported ({:?})",
                    address, unresolved.path, unresolved.id, unresolved.action
                );
                result.unresolved.push((address.clone(), unresolved));
            }
            for target in &resolution.references {
                result.graph.add_edge(address.clone(), target.clone());
            }

            result.resources.push(ExportedResource {
                id: labeled.meta.state_id(&id),
                address,
                raw,
                attributes: resolution.attributes,
                depends_on: resolution.references,
                json_encoded: exporter.json_encode_attributes.clone(),
            });
        }

        if !result.unresolved.is_empty() {
            warn!(
                "{} references point at resources that are not exported",
                result.unresolved.len()
            );
        }
        if let Some(cycle) = result.graph.find_cycle() {
            let names: Vec<String> = cycle.iter().map(|a| a.to_string()).collect();
            if !self.config.ignore_cyclic_deps {
                return Err(ExportError::CyclicDependency(names.join(" -> ")));
            }
            warn!("Reference cycle: {}", names.join(" -> "));
        }
        info!("Exported {} resources", result.resources.len());
        Ok(result)
    }

    /// Assign labels to the objects of one type
    fn label(&mut self, resource_type: &str, objects: &ResourceIdMetaMap) {
        let sanitized = self.sanitizer.sanitize(objects);
        if let Some(exporter) = self.registry.get_mut(resource_type) {
            exporter.sanitized = sanitized;
        }
    }

    /// Export referenced objects outside the selection until no reference
    /// leads to a new one. Labels are reassigned before anything resolves.
    async fn add_dependencies(
        &mut self,
        pool: &ExporterRegistry,
        filter: &ResourceFilter,
        selection: &mut Selection,
        reads: &mut Reads,
        result: &mut ExportResult,
    ) -> Result<(), ExportError> {
        let mut attempted: BTreeSet<ObjectKey> = reads.keys().cloned().collect();
        let mut pending: Vec<ObjectKey> = reads.keys().cloned().collect();

        while !pending.is_empty() {
            let missing = self.missing_references(pool, &pending, reads, &attempted, selection);
            if missing.is_empty() {
                break;
            }

            let mut unlisted = ExporterRegistry::new();
            for resource_type in missing.keys() {
                if !selection.listed.contains_key(resource_type)
                    && let Some(exporter) = pool.get(resource_type)
                {
                    unlisted.register(resource_type.clone(), exporter.clone());
                }
            }
            if !unlisted.is_empty() {
                let report = enumerate_all(&unlisted, self.enumerate_options()).await?;
                result.failures.extend(report.failures);
                result.permission_denied.extend(report.permission_denied);
                for resource_type in unlisted.resource_types() {
                    if !report.objects.contains_key(resource_type) {
                        selection.dropped.insert(resource_type.to_string());
                    }
                }
                selection.listed.extend(report.objects);
            }

            let mut targets = Vec::new();
            for (resource_type, ids) in missing {
                let Some(listed) = selection.listed.get(&resource_type) else {
                    continue;
                };
                let mut found = Vec::new();
                for id in ids {
                    attempted.insert((resource_type.clone(), id.clone()));
                    match listed.get(&id) {
                        Some(meta) if !filter.excludes_object(&resource_type, &meta.name) => {
                            found.push((id, meta.clone()));
                        }
                        _ => {}
                    }
                }
                if found.is_empty() {
                    continue;
                }

                if self.registry.get(&resource_type).is_none()
                    && let Some(exporter) = pool.get(&resource_type)
                {
                    self.registry.register(resource_type.clone(), exporter.clone());
                }
                info!("Adding {} referenced {} resources", found.len(), resource_type);
                result.dependencies += found.len();
                let objects = selection.selected.entry(resource_type.clone()).or_default();
                for (id, meta) in found {
                    targets.push((resource_type.clone(), id.clone()));
                    objects.insert(id, meta);
                }
                let objects = objects.clone();
                self.label(&resource_type, &objects);
            }

            let batch = self.read_objects(targets, result).await?;
            pending = batch.reads.keys().cloned().collect();
            self.apply_batch(batch, reads, selection, result);
        }
        Ok(())
    }

    /// Unresolved references of `pending` objects that another registered
    /// type could satisfy
    fn missing_references(
        &self,
        pool: &ExporterRegistry,
        pending: &[ObjectKey],
        reads: &Reads,
        attempted: &BTreeSet<ObjectKey>,
        selection: &Selection,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let resolver = Resolver::new(&self.registry);
        let mut missing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in pending {
            if self.registry.sanitized_label(&key.0, &key.1).is_none() {
                continue;
            }
            let (Some(exporter), Some(raw)) = (self.registry.get(&key.0), reads.get(key)) else {
                continue;
            };
            for unresolved in resolver.resolve(exporter, raw).unresolved {
                let target = (unresolved.target_type, unresolved.id);
                if pool.get(&target.0).is_none()
                    || selection.dropped.contains(&target.0)
                    || attempted.contains(&target)
                {
                    continue;
                }
                missing.entry(target.0).or_default().insert(target.1);
            }
        }
        missing
    }

    /// Fold a batch into the reads. Vanished objects are pruned from the
    /// sanitized maps; a type with a failed read is dropped entirely.
    fn apply_batch(
        &mut self,
        batch: ReadBatch,
        reads: &mut Reads,
        selection: &mut Selection,
        result: &mut ExportResult,
    ) {
        result.vanished += batch.vanished.len();
        for (resource_type, id) in batch.vanished {
            if let Some(exporter) = self.registry.get_mut(&resource_type) {
                exporter.sanitized.remove(&id);
            }
            if let Some(objects) = selection.selected.get_mut(&resource_type) {
                objects.remove(&id);
            }
        }
        for resource_type in batch.failed_types {
            if let Some(exporter) = self.registry.get_mut(&resource_type) {
                exporter.sanitized.clear();
            }
            selection.selected.remove(&resource_type);
            selection.dropped.insert(resource_type);
        }
        reads.extend(batch.reads);
    }

    /// Read the given objects concurrently
    async fn read_objects(
        &self,
        targets: Vec<ObjectKey>,
        result: &mut ExportResult,
    ) -> Result<ReadBatch, ExportError> {
        let mut tasks: JoinSet<ReadOutcome> = JoinSet::new();
        for (resource_type, id) in targets {
            let Some(exporter) = self.registry.get(&resource_type) else {
                continue;
            };
            let Some(labeled) = exporter.sanitized.get(&id) else {
                continue;
            };
            let handler = exporter.handler.clone();
            let meta = labeled.meta.clone();
            tasks.spawn(async move {
                let read = handler.read(&id, &meta).await;
                (resource_type, id, read)
            });
        }

        let mut batch = ReadBatch::default();
        while let Some(joined) = tasks.join_next().await {
            let (resource_type, id, read) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let err = ProviderError::new("read task failed").with_cause(e);
                    if !self.config.continue_on_error {
                        tasks.abort_all();
                        return Err(err.into());
                    }
                    result.failures.push(err);
                    continue;
                }
            };

            match read {
                Ok(Some(attributes)) => {
                    batch.reads.insert((resource_type, id), attributes);
                }
                Ok(None) => {
                    debug!("{} {} no longer exists", resource_type, id);
                    batch.vanished.push((resource_type, id));
                }
                Err(e) => {
                    let err = match e.resource_id {
                        Some(_) => e,
                        None => e.for_resource(resource_type.clone(), id),
                    };
                    if err.permission_denied && self.config.log_permission_errors {
                        error!("{}", err);
                        warn!("Skipping {}: permission denied", resource_type);
                        batch.failed_types.insert(resource_type);
                        result.permission_denied.push(err);
                        continue;
                    }
                    if !self.config.continue_on_error {
                        tasks.abort_all();
                        return Err(err.into());
                    }
                    warn!("Skipping {}: {}", resource_type, err);
                    batch.failed_types.insert(resource_type);
                    result.failures.push(err);
                }
            }
        }
        Ok(batch)
    }
}
