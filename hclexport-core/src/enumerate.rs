//! Enumerate - Listing every live object of the registered types

use std::collections::BTreeMap;
use std::future::Future;

use log::{debug, error, info, warn};
use tokio::task::JoinSet;

use crate::provider::{ProviderError, ProviderResult};
use crate::registry::ExporterRegistry;
use crate::resource::ResourceIdMetaMap;

/// Default number of entities requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Fetch numbered pages, starting at 1, until a page comes back empty.
///
/// Page counts reported by the API are not trusted; only an empty page
/// ends the listing.
pub async fn paginate<T, F, Fut>(mut fetch_page: F) -> ProviderResult<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ProviderResult<Vec<T>>>,
{
    let mut all = Vec::new();
    let mut page_number = 1;
    loop {
        let page = fetch_page(page_number).await?;
        if page.is_empty() {
            break;
        }
        debug!("page {}: {} entities", page_number, page.len());
        all.extend(page);
        page_number += 1;
    }
    Ok(all)
}

/// Objects found per type, and the types that could not be listed
#[derive(Debug, Default)]
pub struct EnumerationReport {
    pub objects: BTreeMap<String, ResourceIdMetaMap>,
    pub failures: Vec<ProviderError>,
    /// Types skipped because the credentials may not list them
    pub permission_denied: Vec<ProviderError>,
}

impl EnumerationReport {
    pub fn object_count(&self) -> usize {
        self.objects.values().map(|m| m.len()).sum()
    }
}

/// How listing failures are handled
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerateOptions {
    /// Abort on the first failure
    pub fail_fast: bool,
    /// Log permission errors and skip the type, even with `fail_fast`
    pub log_permission_errors: bool,
}

/// List every registered type concurrently.
///
/// A failing type is reported and left out. With `fail_fast` the first
/// failure aborts the remaining listings and is returned instead.
pub async fn enumerate_all(
    registry: &ExporterRegistry,
    options: EnumerateOptions,
) -> ProviderResult<EnumerationReport> {
    let fail_fast = options.fail_fast;
    let mut tasks = JoinSet::new();
    for (resource_type, exporter) in registry.iter() {
        let resource_type = resource_type.to_string();
        let handler = exporter.handler.clone();
        tasks.spawn(async move {
            let result = handler.list().await.map_err(|e| match e.resource_type {
                Some(_) => e,
                None => e.for_type(resource_type.clone()),
            });
            (resource_type, result)
        });
    }

    let mut report = EnumerationReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (resource_type, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                let err = ProviderError::new("enumeration task failed").with_cause(e);
                if fail_fast {
                    tasks.abort_all();
                    return Err(err);
                }
                report.failures.push(err);
                continue;
            }
        };

        match result {
            Ok(objects) => {
                info!("Found {} {} resources", objects.len(), resource_type);
                report.objects.insert(resource_type, objects);
            }
            Err(e) if e.permission_denied && options.log_permission_errors => {
                error!("{}", e);
                warn!("Skipping {}: permission denied", resource_type);
                report.permission_denied.push(e);
            }
            Err(e) if fail_fast => {
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                warn!("Skipping {}: {}", resource_type, e);
                report.failures.push(e);
            }
        }
    }
    Ok(report)
}
