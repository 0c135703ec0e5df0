//! Listing helpers for the two pagination styles of the API

use hclexport_core::enumerate::{DEFAULT_PAGE_SIZE, paginate};
use hclexport_core::provider::{ProviderError, ProviderResult};
use log::debug;
use reqwest::Url;
use serde_json::Value as Json;

use crate::client::GenesysClient;

/// Take the `entities` array out of a listing response
pub fn entities(body: Option<Json>) -> Vec<Json> {
    match body {
        Some(Json::Object(mut response)) => match response.remove("entities") {
            Some(Json::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Whether an entity has been soft-deleted
pub fn is_deleted(entity: &Json) -> bool {
    entity
        .get("state")
        .and_then(Json::as_str)
        .is_some_and(|state| state.eq_ignore_ascii_case("deleted"))
}

/// List a `pageNumber`/`pageSize` endpoint until a page comes back empty
pub async fn list_pages(
    client: &GenesysClient,
    path: &str,
    query: &[(&str, String)],
) -> ProviderResult<Vec<Json>> {
    paginate(|page_number| async move {
        let mut params = query.to_vec();
        params.push(("pageSize", DEFAULT_PAGE_SIZE.to_string()));
        params.push(("pageNumber", page_number.to_string()));
        let body = client.get(path, &params).await?;
        Ok::<_, ProviderError>(entities(body))
    })
    .await
}

/// List a cursor endpoint, following `after` from each page's `nextUri`
pub async fn list_cursor(client: &GenesysClient, path: &str) -> ProviderResult<Vec<Json>> {
    let mut all = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let mut params = vec![("limit", DEFAULT_PAGE_SIZE.to_string())];
        if let Some(cursor) = &after {
            params.push(("after", cursor.clone()));
        }
        let body = client.get(path, &params).await?;
        let next = body
            .as_ref()
            .and_then(|b| b.get("nextUri"))
            .and_then(Json::as_str)
            .and_then(after_cursor);

        let page = entities(body);
        if page.is_empty() {
            break;
        }
        debug!("{}: {} entities", path, page.len());
        all.extend(page);

        match next {
            Some(cursor) if after.as_deref() != Some(cursor.as_str()) => after = Some(cursor),
            _ => break,
        }
    }
    Ok(all)
}

/// Extract the `after` query parameter from a (possibly relative) URI
fn after_cursor(uri: &str) -> Option<String> {
    let base = Url::parse("http://localhost").ok()?;
    let url = base.join(uri).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "after")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
