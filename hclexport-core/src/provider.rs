//! Provider - Trait abstracting access to the live system
//!
//! A ResourceHandler lists and reads the objects of one resource type.
//! It is responsible for converting API payloads into flattened attributes.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Attributes, ResourceIdMetaMap, ResourceMeta};

/// Error type for listing and reading operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// The credentials may not access this resource type
    pub permission_denied: bool,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.resource_type, &self.resource_id) {
            (Some(t), Some(id)) => write!(f, "[{} {}] {}", t, id, self.message),
            (Some(t), None) => write!(f, "[{}] {}", t, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_type: None,
            resource_id: None,
            permission_denied: false,
            cause: None,
        }
    }

    pub fn permission_denied(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    pub fn for_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn for_resource(mut self, resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists and reads the live objects of one resource type
pub trait ResourceHandler: Send + Sync {
    /// Enumerate every live object of this type.
    ///
    /// Implementations page through the API until a page comes back empty
    /// and skip objects whose state is "deleted".
    fn list(&self) -> BoxFuture<'_, ProviderResult<ResourceIdMetaMap>>;

    /// Read one object into flattened attributes.
    ///
    /// Returns `None` if the object no longer exists.
    fn read(&self, id: &str, meta: &ResourceMeta) -> BoxFuture<'_, ProviderResult<Option<Attributes>>>;
}

impl<H: ResourceHandler + ?Sized> ResourceHandler for Box<H> {
    fn list(&self) -> BoxFuture<'_, ProviderResult<ResourceIdMetaMap>> {
        (**self).list()
    }

    fn read(&self, id: &str, meta: &ResourceMeta) -> BoxFuture<'_, ProviderResult<Option<Attributes>>> {
        (**self).read(id, meta)
    }
}
