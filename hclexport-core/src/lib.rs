//! hclexport Core
//!
//! Engine for exporting live resources as Terraform configuration:
//! enumeration, label sanitization, reference resolution and emission.

pub mod dependency;
pub mod emitter;
pub mod enumerate;
pub mod export;
pub mod filter;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod sanitizer;
pub mod schema;
