//! hclexport State
//!
//! Terraform state for exported resources, so the generated configuration
//! can be adopted without importing each resource by hand.
//!
//! # Example
//!
//! ```ignore
//! use hclexport_state::{LocalBackend, StateBackend, StateFile};
//!
//! let backend = LocalBackend::with_path("out/terraform.tfstate".into());
//! let mut state = StateFile::from_exported(&result.resources, "mypurecloud/genesyscloud");
//! if let Some(previous) = backend.read_state().await? {
//!     state.continue_lineage(&previous);
//! }
//! backend.write_state(&state).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::LocalBackend;
pub use state::{InstanceState, ResourceState, StateFile};
