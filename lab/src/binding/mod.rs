//! Binding reconciliation and loading.
//!
//! - [`reconcile`] - shape bindings into the payload each backend expects
//! - [`loader`] - build the initial bindings of a case for an execution context

pub mod loader;
pub mod reconcile;

pub use loader::load_bindings;
pub use reconcile::{reconcile_buckets, reconcile_flat, reconcile_to_save, BindingBuckets};
