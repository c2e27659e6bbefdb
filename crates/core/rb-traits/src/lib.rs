//! Core traits for rowbridge.
//!
//! - [`Transform`] - turns one input batch into one output batch

mod transform;

pub use transform::{IdentityTransform, Transform};
