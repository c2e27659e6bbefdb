//! Flatten/unflatten engine and script bridge for rowbridge.
//!
//! One input batch goes through these steps:
//!
//! 1. [`flatten`] expands nested struct columns into dotted-path leaves
//! 2. [`ResultsBuffer::start_row`] projects each row into a [`RowView`]
//! 3. a [`ScriptBridge`] mutates the view
//! 4. [`ResultsBuffer::finish_row`] records what the row emitted and which
//!    keys it changed
//! 5. [`ResultsBuffer::finish`] reuses unchanged input arrays, infers types
//!    for changed and new keys, rebuilds them and reassembles the structs
//!
//! [`ScriptTransform`] ties the steps together behind the
//! [`rb_traits::Transform`] trait; [`RhaiBridge`] is the bundled bridge.
//!
//! # Example
//!
//! ```rust,ignore
//! use rb_transform::{BridgeConfig, RhaiBridge, ScriptTransform};
//!
//! let bridge = RhaiBridge::new("record.x *= 2;", &BridgeConfig::default())?;
//! let transform = ScriptTransform::new(bridge, Arc::new(ExtensionRegistry::new()));
//! let output = transform.apply(batch)?;
//! ```

mod bridge;
mod build;
mod builtin;
mod config;
mod conversion;
mod flatten;
mod infer;
mod path;
mod results;
mod rhai_bridge;
mod row;
mod unflatten;
mod value;

pub use bridge::{ScriptBridge, ScriptTransform};
pub use build::build_array;
pub use config::BridgeConfig;
pub use flatten::{flatten, FlattenedColumn};
pub use infer::{infer_column, infer_field};
pub use path::FieldPath;
pub use results::ResultsBuffer;
pub use rhai_bridge::RhaiBridge;
pub use row::{Emission, Node, RowView, Sequence, Tree, SENTINEL_PREFIX};
pub use unflatten::{unflatten, OutputColumn};
pub use value::Value;
