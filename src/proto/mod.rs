//! Generated plugin protocol types for both supported wire versions.
//!
//! The `tfplugin5` and `tfplugin6` modules are compiled from the .proto
//! definitions under `proto/` and committed, so building the crate does not
//! require protoc. Regenerate with `cargo build --features regenerate-proto`
//! after editing the definitions.

pub mod tfplugin5;
pub mod tfplugin6;
