//! Terraform Provider Table Bridge
//!
//! This crate launches Terraform providers as plugin subprocesses and
//! exposes their data sources as read-only relational tables. It follows
//! the patterns established by
//! [terraform-plugin-go](https://github.com/hashicorp/terraform-plugin-go)
//! on the protocol side.
//!
//! # Overview
//!
//! The bridge provides:
//!
//! - **Protocol Buffers types**: Pre-compiled Rust types for protocol
//!   versions 5 and 6 of the provider plugin protocol
//! - **Plugin launcher**: Spawns a provider binary, performs the stdout
//!   handshake and connects a gRPC channel
//! - **Protocol-agnostic client**: One client interface dispatching to the
//!   negotiated protocol version's wire format
//! - **Schema model**: Blocks, attributes and nested blocks with
//!   required/optional/read-only classification
//! - **Typed value codec**: Schema-guided msgpack and JSON encoding of
//!   configuration and state values
//! - **Table derivation**: Column and key-column lists derived from data
//!   source schemas, plus row construction from read results
//! - **Registry resolution**: Provider address parsing and download URL
//!   discovery via the registry protocol
//! - **Logging**: Integration with `tracing` for structured logging,
//!   including forwarded provider output
//!
//! # Quick Start
//!
//! ```ignore
//! use tfbridge::{BridgeConfig, BridgeConnection, Filters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tfbridge::init_logging();
//!
//!     let config = BridgeConfig::new("./terraform-provider-dns");
//!     let mut conn = BridgeConnection::connect(config).await?;
//!
//!     for name in conn.data_sources().await? {
//!         println!("table: {}", name);
//!     }
//!
//!     let descriptor = conn.table_descriptor("dns_a_record_set").await?;
//!     println!("{} columns", descriptor.columns.len());
//!
//!     let mut filters = Filters::new();
//!     filters.insert("host".to_string(), "example.com".into());
//!     conn.list_rows("dns_a_record_set", &filters, |row| {
//!         println!("{:?}", row);
//!     })
//!     .await?;
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! A provider started by the launcher announces its endpoint with a single
//! line on stdout:
//!
//! ```text
//! 1|6|tcp|127.0.0.1:10042|grpc
//! ```
//!
//! Format: `CORE-VERSION|PROTOCOL-VERSION|NETWORK|ADDRESS|PROTOCOL`. The
//! bridge requires core version 1, a TCP address and gRPC, and accepts
//! protocol versions 5 and 6.
//!
//! # Provider Protocol
//!
//! The bridge consumes the read-only slice of the provider protocol:
//!
//! - **GetSchema**: Returns the provider, provider-meta, resource and data
//!   source schemas with capability flags
//! - **ValidateProviderConfig / ValidateDataSourceConfig**: Validates
//!   candidate configurations, diagnostics only
//! - **Configure**: Configures the provider, once per connection before
//!   the first read
//! - **ReadDataSource**: Reads one data source state object
//! - **Stop**: Asks the provider to abandon in-flight work
//!
//! Resource CRUD, plan/apply and state upgrade RPCs are out of scope: the
//! bridge never mutates infrastructure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod client;
pub mod codec;
pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod quals;
pub mod schema;
pub mod table;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod proto;

// Re-export main types at crate root
pub use bridge::BridgeConnection;
pub use client::{Protocol, ProviderClient};
pub use config::BridgeConfig;
pub use download::ProviderAddress;
pub use error::BridgeError;
pub use launcher::{launch, LaunchedProvider, PluginProcess};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use quals::{Filters, QualValue};
pub use schema::{Diagnostic, Diagnostics, ProviderSchema};
pub use table::{Column, ColumnType, ColumnValue, KeyColumn, Row, TableDescriptor};
pub use value::{Type, Value};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
