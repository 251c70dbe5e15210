//! Host-facing connection facade.
//!
//! A [`BridgeConnection`] owns one launched provider process and exposes
//! the read-only table surface on top of it: data source listing, table
//! descriptors, and row reads with pushed-down equality filters. The
//! provider is configured lazily, once, before the first read.

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::client::{Protocol, ProviderClient};
use crate::codec;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::launcher::{self, PluginProcess};
use crate::quals::{self, Filters};
use crate::table::{self, Row, TableDescriptor};

/// One live provider connection serving tables.
///
/// Reads may run concurrently; the first one configures the provider and
/// the rest wait for that to finish. Dropping the connection kills the
/// provider process, but [`BridgeConnection::close`] does it cleanly and
/// reaps the child.
#[derive(Debug)]
pub struct BridgeConnection {
    client: ProviderClient,
    process: PluginProcess,
    provider_config: Option<JsonValue>,
    configured: Mutex<bool>,
}

impl BridgeConnection {
    /// Launch the provider named by `config` and connect to it.
    pub async fn connect(config: BridgeConfig) -> Result<Self, BridgeError> {
        let launched = launcher::launch(&config.provider).await?;
        debug!(
            provider = %config.provider,
            protocol = %launched.client.protocol(),
            "provider connection established"
        );
        Ok(BridgeConnection {
            client: launched.client,
            process: launched.process,
            provider_config: config.provider_config,
            configured: Mutex::new(false),
        })
    }

    /// The protocol version this connection negotiated.
    pub fn protocol(&self) -> Protocol {
        self.client.protocol()
    }

    /// The client, for callers that need the raw RPC surface.
    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// Names of the data sources the provider offers, sorted.
    pub async fn data_sources(&self) -> Result<Vec<String>, BridgeError> {
        let schema = self.client.schema().await?;
        Ok(schema.data_sources.keys().cloned().collect())
    }

    /// Derive the table shape for one data source.
    #[instrument(skip(self), name = "bridge.table_descriptor")]
    pub async fn table_descriptor(&self, name: &str) -> Result<TableDescriptor, BridgeError> {
        let schema = self.client.schema().await?;
        TableDescriptor::from_schema(name, schema.data_source(name)?)
    }

    /// Read a data source, calling `emit` for each result row.
    ///
    /// Filters must name key columns of the derived table. A data source
    /// read returns at most one state object, so `emit` is called at most
    /// once; a null state means the provider had nothing to return and
    /// `emit` is not called at all.
    #[instrument(skip(self, filters, emit), name = "bridge.list_rows")]
    pub async fn list_rows(
        &self,
        name: &str,
        filters: &Filters,
        mut emit: impl FnMut(Row),
    ) -> Result<(), BridgeError> {
        self.ensure_configured().await?;

        let schema = self.client.schema().await?;
        let data_source = schema.data_source(name)?;
        let descriptor = TableDescriptor::from_schema(name, data_source)?;
        let config = quals::build_read_config(data_source, filters)?;

        let state = self.client.read_data_source(name, &config).await?;
        if state.is_null() {
            debug!(data_source = name, "provider returned no state");
            return Ok(());
        }
        emit(table::build_row(&descriptor, &state)?);
        Ok(())
    }

    /// Configure the provider once, before the first read.
    ///
    /// The JSON configuration document is decoded against the provider's
    /// implied type, so an absent document still configures with a fully
    /// null value of the right shape.
    async fn ensure_configured(&self) -> Result<(), BridgeError> {
        let mut configured = self.configured.lock().await;
        if *configured {
            return Ok(());
        }

        let schema = self.client.schema().await?;
        let doc = match &self.provider_config {
            Some(doc) => doc.clone(),
            None => JsonValue::Object(serde_json::Map::new()),
        };
        let config = codec::decode_json_value(&doc, &schema.provider.implied_type())?;
        self.client.configure(&config).await?;
        *configured = true;
        Ok(())
    }

    /// Ask the provider to abandon in-flight work. Best effort.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        if let Err(e) = self.client.stop().await {
            warn!(error = %e, "provider stop reported an error");
            return Err(e);
        }
        Ok(())
    }

    /// Shut the provider process down and reap it. Idempotent.
    ///
    /// The exclusive borrow keeps shutdown out of the read path: in-flight
    /// reads borrow the connection and must drain before close can run. A
    /// shared connection (behind `Arc`) must be unwrapped first.
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        self.process.kill().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_fails_when_provider_exits() {
        let err = BridgeConnection::connect(BridgeConfig::new("exit 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Handshake(_)));
    }

    #[tokio::test]
    async fn test_connect_fails_on_malformed_handshake() {
        let err = BridgeConnection::connect(BridgeConfig::new("echo not-a-handshake"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Handshake(_)));
    }
}
