//! gRPC client facade over a running provider process.
//!
//! [`ProviderClient`] hides which protocol dialect was negotiated: the two
//! generated clients are wrapped behind a small wire trait, and everything
//! above it works with the schema and value model. Configuration and read
//! payloads travel msgpack-encoded against the implied type of the relevant
//! schema block, the same way a real core talks to providers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tracing::{debug, warn};

use crate::codec;
use crate::convert;
use crate::error::BridgeError;
use crate::proto::{tfplugin5, tfplugin6};
use crate::schema::{Diagnostic, Diagnostics, ProviderSchema};
use crate::value::Value;

/// Version string reported to providers during configure. Providers compare
/// it against the minimum core version they support, so it is pinned
/// comfortably high.
const TERRAFORM_VERSION: &str = "999.0.0";

/// Schema responses can get big; the transport default of 4MB is not enough
/// for the larger providers, so the decode limit is raised to 64MB.
const SCHEMA_MAX_RECV_BYTES: usize = 64 << 20;

/// The plugin protocol major version negotiated with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Protocol version 5.
    V5,
    /// Protocol version 6.
    V6,
}

impl Protocol {
    /// Map a negotiated version number to a protocol, if supported.
    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            5 => Some(Protocol::V5),
            6 => Some(Protocol::V6),
            _ => None,
        }
    }

    /// The wire version number.
    pub fn version(self) -> u32 {
        match self {
            Protocol::V5 => 5,
            Protocol::V6 => 6,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version())
    }
}

/// Raw result of a data source read, before state decoding.
struct RawRead {
    state_msgpack: Vec<u8>,
    state_json: Vec<u8>,
    diagnostics: Diagnostics,
}

/// The dialect-specific slice of the client: one implementation per
/// protocol version, each translating between byte payloads and its own
/// generated message types.
#[async_trait]
trait WireClient: Send + Sync {
    async fn get_schema(&self) -> Result<ProviderSchema, BridgeError>;

    async fn validate_provider_config(
        &self,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError>;

    async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError>;

    async fn configure(
        &self,
        terraform_version: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError>;

    async fn read_data_source(
        &self,
        type_name: &str,
        config: Vec<u8>,
        provider_meta: Option<Vec<u8>>,
    ) -> Result<RawRead, BridgeError>;

    async fn stop(&self) -> Result<(), BridgeError>;
}

struct WireV5 {
    client: tfplugin5::provider_client::ProviderClient<Channel>,
}

impl WireV5 {
    fn new(channel: Channel) -> Self {
        let client = tfplugin5::provider_client::ProviderClient::new(channel)
            .max_decoding_message_size(SCHEMA_MAX_RECV_BYTES);
        Self { client }
    }
}

#[async_trait]
impl WireClient for WireV5 {
    async fn get_schema(&self) -> Result<ProviderSchema, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .get_schema(tfplugin5::get_provider_schema::Request {})
            .await;
        match resp {
            Ok(resp) => convert::provider_schema_v5(resp.into_inner()),
            Err(status) => Ok(schema_fetch_failure(status)),
        }
    }

    async fn validate_provider_config(
        &self,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        // v5 folds validation into config preparation; the prepared config
        // it returns is not applied here.
        let resp = client
            .prepare_provider_config(tfplugin5::prepare_provider_config::Request {
                config: Some(msgpack_value_v5(config)),
            })
            .await?
            .into_inner();
        Ok(convert::diagnostics_v5(resp.diagnostics))
    }

    async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .validate_data_source_config(tfplugin5::validate_data_source_config::Request {
                type_name: type_name.to_string(),
                config: Some(msgpack_value_v5(config)),
            })
            .await?
            .into_inner();
        Ok(convert::diagnostics_v5(resp.diagnostics))
    }

    async fn configure(
        &self,
        terraform_version: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .configure(tfplugin5::configure::Request {
                terraform_version: terraform_version.to_string(),
                config: Some(msgpack_value_v5(config)),
            })
            .await?
            .into_inner();
        Ok(convert::diagnostics_v5(resp.diagnostics))
    }

    async fn read_data_source(
        &self,
        type_name: &str,
        config: Vec<u8>,
        provider_meta: Option<Vec<u8>>,
    ) -> Result<RawRead, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .read_data_source(tfplugin5::read_data_source::Request {
                type_name: type_name.to_string(),
                config: Some(msgpack_value_v5(config)),
                provider_meta: provider_meta.map(msgpack_value_v5),
            })
            .await?
            .into_inner();
        let (state_msgpack, state_json) = match resp.state {
            Some(state) => (state.msgpack, state.json),
            None => (Vec::new(), Vec::new()),
        };
        Ok(RawRead {
            state_msgpack,
            state_json,
            diagnostics: convert::diagnostics_v5(resp.diagnostics),
        })
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        let mut client = self.client.clone();
        let resp = client.stop(tfplugin5::stop::Request {}).await?.into_inner();
        if resp.error.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Stop(resp.error))
        }
    }
}

struct WireV6 {
    client: tfplugin6::provider_client::ProviderClient<Channel>,
}

impl WireV6 {
    fn new(channel: Channel) -> Self {
        let client = tfplugin6::provider_client::ProviderClient::new(channel)
            .max_decoding_message_size(SCHEMA_MAX_RECV_BYTES);
        Self { client }
    }
}

#[async_trait]
impl WireClient for WireV6 {
    async fn get_schema(&self) -> Result<ProviderSchema, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .get_provider_schema(tfplugin6::get_provider_schema::Request {})
            .await;
        match resp {
            Ok(resp) => convert::provider_schema_v6(resp.into_inner()),
            Err(status) => Ok(schema_fetch_failure(status)),
        }
    }

    async fn validate_provider_config(
        &self,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .validate_provider_config(tfplugin6::validate_provider_config::Request {
                config: Some(msgpack_value_v6(config)),
            })
            .await?
            .into_inner();
        Ok(convert::diagnostics_v6(resp.diagnostics))
    }

    async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .validate_data_resource_config(
                tfplugin6::validate_data_resource_config::Request {
                    type_name: type_name.to_string(),
                    config: Some(msgpack_value_v6(config)),
                },
            )
            .await?
            .into_inner();
        Ok(convert::diagnostics_v6(resp.diagnostics))
    }

    async fn configure(
        &self,
        terraform_version: &str,
        config: Vec<u8>,
    ) -> Result<Diagnostics, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .configure_provider(tfplugin6::configure_provider::Request {
                terraform_version: terraform_version.to_string(),
                config: Some(msgpack_value_v6(config)),
            })
            .await?
            .into_inner();
        Ok(convert::diagnostics_v6(resp.diagnostics))
    }

    async fn read_data_source(
        &self,
        type_name: &str,
        config: Vec<u8>,
        provider_meta: Option<Vec<u8>>,
    ) -> Result<RawRead, BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .read_data_source(tfplugin6::read_data_source::Request {
                type_name: type_name.to_string(),
                config: Some(msgpack_value_v6(config)),
                provider_meta: provider_meta.map(msgpack_value_v6),
            })
            .await?
            .into_inner();
        let (state_msgpack, state_json) = match resp.state {
            Some(state) => (state.msgpack, state.json),
            None => (Vec::new(), Vec::new()),
        };
        Ok(RawRead {
            state_msgpack,
            state_json,
            diagnostics: convert::diagnostics_v6(resp.diagnostics),
        })
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        let mut client = self.client.clone();
        let resp = client
            .stop_provider(tfplugin6::stop_provider::Request {})
            .await?
            .into_inner();
        if resp.error.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Stop(resp.error))
        }
    }
}

/// A transport failure on the schema fetch surfaces through the diagnostics
/// channel: one error entry and empty schema maps, the same shape an
/// error-reporting provider produces.
fn schema_fetch_failure(status: tonic::Status) -> ProviderSchema {
    let mut diagnostics = Diagnostics::new();
    diagnostics.push(Diagnostic::error(format!(
        "failed to fetch provider schema: {}",
        status
    )));
    ProviderSchema {
        diagnostics,
        ..ProviderSchema::default()
    }
}

fn msgpack_value_v5(bytes: Vec<u8>) -> tfplugin5::DynamicValue {
    tfplugin5::DynamicValue {
        msgpack: bytes,
        json: Vec::new(),
    }
}

fn msgpack_value_v6(bytes: Vec<u8>) -> tfplugin6::DynamicValue {
    tfplugin6::DynamicValue {
        msgpack: bytes,
        json: Vec::new(),
    }
}

/// Protocol-agnostic client for one provider process.
///
/// The schema is fetched once and reused; every other call serializes its
/// payload against the implied type of the matching schema block. All
/// methods take `&self`, so one client can be shared across tasks.
pub struct ProviderClient {
    protocol: Protocol,
    wire: Box<dyn WireClient>,
    schema: Mutex<Option<Arc<ProviderSchema>>>,
}

impl ProviderClient {
    /// Create a client speaking the given protocol over an open channel.
    pub fn new(channel: Channel, protocol: Protocol) -> Self {
        let wire: Box<dyn WireClient> = match protocol {
            Protocol::V5 => Box::new(WireV5::new(channel)),
            Protocol::V6 => Box::new(WireV6::new(channel)),
        };
        Self {
            protocol,
            wire,
            schema: Mutex::new(None),
        }
    }

    /// The protocol version this client negotiated.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Fetch the provider schema, reusing a previously fetched copy.
    ///
    /// A response carrying error diagnostics becomes a
    /// [`BridgeError::Diagnostics`] and is not cached, so a later call asks
    /// the provider again. Transport failures travel the same route: the
    /// wire layer folds them into a single error diagnostic with empty
    /// schema maps.
    pub async fn schema(&self) -> Result<Arc<ProviderSchema>, BridgeError> {
        let mut cached = self.schema.lock().await;
        if let Some(schema) = cached.as_ref() {
            return Ok(Arc::clone(schema));
        }

        debug!(protocol = %self.protocol, "fetching provider schema");
        let schema = self.wire.get_schema().await?;
        for diag in schema.diagnostics.warnings() {
            warn!(warning = %diag, "provider schema warning");
        }
        if schema.diagnostics.has_errors() {
            return Err(BridgeError::Diagnostics(schema.diagnostics));
        }

        let schema = Arc::new(schema);
        *cached = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Ask the provider to validate its own configuration.
    pub async fn validate_provider_config(
        &self,
        config: &Value,
    ) -> Result<Diagnostics, BridgeError> {
        let schema = self.schema().await?;
        let encoded = codec::encode_msgpack(config, &schema.provider.implied_type())?;
        self.wire.validate_provider_config(encoded).await
    }

    /// Ask the provider to validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Diagnostics, BridgeError> {
        let schema = self.schema().await?;
        let ty = schema.data_source(type_name)?.implied_type();
        let encoded = codec::encode_msgpack(config, &ty)?;
        self.wire
            .validate_data_source_config(type_name, encoded)
            .await
    }

    /// Configure the provider. Reads are only valid after this succeeds.
    ///
    /// Error diagnostics become an error; warnings are logged and dropped.
    pub async fn configure(&self, config: &Value) -> Result<(), BridgeError> {
        let schema = self.schema().await?;
        let encoded = codec::encode_msgpack(config, &schema.provider.implied_type())?;

        debug!(protocol = %self.protocol, "configuring provider");
        let diagnostics = self
            .wire
            .configure(TERRAFORM_VERSION, encoded)
            .await?
            .check()?;
        for diag in diagnostics.warnings() {
            warn!(warning = %diag, "provider configure warning");
        }
        Ok(())
    }

    /// Read a data source and decode the returned state.
    ///
    /// A provider with nothing to return reports a null state, which comes
    /// back as a typed null here; callers turn that into zero rows.
    pub async fn read_data_source(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Value, BridgeError> {
        let schema = self.schema().await?;
        let ty = schema.data_source(type_name)?.implied_type();
        let encoded = codec::encode_msgpack(config, &ty)?;

        // Providers that declare a metadata schema expect the field to be
        // present; a null of the declared type says "none supplied".
        let provider_meta = match &schema.provider_meta {
            Some(meta) => {
                let meta_ty = meta.implied_type();
                Some(codec::encode_msgpack(&Value::null_of(&meta_ty), &meta_ty)?)
            },
            None => None,
        };

        debug!(type_name, "reading data source");
        let read = self
            .wire
            .read_data_source(type_name, encoded, provider_meta)
            .await?;
        let diagnostics = read.diagnostics.check()?;
        for diag in diagnostics.warnings() {
            warn!(type_name, warning = %diag, "data source read warning");
        }

        codec::decode_wire(&read.state_msgpack, &read.state_json, &ty)
    }

    /// Ask the provider to shut down gracefully.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        debug!(protocol = %self.protocol, "stopping provider");
        self.wire.stop().await
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_versions() {
        assert_eq!(Protocol::from_version(5), Some(Protocol::V5));
        assert_eq!(Protocol::from_version(6), Some(Protocol::V6));
        assert_eq!(Protocol::from_version(4), None);
        assert_eq!(Protocol::V6.version(), 6);
        assert_eq!(Protocol::V5.to_string(), "5");
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails() {
        // A lazy channel defers connecting until the first call, which then
        // fails against a port nothing listens on.
        let channel = tonic::transport::Endpoint::from_static("http://127.0.0.1:1")
            .connect_lazy();
        let client = ProviderClient::new(channel, Protocol::V6);
        match client.schema().await {
            Err(BridgeError::Diagnostics(diags)) => {
                assert!(diags.has_errors());
                assert!(diags.to_string().contains("failed to fetch provider schema"));
            }
            other => panic!("expected a diagnostics error, got {:?}", other),
        }
    }
}
