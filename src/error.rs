//! Error types for the Terraform provider table bridge.

use thiserror::Error;

use crate::schema::Diagnostics;

/// Errors that can occur while talking to a provider or deriving tables.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A gRPC transport error occurred (connect/channel failure).
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A gRPC call failed with a status code.
    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    /// The provider reported error-severity diagnostics.
    #[error("Provider error: {0}")]
    Diagnostics(Diagnostics),

    /// An attribute or block matched no classification. Internal invariant
    /// violation, never caused by user input.
    #[error("Schema classification defect: {0}")]
    SchemaDefect(String),

    /// A filter was supplied for a column whose attribute type cannot be
    /// used as an equality qualifier.
    #[error("Unsupported qualifier type {type_name} for column '{column}'")]
    UnsupportedQualifier {
        /// Column the filter was applied to.
        column: String,
        /// Rendered attribute type.
        type_name: String,
    },

    /// A wire payload or native value did not match its schema type.
    #[error("Value encoding error: {0}")]
    Encoding(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested data source is not present in the provider schema.
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    /// The plugin process did not complete the handshake.
    #[error("Plugin handshake failed: {0}")]
    Handshake(String),

    /// Spawning or managing the plugin process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A registry HTTP request failed.
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry returned an unusable response.
    #[error("Registry error: {0}")]
    Registry(String),

    /// The provider rejected a stop request.
    #[error("Provider stop failed: {0}")]
    Stop(String),
}

impl BridgeError {
    /// True when the error is fatal to the connection rather than to a
    /// single call.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Handshake(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Diagnostic;

    #[test]
    fn test_error_display() {
        let err = BridgeError::UnknownDataSource("dns_a_record_set".to_string());
        assert_eq!(format!("{}", err), "Unknown data source: dns_a_record_set");

        let err = BridgeError::SchemaDefect("attribute 'x' matches no class".to_string());
        assert_eq!(
            format!("{}", err),
            "Schema classification defect: attribute 'x' matches no class"
        );

        let err = BridgeError::Handshake("no handshake line".to_string());
        assert_eq!(format!("{}", err), "Plugin handshake failed: no handshake line");

        let err = BridgeError::Stop("still busy".to_string());
        assert_eq!(format!("{}", err), "Provider stop failed: still busy");
    }

    #[test]
    fn test_unsupported_qualifier_display() {
        let err = BridgeError::UnsupportedQualifier {
            column: "addrs".to_string(),
            type_name: "list(string)".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Unsupported qualifier type list(string) for column 'addrs'"
        );
    }

    #[test]
    fn test_diagnostics_display() {
        let diags = Diagnostics::from(vec![
            Diagnostic::error("Invalid provider configuration"),
            Diagnostic::warning("Deprecated attribute"),
        ]);
        let err = BridgeError::Diagnostics(diags);
        let rendered = format!("{}", err);
        assert!(rendered.starts_with("Provider error: "));
        assert!(rendered.contains("Invalid provider configuration"));
    }

    #[test]
    fn test_connection_fatal() {
        assert!(BridgeError::Handshake("x".to_string()).is_connection_fatal());
        assert!(!BridgeError::UnknownDataSource("x".to_string()).is_connection_fatal());
        assert!(!BridgeError::Encoding("x".to_string()).is_connection_fatal());
    }
}
