//! Resolving provider binaries from a registry.
//!
//! Providers are distributed through the Terraform registry protocol:
//! service discovery at `/.well-known/terraform.json` yields the
//! `providers.v1` base path, and
//! `BASE/NAMESPACE/TYPE/VERSION/download/OS/ARCH` yields the download URL
//! for the platform's archive. Fetching and unpacking the archive is left
//! to the embedding application; this module resolves addresses and URLs
//! and locates the provider binary in an unpacked directory.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::BridgeError;

/// Registry hostname assumed when an address has no explicit host.
const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";

/// Namespace assumed when an address has no explicit namespace.
const DEFAULT_NAMESPACE: &str = "hashicorp";

/// The default public registry's terms restrict it to Terraform itself, so
/// addresses pointing there are served from the OpenTofu registry instead.
const OPENTOFU_REGISTRY_HOST: &str = "registry.opentofu.org";

/// Registry coordinates of a provider: host, namespace and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAddress {
    /// Registry hostname serving the provider.
    pub hostname: String,
    /// Publisher namespace within the registry.
    pub namespace: String,
    /// Provider type name, the last address segment.
    pub provider_type: String,
}

impl ProviderAddress {
    /// Parse a provider source address.
    ///
    /// Accepts `TYPE`, `NAMESPACE/TYPE` and `HOST/NAMESPACE/TYPE`; missing
    /// segments fall back to the public registry and the `hashicorp`
    /// namespace.
    pub fn parse(source: &str) -> Result<Self, BridgeError> {
        let parts: Vec<&str> = source.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(BridgeError::Registry(format!(
                "invalid provider source {:?}: empty segment",
                source
            )));
        }
        let (hostname, namespace, provider_type) = match parts.as_slice() {
            [ty] => (DEFAULT_REGISTRY_HOST, DEFAULT_NAMESPACE, *ty),
            [ns, ty] => (DEFAULT_REGISTRY_HOST, *ns, *ty),
            [host, ns, ty] => (*host, *ns, *ty),
            _ => {
                return Err(BridgeError::Registry(format!(
                    "invalid provider source {:?}: too many segments",
                    source
                )));
            },
        };
        for (label, part) in [("namespace", namespace), ("type", provider_type)] {
            let valid = part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(BridgeError::Registry(format!(
                    "invalid {} {:?} in provider source {:?}",
                    label, part, source
                )));
            }
        }
        Ok(ProviderAddress {
            hostname: hostname.to_string(),
            namespace: namespace.to_string(),
            provider_type: provider_type.to_string(),
        })
    }

    /// The address as users usually write it: the hostname is omitted when
    /// it is the default registry.
    pub fn for_display(&self) -> String {
        if self.hostname == DEFAULT_REGISTRY_HOST {
            format!("{}/{}", self.namespace, self.provider_type)
        } else {
            self.to_string()
        }
    }

    /// The hostname discovery should actually talk to.
    fn effective_hostname(&self) -> &str {
        if self.hostname == DEFAULT_REGISTRY_HOST {
            OPENTOFU_REGISTRY_HOST
        } else {
            &self.hostname
        }
    }
}

impl fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.hostname, self.namespace, self.provider_type
        )
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDoc {
    #[serde(rename = "providers.v1")]
    providers_v1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionDoc {
    download_url: String,
}

/// Resolve the download URL for a provider version on the current platform.
///
/// Runs registry service discovery, then asks the providers service for the
/// platform-specific download metadata. A 404 from the metadata endpoint
/// means the provider or version does not exist for this OS and
/// architecture.
pub async fn resolve_download_url(
    address: &ProviderAddress,
    version: &str,
) -> Result<Url, BridgeError> {
    let hostname = address.effective_hostname();
    if hostname != address.hostname {
        info!(
            requested = %address.hostname,
            using = hostname,
            "redirecting to the OpenTofu registry"
        );
    }

    let client = reqwest::Client::new();
    let providers_base = discover_providers_base(&client, hostname).await?;
    let (os, arch) = go_platform();
    let metadata_url = version_metadata_url(&providers_base, address, version, os, arch)?;

    debug!(url = %metadata_url, "fetching provider version metadata");
    let resp = client.get(metadata_url.clone()).send().await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(BridgeError::Registry(format!(
            "provider {} version {} does not exist for {}/{}",
            address.for_display(),
            version,
            os,
            arch
        )));
    }
    if !resp.status().is_success() {
        return Err(BridgeError::Registry(format!(
            "version metadata request for {} returned status {}",
            address.for_display(),
            resp.status()
        )));
    }
    let doc: VersionDoc = resp.json().await?;

    // The download URL may be relative to the metadata document.
    let download_url = metadata_url.join(&doc.download_url).map_err(|e| {
        BridgeError::Registry(format!("invalid download URL {:?}: {}", doc.download_url, e))
    })?;
    info!(url = %download_url, "resolved provider download");
    Ok(download_url)
}

/// Service discovery: the `providers.v1` base URL for a registry host.
async fn discover_providers_base(
    client: &reqwest::Client,
    hostname: &str,
) -> Result<Url, BridgeError> {
    let discovery_url = Url::parse(&format!("https://{}/.well-known/terraform.json", hostname))
        .map_err(|e| {
            BridgeError::Registry(format!("invalid registry hostname {:?}: {}", hostname, e))
        })?;

    debug!(url = %discovery_url, "running registry service discovery");
    let resp = client.get(discovery_url.clone()).send().await?;
    if !resp.status().is_success() {
        return Err(BridgeError::Registry(format!(
            "service discovery at {} returned status {}",
            discovery_url,
            resp.status()
        )));
    }
    let doc: DiscoveryDoc = resp.json().await?;
    let path = doc.providers_v1.ok_or_else(|| {
        BridgeError::Registry(format!(
            "registry {} does not offer the providers.v1 service",
            hostname
        ))
    })?;
    discovery_url.join(&path).map_err(|e| {
        BridgeError::Registry(format!("invalid providers.v1 path {:?}: {}", path, e))
    })
}

fn version_metadata_url(
    providers_base: &Url,
    address: &ProviderAddress,
    version: &str,
    os: &str,
    arch: &str,
) -> Result<Url, BridgeError> {
    let mut base = providers_base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let location = format!(
        "{}{}/{}/{}/download/{}/{}",
        base, address.namespace, address.provider_type, version, os, arch
    );
    Url::parse(&location)
        .map_err(|e| BridgeError::Registry(format!("invalid metadata URL {:?}: {}", location, e)))
}

/// The running platform in Go toolchain naming, which is what registries
/// key downloads by.
fn go_platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    (os, arch)
}

/// Locate the provider binary in an unpacked artifact directory.
///
/// Archives carry extra files next to the binary (README, LICENSE, and the
/// like), so the first regular file named `terraform-provider-TYPE`,
/// optionally continued by `.` or `_`, wins. Entries are scanned in name
/// order.
pub fn find_provider_binary(
    dir: &Path,
    address: &ProviderAddress,
) -> Result<PathBuf, BridgeError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    for path in paths {
        // Follows symlinks, as an unpacked archive may use them.
        let metadata = std::fs::metadata(&path)?;
        if metadata.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if is_provider_binary(name, &address.provider_type) {
            return Ok(path);
        }
    }
    Err(BridgeError::Registry(format!(
        "no provider binary for {} found in {}",
        address.for_display(),
        dir.display()
    )))
}

fn is_provider_binary(file_name: &str, provider_type: &str) -> bool {
    let expected = format!("terraform-provider-{}", provider_type);
    match file_name.strip_prefix(expected.as_str()) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with('_'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_defaults() {
        let address = ProviderAddress::parse("dns").unwrap();
        assert_eq!(
            address,
            ProviderAddress {
                hostname: "registry.terraform.io".to_string(),
                namespace: "hashicorp".to_string(),
                provider_type: "dns".to_string(),
            }
        );

        let address = ProviderAddress::parse("integrations/github").unwrap();
        assert_eq!(address.hostname, "registry.terraform.io");
        assert_eq!(address.namespace, "integrations");
        assert_eq!(address.provider_type, "github");

        let address = ProviderAddress::parse("tf.example.com/awesomecorp/happycloud").unwrap();
        assert_eq!(address.hostname, "tf.example.com");
        assert_eq!(address.namespace, "awesomecorp");
        assert_eq!(address.provider_type, "happycloud");
    }

    #[test]
    fn test_parse_address_rejections() {
        assert!(ProviderAddress::parse("a/b/c/d").is_err());
        assert!(ProviderAddress::parse("").is_err());
        assert!(ProviderAddress::parse("hashicorp//dns").is_err());
        assert!(ProviderAddress::parse("ns/has space").is_err());
    }

    #[test]
    fn test_display_forms() {
        let address = ProviderAddress::parse("integrations/github").unwrap();
        assert_eq!(address.for_display(), "integrations/github");
        assert_eq!(
            address.to_string(),
            "registry.terraform.io/integrations/github"
        );

        let address = ProviderAddress::parse("tf.example.com/corp/cloud").unwrap();
        assert_eq!(address.for_display(), "tf.example.com/corp/cloud");
    }

    #[test]
    fn test_default_host_redirects_to_opentofu() {
        let address = ProviderAddress::parse("hashicorp/dns").unwrap();
        assert_eq!(address.effective_hostname(), "registry.opentofu.org");

        let address = ProviderAddress::parse("tf.example.com/corp/cloud").unwrap();
        assert_eq!(address.effective_hostname(), "tf.example.com");
    }

    #[test]
    fn test_version_metadata_url() {
        let base = Url::parse("https://registry.opentofu.org/v1/providers/").unwrap();
        let address = ProviderAddress::parse("hashicorp/dns").unwrap();
        let url = version_metadata_url(&base, &address, "3.4.1", "linux", "amd64").unwrap();
        assert_eq!(
            url.as_str(),
            "https://registry.opentofu.org/v1/providers/hashicorp/dns/3.4.1/download/linux/amd64"
        );

        // A base without the trailing slash resolves the same way.
        let base = Url::parse("https://registry.opentofu.org/v1/providers").unwrap();
        let url = version_metadata_url(&base, &address, "3.4.1", "linux", "amd64").unwrap();
        assert!(url.as_str().ends_with("/v1/providers/hashicorp/dns/3.4.1/download/linux/amd64"));
    }

    #[test]
    fn test_discovery_document_parsing() {
        let doc: DiscoveryDoc =
            serde_json::from_str(r#"{"providers.v1": "/v1/providers/", "login.v1": {}}"#).unwrap();
        assert_eq!(doc.providers_v1.as_deref(), Some("/v1/providers/"));

        let doc: DiscoveryDoc = serde_json::from_str(r#"{"modules.v1": "/v1/modules/"}"#).unwrap();
        assert!(doc.providers_v1.is_none());
    }

    #[test]
    fn test_is_provider_binary() {
        assert!(is_provider_binary("terraform-provider-dns", "dns"));
        assert!(is_provider_binary("terraform-provider-dns_v3.4.1", "dns"));
        assert!(is_provider_binary("terraform-provider-dns.exe", "dns"));
        assert!(!is_provider_binary("terraform-provider-dnsutils", "dns"));
        assert!(!is_provider_binary("terraform-provider-aws", "dns"));
        assert!(!is_provider_binary("README.md", "dns"));
    }

    #[test]
    fn test_find_provider_binary_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LICENSE"), "license text").unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        std::fs::write(dir.path().join("terraform-provider-dns_v3.4.1"), "binary").unwrap();

        let address = ProviderAddress::parse("hashicorp/dns").unwrap();
        let path = find_provider_binary(dir.path(), &address).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("terraform-provider-dns_v3.4.1")
        );

        let other = ProviderAddress::parse("hashicorp/aws").unwrap();
        let err = find_provider_binary(dir.path(), &other).unwrap_err();
        assert!(err.to_string().contains("hashicorp/aws"));
    }
}
