//! Network configuration from sysfs, resolv.conf, the environment and the
//! system OpenSSL configuration.

use async_trait::async_trait;
use hostward_core::evidence::{ConnectionType, Evidence, NetworkEvidence, NetworkFacts};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::commands::execute;
use crate::files::io_reason;

/// Protocol versions in negotiation order.
const PROTOCOLS: &[&str] = &["SSLv3", "TLSv1", "TLSv1.1", "TLSv1.2", "TLSv1.3"];

/// Proxy variables, most specific first.
const PROXY_VARS: &[&str] = &[
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

const OPENSSL_CONFS: &[&str] = &["/etc/ssl/openssl.cnf", "/etc/pki/tls/openssl.cnf"];

/// [`NetworkEvidence`] for Linux and Android hosts.
#[derive(Debug, Clone)]
pub struct HostNetwork {
    net_class: PathBuf,
    resolv_conf: PathBuf,
    openssl_confs: Vec<PathBuf>,
    timeout: Duration,
}

impl HostNetwork {
    /// Standard locations; `timeout` bounds the `openssl version` query.
    pub fn new(timeout: Duration) -> Self {
        let mut openssl_confs: Vec<PathBuf> =
            std::env::var_os("OPENSSL_CONF").map(PathBuf::from).into_iter().collect();
        openssl_confs.extend(OPENSSL_CONFS.iter().map(PathBuf::from));
        Self {
            net_class: PathBuf::from("/sys/class/net"),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            openssl_confs,
            timeout,
        }
    }

    /// Read interfaces and resolvers from other locations.
    #[must_use]
    pub fn with_roots(mut self, net_class: impl Into<PathBuf>, resolv_conf: impl Into<PathBuf>) -> Self {
        self.net_class = net_class.into();
        self.resolv_conf = resolv_conf.into();
        self
    }

    async fn interfaces(&self) -> Result<Vec<(String, String)>, String> {
        let mut dir = tokio::fs::read_dir(&self.net_class)
            .await
            .map_err(|e| format!("{}: {}", self.net_class.display(), io_reason(&e)))?;
        let mut interfaces = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" {
                continue;
            }
            let state = tokio::fs::read_to_string(entry.path().join("operstate"))
                .await
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| String::from("unknown"));
            interfaces.push((name, state));
        }
        interfaces.sort();
        Ok(interfaces)
    }

    async fn tls_protocols(&self) -> Vec<String> {
        for path in &self.openssl_confs {
            if let Ok(text) = tokio::fs::read_to_string(path).await {
                if let Some(min) = min_protocol(&text) {
                    debug!(path = %path.display(), min = %min, "TLS floor from OpenSSL config");
                    return protocols_from(&min);
                }
            }
        }
        match execute(&["openssl", "version"], self.timeout).await.into_evidence() {
            Evidence::Known(version) => openssl_defaults(&version),
            Evidence::Unknown(reason) => {
                debug!(%reason, "could not determine TLS protocols");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl NetworkEvidence for HostNetwork {
    async fn snapshot(&self) -> Evidence<NetworkFacts> {
        let interfaces = match self.interfaces().await {
            Ok(interfaces) => interfaces,
            Err(reason) => return Evidence::Unknown(reason),
        };

        let vpn_active = interfaces
            .iter()
            .any(|(name, state)| is_tunnel(name) && state != "down");
        let connection_type = interfaces
            .iter()
            .filter(|(name, state)| !is_tunnel(name) && state == "up")
            .map(|(name, _)| classify(name))
            .next()
            .unwrap_or(ConnectionType::None);

        Evidence::Known(NetworkFacts {
            connection_type,
            vpn_active,
            proxy: proxy_from_env(),
            dns_servers: read_resolvers(&self.resolv_conf).await,
            tls_protocols: self.tls_protocols().await,
        })
    }
}

fn is_tunnel(name: &str) -> bool {
    ["tun", "tap", "wg", "ppp", "ipsec", "utun", "vpn"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn classify(name: &str) -> ConnectionType {
    if name.starts_with("wl") {
        ConnectionType::Wifi
    } else if name.starts_with("eth") || name.starts_with("en") {
        ConnectionType::Ethernet
    } else if ["rmnet", "wwan", "ccmni", "ww"].iter().any(|p| name.starts_with(p)) {
        ConnectionType::Cellular
    } else {
        ConnectionType::Other
    }
}

fn proxy_from_env() -> Option<String> {
    PROXY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

async fn read_resolvers(path: &Path) -> Vec<String> {
    tokio::fs::read_to_string(path)
        .await
        .map(|text| parse_resolv_conf(&text))
        .unwrap_or_default()
}

fn parse_resolv_conf(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => Some(addr.to_string()),
                _ => None,
            }
        })
        .collect()
}

fn min_protocol(conf: &str) -> Option<String> {
    conf.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("MinProtocol"))
        .map(|(_, value)| value.trim().to_string())
}

fn protocols_from(min: &str) -> Vec<String> {
    PROTOCOLS
        .iter()
        .position(|p| p.eq_ignore_ascii_case(min))
        .map(|start| PROTOCOLS[start..].iter().map(|p| (*p).to_string()).collect())
        .unwrap_or_default()
}

/// Built-in floor of an OpenSSL release (`OpenSSL 3.0.13 30 Jan 2024`).
///
/// 3.x only permits TLS 1.2+ at the default security level.
fn openssl_defaults(version: &str) -> Vec<String> {
    let mut words = version.split_whitespace();
    if words.next() != Some("OpenSSL") {
        return Vec::new();
    }
    match words.next().and_then(|v| v.split('.').next()) {
        Some("1") => protocols_from("TLSv1"),
        Some(major) if major.parse::<u32>().is_ok_and(|m| m >= 3) => protocols_from("TLSv1.2"),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolv_conf_parsing() {
        let text = "# generated\nsearch lan\nnameserver 127.0.0.53\nnameserver ::1\noptions edns0\n";
        assert_eq!(parse_resolv_conf(text), vec!["127.0.0.53", "::1"]);
    }

    #[test]
    fn openssl_floor() {
        let conf = "[system_default_sect]\nMinProtocol = TLSv1.2\nCipherString = DEFAULT@SECLEVEL=2\n";
        assert_eq!(min_protocol(conf).as_deref(), Some("TLSv1.2"));
        assert_eq!(protocols_from("TLSv1.2"), vec!["TLSv1.2", "TLSv1.3"]);
        assert_eq!(openssl_defaults("OpenSSL 3.0.13 30 Jan 2024"), vec!["TLSv1.2", "TLSv1.3"]);
        assert_eq!(openssl_defaults("OpenSSL 1.1.1w  11 Sep 2023").len(), 4);
        assert!(openssl_defaults("LibreSSL 3.3.6").is_empty());
    }

    #[test]
    fn interface_classes() {
        assert_eq!(classify("wlan0"), ConnectionType::Wifi);
        assert_eq!(classify("enp3s0"), ConnectionType::Ethernet);
        assert_eq!(classify("rmnet_data0"), ConnectionType::Cellular);
        assert!(is_tunnel("wg0"));
        assert!(!is_tunnel("eth0"));
    }

    #[tokio::test]
    async fn snapshot_from_fixture_tree() {
        let root = tempfile::tempdir().unwrap();
        let net = root.path().join("net");
        for (iface, state) in [("lo", "unknown"), ("eth0", "up"), ("wg0", "unknown")] {
            std::fs::create_dir_all(net.join(iface)).unwrap();
            std::fs::write(net.join(iface).join("operstate"), state).unwrap();
        }
        let resolv = root.path().join("resolv.conf");
        std::fs::write(&resolv, "nameserver 9.9.9.9\n").unwrap();

        let facts = HostNetwork::new(Duration::from_secs(2))
            .with_roots(&net, &resolv)
            .snapshot()
            .await
            .known()
            .unwrap();
        assert_eq!(facts.connection_type, ConnectionType::Ethernet);
        assert!(facts.vpn_active);
        assert_eq!(facts.dns_servers, vec!["9.9.9.9"]);
    }

    #[tokio::test]
    async fn missing_sysfs_is_unknown() {
        let snapshot = HostNetwork::new(Duration::from_secs(1))
            .with_roots("/nonexistent/net", "/nonexistent/resolv.conf")
            .snapshot()
            .await;
        assert!(!snapshot.is_known());
    }
}
