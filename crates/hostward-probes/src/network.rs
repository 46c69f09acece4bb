//! Network configuration.
//!
//! All probes read one snapshot; an unavailable snapshot resolves each of
//! them through its own failure policy.

use async_trait::async_trait;
use hostward_core::evidence::{ConnectionType, Evidence, NetworkFacts};
use hostward_core::{
    Category, Finding, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet, Result,
};

const LEGACY_PROTOCOLS: &[&str] = &["SSLv2", "SSLv3", "TLSv1", "TLSv1.0", "TLSv1.1"];
const MODERN_PROTOCOLS: &[&str] = &["TLSv1.2", "TLSv1.3"];
const UNSPECIFIED_RESOLVERS: &[&str] = &["0.0.0.0", "::", "[::]"];

/// Probe set for [`Category::Network`].
pub fn probe_set() -> Result<ProbeSet> {
    ProbeSet::builder(Category::Network)
        .probe(ModernTls)
        .probe(NoProxy)
        .probe(DnsResolvers)
        .probe(ConnectionPresent)
        .probe(VpnTunnel)
        .build()
}

async fn with_snapshot(
    ctx: &ProbeContext,
    descriptor: &ProbeDescriptor,
    rule: impl FnOnce(&NetworkFacts) -> Finding + Send,
) -> Finding {
    match ctx.sources().network.snapshot().await {
        Evidence::Known(facts) => rule(&facts),
        Evidence::Unknown(reason) => Finding::unresolved(descriptor.policy, &reason),
    }
}

static MODERN_TLS: ProbeDescriptor = ProbeDescriptor::critical("modern_tls", 0.30)
    .fail_open()
    .remediation("Disable SSLv3, TLS 1.0 and TLS 1.1 in the platform TLS configuration.");

/// Only TLS 1.2 or newer is negotiated.
pub struct ModernTls;

#[async_trait]
impl Probe for ModernTls {
    fn descriptor(&self) -> &ProbeDescriptor {
        &MODERN_TLS
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(with_snapshot(ctx, &MODERN_TLS, |facts| {
            if facts.tls_protocols.is_empty() {
                return Finding::unresolved(MODERN_TLS.policy, "no TLS protocol list");
            }
            let legacy: Vec<&str> = facts
                .tls_protocols
                .iter()
                .map(String::as_str)
                .filter(|p| LEGACY_PROTOCOLS.contains(p))
                .collect();
            let modern = facts
                .tls_protocols
                .iter()
                .any(|p| MODERN_PROTOCOLS.contains(&p.as_str()));
            let finding = if !legacy.is_empty() {
                Finding::fail(format!("legacy protocols enabled: {}", legacy.join(", ")))
            } else if modern {
                Finding::pass("only TLS 1.2+ enabled")
            } else {
                Finding::fail("no TLS 1.2+ protocol enabled")
            };
            finding.with_detail("protocols", facts.tls_protocols.join(","))
        })
        .await)
    }
}

static NO_PROXY: ProbeDescriptor = ProbeDescriptor::critical("no_proxy", 0.25)
    .remediation("Remove the configured proxy unless it is an approved inspection point.");

/// No proxy intercepts traffic.
pub struct NoProxy;

#[async_trait]
impl Probe for NoProxy {
    fn descriptor(&self) -> &ProbeDescriptor {
        &NO_PROXY
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(with_snapshot(ctx, &NO_PROXY, |facts| match &facts.proxy {
            None => Finding::pass("no proxy configured"),
            Some(proxy) => {
                Finding::fail(format!("proxy configured: {proxy}")).with_detail("proxy", proxy.clone())
            }
        })
        .await)
    }
}

static DNS_RESOLVERS: ProbeDescriptor = ProbeDescriptor::supplementary("dns_resolvers", 0.20)
    .fail_open()
    .remediation("Configure at least one explicit DNS resolver.");

/// DNS resolution is configured.
pub struct DnsResolvers;

#[async_trait]
impl Probe for DnsResolvers {
    fn descriptor(&self) -> &ProbeDescriptor {
        &DNS_RESOLVERS
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(with_snapshot(ctx, &DNS_RESOLVERS, |facts| {
            if facts.dns_servers.is_empty() {
                return Finding::fail("no DNS resolver configured");
            }
            if let Some(bad) = facts
                .dns_servers
                .iter()
                .find(|s| UNSPECIFIED_RESOLVERS.contains(&s.as_str()))
            {
                return Finding::fail(format!("unspecified resolver address {bad}"));
            }
            Finding::pass(format!("{} resolver(s) configured", facts.dns_servers.len()))
                .with_detail("resolvers", facts.dns_servers.join(","))
        })
        .await)
    }
}

static CONNECTION_PRESENT: ProbeDescriptor =
    ProbeDescriptor::supplementary("connection_present", 0.15)
        .fail_open()
        .remediation("Connect to a network so the remaining checks can be verified.");

/// An active network link exists.
pub struct ConnectionPresent;

#[async_trait]
impl Probe for ConnectionPresent {
    fn descriptor(&self) -> &ProbeDescriptor {
        &CONNECTION_PRESENT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(with_snapshot(ctx, &CONNECTION_PRESENT, |facts| {
            Finding::verdict(
                facts.connection_type != ConnectionType::None,
                format!("connection type {}", facts.connection_type),
            )
        })
        .await)
    }
}

static VPN_TUNNEL: ProbeDescriptor = ProbeDescriptor::supplementary("vpn_tunnel", 0.10)
    .fail_open()
    .remediation("Route traffic through a VPN on untrusted networks.");

/// Traffic leaves through a VPN tunnel.
pub struct VpnTunnel;

#[async_trait]
impl Probe for VpnTunnel {
    fn descriptor(&self) -> &ProbeDescriptor {
        &VPN_TUNNEL
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(with_snapshot(ctx, &VPN_TUNNEL, |facts| {
            if facts.vpn_active {
                Finding::pass("VPN tunnel active")
            } else {
                Finding::fail("no VPN tunnel")
            }
        })
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::testing::StaticSources;
    use hostward_core::{run_probe, Classification};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn facts() -> NetworkFacts {
        NetworkFacts {
            connection_type: ConnectionType::Wifi,
            vpn_active: false,
            proxy: None,
            dns_servers: vec!["1.1.1.1".into()],
            tls_protocols: vec!["TLSv1.2".into(), "TLSv1.3".into()],
        }
    }

    async fn score(facts: NetworkFacts) -> hostward_core::AssessmentResult {
        let set = probe_set().unwrap();
        let ctx = StaticSources::new().network(facts).context(Category::Network);
        let mut outcomes = Vec::new();
        for probe in set.probes() {
            outcomes.push(run_probe(probe.as_ref(), &ctx, TIMEOUT).await);
        }
        set.scorer().score(&outcomes)
    }

    #[tokio::test]
    async fn ordinary_wifi_without_vpn_passes() {
        let result = score(facts()).await;
        assert_eq!(result.score_percent, 90);
        assert_eq!(result.classification, Classification::Passed);
    }

    #[tokio::test]
    async fn legacy_tls_is_critical() {
        let mut f = facts();
        f.tls_protocols.push("TLSv1.1".into());
        let result = score(f).await;
        assert!(!result.outcome("modern_tls").unwrap().passed);
        assert_ne!(result.classification, Classification::Passed);
    }

    #[tokio::test]
    async fn proxy_fails() {
        let mut f = facts();
        f.proxy = Some("10.0.0.1:8080".into());
        let result = score(f).await;
        assert!(!result.outcome("no_proxy").unwrap().passed);
    }

    #[tokio::test]
    async fn missing_snapshot_uses_policies() {
        let ctx = StaticSources::new().context(Category::Network);
        let open = run_probe(&ModernTls, &ctx, TIMEOUT).await;
        let closed = run_probe(&NoProxy, &ctx, TIMEOUT).await;
        assert!(open.passed && open.assumed);
        assert!(!closed.passed && closed.assumed);
    }
}
