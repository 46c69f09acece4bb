//! Ordered acquisition strategies for one fact.
//!
//! A chain lists every way a probe knows to obtain a fact. Privileged,
//! ground-truth strategies are tried before strategies that infer the
//! fact from public metadata; within a class the declared order holds.
//! The first known answer wins. The conservative default is not a
//! strategy: when the chain is exhausted the consuming probe applies its
//! own [`crate::FailurePolicy`].

use futures_util::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use tracing::debug;

use super::Evidence;

/// How a strategy obtains its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Acquisition {
    /// Direct read of a privileged interface (kernel node, hardware)
    Direct,
    /// Inference from public metadata (build tags, versions, tools)
    Inferred,
}

/// A strategy that did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Strategy name
    pub strategy: &'static str,
    /// Strategy class
    pub acquisition: Acquisition,
    /// Why it gave up
    pub reason: String,
}

/// Outcome of resolving a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<T> {
    /// The fact being resolved
    pub fact: &'static str,
    /// Final answer
    pub evidence: Evidence<T>,
    /// Strategy that answered, if any
    pub answered_by: Option<&'static str>,
    /// Strategies tried before the answer (or all of them on exhaustion)
    pub attempts: Vec<Attempt>,
}

impl<T> Resolution<T> {
    /// Short provenance note, e.g. `"via sysfs"` or `"after 2 fallbacks via getprop"`.
    #[must_use]
    pub fn provenance(&self) -> String {
        match (self.answered_by, self.attempts.len()) {
            (Some(name), 0) => format!("via {name}"),
            (Some(name), 1) => format!("via {name} after 1 fallback"),
            (Some(name), n) => format!("via {name} after {n} fallbacks"),
            (None, _) => String::from("no strategy answered"),
        }
    }
}

struct Strategy<'a, T> {
    name: &'static str,
    acquisition: Acquisition,
    run: BoxFuture<'a, Evidence<T>>,
}

/// Builder and resolver for an ordered strategy list.
pub struct FallbackChain<'a, T> {
    fact: &'static str,
    strategies: Vec<Strategy<'a, T>>,
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    /// Start a chain for `fact`.
    #[must_use]
    pub const fn new(fact: &'static str) -> Self {
        Self {
            fact,
            strategies: Vec::new(),
        }
    }

    /// Add a ground-truth strategy.
    #[must_use]
    pub fn direct<F>(self, name: &'static str, run: F) -> Self
    where
        F: Future<Output = Evidence<T>> + Send + 'a,
    {
        self.push(name, Acquisition::Direct, run)
    }

    /// Add a metadata-inference strategy.
    #[must_use]
    pub fn inferred<F>(self, name: &'static str, run: F) -> Self
    where
        F: Future<Output = Evidence<T>> + Send + 'a,
    {
        self.push(name, Acquisition::Inferred, run)
    }

    fn push<F>(mut self, name: &'static str, acquisition: Acquisition, run: F) -> Self
    where
        F: Future<Output = Evidence<T>> + Send + 'a,
    {
        self.strategies.push(Strategy {
            name,
            acquisition,
            run: Box::pin(run),
        });
        self
    }

    /// Strategy names in the order they will be tried.
    #[must_use]
    pub fn plan(&self) -> Vec<&'static str> {
        let mut ordered: Vec<_> = self
            .strategies
            .iter()
            .map(|s| (s.acquisition, s.name))
            .collect();
        ordered.sort_by_key(|(acq, _)| *acq);
        ordered.into_iter().map(|(_, name)| name).collect()
    }

    /// Try each strategy until one answers.
    pub async fn resolve(self) -> Resolution<T> {
        let fact = self.fact;
        let mut strategies = self.strategies;
        // Stable: declared order survives within a class.
        strategies.sort_by_key(|s| s.acquisition);

        let mut attempts = Vec::new();
        for strategy in strategies {
            match strategy.run.await {
                Evidence::Known(value) => {
                    debug!(fact, strategy = strategy.name, "fact resolved");
                    return Resolution {
                        fact,
                        evidence: Evidence::Known(value),
                        answered_by: Some(strategy.name),
                        attempts,
                    };
                }
                Evidence::Unknown(reason) => {
                    debug!(fact, strategy = strategy.name, %reason, "strategy exhausted");
                    attempts.push(Attempt {
                        strategy: strategy.name,
                        acquisition: strategy.acquisition,
                        reason,
                    });
                }
            }
        }

        let reason = if attempts.is_empty() {
            String::from("no acquisition strategy")
        } else {
            attempts
                .iter()
                .map(|a| format!("{}: {}", a.strategy, a.reason))
                .collect::<Vec<_>>()
                .join("; ")
        };

        Resolution {
            fact,
            evidence: Evidence::Unknown(reason),
            answered_by: None,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn direct_strategies_run_before_inferred() {
        let chain = FallbackChain::new("enforcing")
            .inferred("build-prop", async { Evidence::Known(false) })
            .direct("sysfs", async { Evidence::unknown("permission denied") })
            .direct("getenforce", async { Evidence::Known(true) });

        assert_eq!(chain.plan(), vec!["sysfs", "getenforce", "build-prop"]);

        let resolved = chain.resolve().await;
        assert_eq!(resolved.evidence, Evidence::Known(true));
        assert_eq!(resolved.answered_by, Some("getenforce"));
        assert_eq!(resolved.attempts.len(), 1);
        assert_eq!(resolved.provenance(), "via getenforce after 1 fallback");
    }

    #[tokio::test]
    async fn later_strategies_are_not_polled_after_an_answer() {
        let polled = AtomicUsize::new(0);
        let chain = FallbackChain::new("locked")
            .direct("prop", async { Evidence::Known(true) })
            .inferred("tool", async {
                polled.fetch_add(1, Ordering::SeqCst);
                Evidence::Known(false)
            });

        let resolved = chain.resolve().await;
        assert_eq!(resolved.evidence, Evidence::Known(true));
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhaustion_joins_reasons() {
        let resolved: Resolution<bool> = FallbackChain::new("tee")
            .direct("dev-node", async { Evidence::unknown("absent") })
            .inferred("prop", async { Evidence::unknown("permission denied") })
            .resolve()
            .await;

        assert_eq!(
            resolved.evidence.reason(),
            Some("dev-node: absent; prop: permission denied")
        );
        assert!(resolved.answered_by.is_none());
    }

    #[test]
    fn empty_chain_is_unknown() {
        let resolved: Resolution<bool> =
            tokio_test::block_on(FallbackChain::new("nothing").resolve());
        assert_eq!(resolved.evidence.reason(), Some("no acquisition strategy"));
    }
}
