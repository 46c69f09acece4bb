//! Ordered, named probe collections.

use std::sync::Arc;

use crate::category::Category;
use crate::error::Result;
use crate::probe::{Probe, ProbeDescriptor};
use crate::scoring::{ScorePolicy, Scorer};

/// Probes for one category, validated against their scorer.
#[derive(Clone)]
pub struct ProbeSet {
    category: Category,
    probes: Vec<Arc<dyn Probe>>,
    scorer: Scorer,
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSet")
            .field("category", &self.category)
            .field("probes", &self.names())
            .finish_non_exhaustive()
    }
}

impl ProbeSet {
    /// Start building a set for `category` with its compile-time policy.
    #[must_use]
    pub fn builder(category: Category) -> ProbeSetBuilder {
        ProbeSetBuilder {
            category,
            policy: category.policy(),
            probes: Vec::new(),
        }
    }

    /// Category.
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Probes in declared order.
    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    /// Probe names in declared order.
    pub fn names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.descriptor().name).collect()
    }

    /// Scorer validated for this set.
    pub const fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Number of probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Always false for a built set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Group probe indices into execution lanes.
    ///
    /// Lanes run concurrently; probes inside a lane run in declared order.
    /// Probes sharing a resource always share a lane. With `concurrent`
    /// off, everything runs in one lane.
    #[must_use]
    pub fn lanes(&self, concurrent: bool) -> Vec<Vec<usize>> {
        if !concurrent {
            return vec![(0..self.probes.len()).collect()];
        }

        let mut lanes: Vec<Vec<usize>> = Vec::new();
        let mut resource_lanes: Vec<(&'static str, usize)> = Vec::new();
        for (index, probe) in self.probes.iter().enumerate() {
            match probe.descriptor().resource {
                Some(resource) => {
                    if let Some(&(_, lane)) = resource_lanes.iter().find(|(r, _)| *r == resource) {
                        lanes[lane].push(index);
                    } else {
                        resource_lanes.push((resource, lanes.len()));
                        lanes.push(vec![index]);
                    }
                }
                None => lanes.push(vec![index]),
            }
        }
        lanes
    }
}

/// Builder for [`ProbeSet`].
pub struct ProbeSetBuilder {
    category: Category,
    policy: ScorePolicy,
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeSetBuilder {
    /// Append a probe.
    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Append a shared probe.
    #[must_use]
    pub fn shared(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Override the thresholds.
    #[must_use]
    pub const fn policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ProbeSet> {
        let descriptors: Vec<ProbeDescriptor> =
            self.probes.iter().map(|p| p.descriptor().clone()).collect();
        let scorer = Scorer::new(self.category, self.policy, descriptors)?;
        Ok(ProbeSet {
            category: self.category,
            probes: self.probes,
            scorer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProbeContext;
    use crate::error::{ConfigError, ProbeError};
    use crate::probe::Finding;
    use async_trait::async_trait;

    struct Stub(ProbeDescriptor);

    #[async_trait]
    impl Probe for Stub {
        fn descriptor(&self) -> &ProbeDescriptor {
            &self.0
        }

        async fn evaluate(&self, _ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
            Ok(Finding::pass("stub"))
        }
    }

    fn set() -> ProbeSet {
        ProbeSet::builder(Category::Tee)
            .probe(Stub(ProbeDescriptor::critical("keystore", 0.4).resource("keystore")))
            .probe(Stub(ProbeDescriptor::critical("device", 0.25)))
            .probe(Stub(ProbeDescriptor::supplementary("strongbox", 0.2).resource("keystore")))
            .probe(Stub(ProbeDescriptor::supplementary("attest", 0.15)))
            .build()
            .unwrap()
    }

    #[test]
    fn shared_resources_share_a_lane() {
        let lanes = set().lanes(true);
        assert_eq!(lanes, vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[test]
    fn sequential_is_one_lane() {
        assert_eq!(set().lanes(false), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn build_rejects_duplicates() {
        let err = ProbeSet::builder(Category::Tee)
            .probe(Stub(ProbeDescriptor::critical("same", 0.5)))
            .probe(Stub(ProbeDescriptor::critical("same", 0.5)))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProbe { .. }));
    }

    #[test]
    fn build_rejects_empty() {
        assert!(matches!(
            ProbeSet::builder(Category::Network).build(),
            Err(ConfigError::EmptyProbeSet { .. })
        ));
    }
}
