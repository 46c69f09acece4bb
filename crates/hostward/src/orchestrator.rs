//! Category runs: scheduling, budgets, cancellation and progressive state.

use futures_util::future::join_all;
use futures_util::{FutureExt, StreamExt};
use hostward_core::evidence::EvidenceSources;
use hostward_core::{
    run_probe, AssessmentResult, AssessmentState, Category, ConfigError, Denylist, Phase,
    ProbeContext, ProbeOutcome, ProbeSet, Progress, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::config::AssessmentConfig;
use crate::stream::AssessmentStream;

/// Reason recorded on probes still running when the caller cancels.
pub const CANCELLED: &str = "cancelled";

/// Reason recorded on probes still running when the category budget ends.
pub const BUDGET_EXHAUSTED: &str = "category budget exhausted";

const ABORTED: &str = "assessment aborted";

/// Runs probe sets against one set of evidence sources.
pub struct Orchestrator {
    sources: EvidenceSources,
    denylist: Arc<Denylist>,
    config: AssessmentConfig,
    sets: BTreeMap<Category, ProbeSet>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("denylist", &self.denylist.version())
            .field("config", &self.config)
            .field("categories", &self.sets.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start building an orchestrator.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Orchestrator over the local host with the embedded denylist.
    pub fn for_host() -> Result<Self> {
        Self::builder().build()
    }

    /// Configuration in force.
    pub const fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Denylist the tooling probes match against.
    pub const fn denylist(&self) -> &Arc<Denylist> {
        &self.denylist
    }

    /// Registered probe set for `category`.
    pub fn probe_set(&self, category: Category) -> Result<&ProbeSet> {
        self.sets
            .get(&category)
            .ok_or_else(|| ConfigError::MissingProbeSet(category.to_string()))
    }

    /// Stream the assessment of one category. Nothing runs until first poll.
    pub fn assess(&self, category: Category) -> Result<AssessmentStream> {
        let run = CategoryRun {
            set: self.probe_set(category)?.clone(),
            sources: self.sources.clone(),
            config: self.config.clone(),
        };
        let (states_tx, states_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Ok(AssessmentStream::new(
            category,
            run.execute(states_tx, cancel_rx).boxed(),
            states_rx,
            cancel_tx,
        ))
    }

    /// Drain one category's stream and return its final result.
    pub async fn assess_to_completion(&self, category: Category) -> Result<AssessmentResult> {
        let mut stream = self.assess(category)?;
        let mut last = None;
        while let Some(state) = stream.next().await {
            last = Some(state);
        }
        if let Some(result) = last.and_then(AssessmentState::into_result) {
            return Ok(result);
        }

        warn!(%category, "assessment ended without a terminal state");
        let set = self.probe_set(category)?;
        let outcomes: Vec<ProbeOutcome> = set
            .probes()
            .iter()
            .map(|p| ProbeOutcome::interrupted(p.descriptor(), ABORTED))
            .collect();
        Ok(set.scorer().score(&outcomes))
    }

    /// Assess every category concurrently; results in [`Category::ALL`] order.
    pub async fn assess_all(&self) -> Result<Vec<AssessmentResult>> {
        self.assess_many(&Category::ALL).await
    }

    /// Assess the given categories concurrently; results in argument order.
    pub async fn assess_many(&self, categories: &[Category]) -> Result<Vec<AssessmentResult>> {
        join_all(categories.iter().map(|&c| self.assess_to_completion(c)))
            .await
            .into_iter()
            .collect()
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    sources: Option<EvidenceSources>,
    denylist: Option<Arc<Denylist>>,
    config: AssessmentConfig,
    sets: Vec<ProbeSet>,
}

impl OrchestratorBuilder {
    /// Evidence sources (default: the local host).
    #[must_use]
    pub fn sources(mut self, sources: EvidenceSources) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Signature denylist (default: the embedded list).
    #[must_use]
    pub fn denylist(mut self, denylist: Arc<Denylist>) -> Self {
        self.denylist = Some(denylist);
        self
    }

    /// Scheduling configuration.
    #[must_use]
    pub fn config(mut self, config: AssessmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard probe set of `set.category()`.
    #[must_use]
    pub fn probe_set(mut self, set: ProbeSet) -> Self {
        self.sets.push(set);
        self
    }

    /// Validate everything and register a probe set for every category.
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let denylist = match self.denylist {
            Some(denylist) => denylist,
            None => Arc::new(hostward_probes::denylist::embedded()?),
        };

        let mut sets = BTreeMap::new();
        for set in self.sets {
            let category = set.category();
            if sets.insert(category, set).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "probe set for `{category}` registered twice"
                )));
            }
        }
        let options = self.config.probe_options();
        for category in Category::ALL {
            if !sets.contains_key(&category) {
                sets.insert(
                    category,
                    hostward_probes::probe_set(category, &denylist, &options)?,
                );
            }
        }

        let sources = self
            .sources
            .unwrap_or_else(|| hostward_host::host_sources(self.config.command_timeout()));
        debug!(
            denylist = denylist.version(),
            sets = sets.len(),
            "orchestrator ready"
        );
        Ok(Orchestrator {
            sources,
            denylist,
            config: self.config,
            sets,
        })
    }
}

/// Everything one category run owns.
struct CategoryRun {
    set: ProbeSet,
    sources: EvidenceSources,
    config: AssessmentConfig,
}

enum Event {
    Outcome(usize, ProbeOutcome),
    Stage(Progress),
    Finished,
    Interrupted(&'static str),
}

impl CategoryRun {
    #[instrument(skip_all, fields(category = %self.set.category()))]
    async fn execute(
        self,
        states: mpsc::UnboundedSender<AssessmentState>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let category = self.set.category();
        let total = self.set.len();
        let pacing = self.config.pacing();
        let budget = self.config.category_budget();
        // A probe still running when the budget ends is interrupted by the
        // category deadline, not by its own timeout.
        let probe_timeout = self.config.probe_timeout().min(budget);

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let ctx = ProbeContext::new(self.sources.clone(), category)
            .with_command_timeout(self.config.command_timeout())
            .with_progress(progress_tx);

        info!(probes = total, "assessment started");
        let mut gathered = Gathered::new(category, total, states);
        gathered.emit();

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let probes = self.set.probes();
        let lanes = self.set.lanes(self.config.concurrent);
        debug!(lanes = lanes.len(), "scheduled");
        let mut work = Box::pin(join_all(lanes.into_iter().map(|lane| {
            let done = done_tx.clone();
            let ctx = &ctx;
            async move {
                for index in lane {
                    let outcome = run_probe(probes[index].as_ref(), ctx, probe_timeout).await;
                    // Receiver outlives the lanes.
                    let _ = done.send((index, outcome));
                }
            }
        })));
        drop(done_tx);

        let deadline = tokio::time::sleep(budget);
        tokio::pin!(deadline);

        let mut finished = false;
        let interruption = loop {
            if finished {
                break None;
            }
            let event = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => Event::Interrupted(CANCELLED),
                () = &mut deadline => Event::Interrupted(BUDGET_EXHAUSTED),
                Some((index, outcome)) = done_rx.recv() => Event::Outcome(index, outcome),
                Some(progress) = progress_rx.recv() => Event::Stage(progress),
                _ = &mut work => Event::Finished,
            };
            match event {
                Event::Outcome(index, outcome) => {
                    gathered.record(&self.set, index, outcome);
                    gathered.emit();
                }
                Event::Stage(progress) => {
                    gathered.stage(&progress);
                    gathered.emit();
                }
                Event::Finished => break None,
                Event::Interrupted(reason) => break Some(reason),
            }
            if pacing.is_zero() {
                continue;
            }
            // Lanes keep running while emissions are paced.
            let pause = tokio::time::sleep(pacing);
            tokio::pin!(pause);
            let paced = loop {
                tokio::select! {
                    biased;
                    () = cancelled(&mut cancel) => break Some(CANCELLED),
                    () = &mut deadline => break Some(BUDGET_EXHAUSTED),
                    () = &mut pause => break None,
                    _ = &mut work => {
                        finished = true;
                        break None;
                    }
                }
            };
            if paced.is_some() {
                break paced;
            }
        };

        // Dropping the lanes abandons in-flight probes; their keys are
        // still in the ledger.
        drop(work);

        // Lanes that finished within one poll leave their events queued.
        let emit_rest = interruption.is_none();
        while let Ok(progress) = progress_rx.try_recv() {
            if emit_rest {
                gathered.stage(&progress);
                gathered.emit();
            }
        }
        while let Ok((index, outcome)) = done_rx.try_recv() {
            gathered.record(&self.set, index, outcome);
            if emit_rest {
                gathered.emit();
            }
        }
        let swept = ctx.keys().sweep().await;
        if swept > 0 {
            debug!(swept, "swept keys left by interrupted probes");
        }
        if let Some(reason) = interruption {
            warn!(reason, completed = gathered.completed(), total, "assessment interrupted");
        }

        let outcomes: Vec<ProbeOutcome> = gathered
            .outcomes
            .iter_mut()
            .zip(probes)
            .map(|(slot, probe)| {
                slot.take().unwrap_or_else(|| {
                    ProbeOutcome::interrupted(probe.descriptor(), interruption.unwrap_or(ABORTED))
                })
            })
            .collect();
        let result = self.set.scorer().score(&outcomes);
        info!(
            classification = ?result.classification,
            score = result.score_percent,
            "assessment finished"
        );
        // Nobody listening means the stream was dropped.
        let _ = gathered.states.send(AssessmentState::terminal(result));
    }
}

/// Outcomes gathered so far, in declared slots.
struct Gathered {
    category: Category,
    total: usize,
    outcomes: Vec<Option<ProbeOutcome>>,
    partial: Option<AssessmentResult>,
    stage: Option<String>,
    states: mpsc::UnboundedSender<AssessmentState>,
}

impl Gathered {
    fn new(category: Category, total: usize, states: mpsc::UnboundedSender<AssessmentState>) -> Self {
        Self {
            category,
            total,
            outcomes: vec![None; total],
            partial: None,
            stage: None,
            states,
        }
    }

    fn completed(&self) -> usize {
        self.outcomes.iter().flatten().count()
    }

    fn record(&mut self, set: &ProbeSet, index: usize, outcome: ProbeOutcome) {
        if let Some(slot) = self.outcomes.get_mut(index) {
            *slot = Some(outcome);
        }
        let so_far: Vec<ProbeOutcome> = self.outcomes.iter().flatten().cloned().collect();
        self.partial = Some(set.scorer().score(&so_far));
    }

    fn stage(&mut self, progress: &Progress) {
        self.stage = Some(format!("{}: {}", progress.probe, progress.message));
    }

    fn emit(&self) {
        let _ = self.states.send(AssessmentState {
            category: self.category,
            phase: Phase::Running,
            partial: self.partial.clone(),
            stage: self.stage.clone(),
            completed: self.completed(),
            total: self.total,
        });
    }
}

/// Resolves once cancellation is requested or the stream is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|&c| c).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::testing::StaticSources;

    fn orchestrator(config: AssessmentConfig) -> Orchestrator {
        Orchestrator::builder()
            .sources(StaticSources::new().build())
            .config(config)
            .build()
            .unwrap()
    }

    #[test]
    fn every_category_gets_a_set() {
        let orch = orchestrator(AssessmentConfig::default());
        for category in Category::ALL {
            assert_eq!(orch.probe_set(category).unwrap().category(), category);
        }
    }

    #[test]
    fn invalid_config_fails_build() {
        let config = AssessmentConfig {
            category_budget_ms: 0,
            ..AssessmentConfig::default()
        };
        let err = Orchestrator::builder()
            .sources(StaticSources::new().build())
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn duplicate_overrides_are_rejected() {
        let set = || hostward_probes::bootloader::probe_set().unwrap();
        let err = Orchestrator::builder()
            .sources(StaticSources::new().build())
            .probe_set(set())
            .probe_set(set())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn emissions_are_cumulative_and_end_in_one_terminal() {
        let orch = orchestrator(AssessmentConfig::default());
        let states: Vec<AssessmentState> = orch.assess(Category::Network).unwrap().collect().await;

        let first = &states[0];
        assert_eq!(first.phase, Phase::Running);
        assert!(first.partial.is_none());
        assert_eq!(first.completed, 0);

        let completed: Vec<usize> = states.iter().map(|s| s.completed).collect();
        assert!(completed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(states.iter().filter(|s| s.is_terminal()).count(), 1);
        assert!(states.last().unwrap().is_terminal());
        assert_eq!(states.last().unwrap().completed, states[0].total);
    }
}
