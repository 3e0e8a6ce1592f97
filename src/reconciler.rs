//! The reconciliation pipeline.
//!
//! This module wires the stages together: collect the observed state,
//! normalize and validate the desired state, diff the two, synthesize
//! device operations, execute them, and report what happened. The
//! pipeline is linear; a failure at any stage aborts the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::collect::FactCollector;
use crate::diff::{DiffEngine, StateDelta, StateMode};
use crate::error::Result;
use crate::executor::{ApplyReport, Executor};
use crate::resource::{
    KindRegistry, NormalizedWant, Normalizer, NullHandling, ResourceKind, ResourceState,
    StateFingerprint,
};
use crate::synth::Operation;
use crate::transport::Transport;

/// Pipeline stages, in order. Used for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and parsing device facts.
    CollectingFacts,
    /// Normalizing the desired-state document.
    Normalizing,
    /// Kind-specific validation of the desired state.
    Validating,
    /// Computing the state delta.
    Diffing,
    /// Turning the delta into device operations.
    Synthesizing,
    /// Sending operations to the device.
    Executing,
    /// Assembling the run outcome.
    Reporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollectingFacts => "collecting facts",
            Self::Normalizing => "normalizing",
            Self::Validating => "validating",
            Self::Diffing => "diffing",
            Self::Synthesizing => "synthesizing",
            Self::Executing => "executing",
            Self::Reporting => "reporting",
        };
        write!(f, "{s}")
    }
}

/// One reconciliation request.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    /// Registry name of the kind to reconcile.
    pub kind: String,
    /// Raw desired-state resources from the configuration document.
    pub resources: Vec<serde_yaml::Value>,
    /// Reconciliation mode.
    pub mode: StateMode,
    /// When true, compute and report but never mutate the device.
    pub check_mode: bool,
}

/// Per-delta-kind change counts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChangeSummary {
    /// Resources to create.
    pub creates: usize,
    /// Resources to update.
    pub updates: usize,
    /// Resources to delete.
    pub deletes: usize,
}

impl ChangeSummary {
    fn from_delta(delta: &StateDelta) -> Self {
        Self {
            creates: delta.creates(),
            updates: delta.updates(),
            deletes: delta.deletes(),
        }
    }
}

/// The full record of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    /// Unique id for this run.
    pub run_id: Uuid,
    /// The reconciled kind.
    pub kind: String,
    /// The mode the run used.
    pub mode: StateMode,
    /// True when this was a dry run.
    pub check_mode: bool,
    /// Whether the device changed (or would change).
    pub changed: bool,
    /// Change counts by delta kind.
    pub summary: ChangeSummary,
    /// Descriptions of every synthesized operation, in order.
    pub operations: Vec<String>,
    /// Descriptions of the operations actually sent (empty in check mode).
    pub applied: Vec<String>,
    /// Non-fatal findings from normalization and diffing.
    pub warnings: Vec<String>,
    /// Fingerprint of the observed state before the run.
    pub before_fingerprint: String,
    /// Fingerprint of the state after the run. In check mode this is the
    /// predicted state; otherwise it is re-collected from the device.
    pub after_fingerprint: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Drives requests through the pipeline.
pub struct Reconciler<'a> {
    registry: &'a KindRegistry,
    transport: &'a dyn Transport,
    null_handling: Option<NullHandling>,
    protected: Vec<String>,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler over a transport.
    #[must_use]
    pub const fn new(registry: &'a KindRegistry, transport: &'a dyn Transport) -> Self {
        Self {
            registry,
            transport,
            null_handling: None,
            protected: Vec::new(),
        }
    }

    /// Overrides the kinds' null handling for every resource in the run.
    #[must_use]
    pub const fn with_null_handling(mut self, null_handling: Option<NullHandling>) -> Self {
        self.null_handling = null_handling;
        self
    }

    /// Extends the protected key set beyond the kinds' own defaults.
    #[must_use]
    pub fn with_protected(mut self, protected: Vec<String>) -> Self {
        self.protected = protected;
        self
    }

    /// Collects and parses the observed state for one kind.
    ///
    /// # Errors
    ///
    /// Returns an error when the kind is unknown, the device is
    /// unreachable, or its output cannot be parsed.
    pub async fn gather(&self, kind_name: &str) -> Result<ResourceState> {
        let kind = self.registry.get(kind_name)?;
        FactCollector::new(self.transport).collect(kind.as_ref()).await
    }

    /// Runs the request in check mode regardless of its own flag.
    ///
    /// # Errors
    ///
    /// Fails the same way [`Self::run`] does, minus execution errors.
    pub async fn plan(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let mut request = request.clone();
        request.check_mode = true;
        self.run(&request).await
    }

    /// Synthesizes operations against an empty observed state.
    ///
    /// Never contacts the device; the outcome shows what the desired
    /// state renders to from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error when the kind is unknown or the desired state
    /// fails normalization, validation, or diffing.
    pub fn render(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let kind = self.registry.get(&request.kind)?;
        let kind = kind.as_ref();

        let have = ResourceState::new();
        let want = self.normalize(kind, request)?;
        kind.validate_want(&want.state, request.mode)?;
        let delta =
            DiffEngine::new().diff(kind, &want, &have, request.mode, &self.protected)?;
        let operations = self.synthesize(kind, &delta, request.mode)?;
        let after = delta.project(&have, kind);

        Ok(ReconcileOutcome {
            run_id,
            kind: kind.name().to_string(),
            mode: request.mode,
            check_mode: true,
            changed: !operations.is_empty(),
            summary: ChangeSummary::from_delta(&delta),
            operations: operations.iter().map(Operation::describe).collect(),
            applied: Vec::new(),
            warnings: delta.warnings,
            before_fingerprint: StateFingerprint::new().fingerprint(&have),
            after_fingerprint: StateFingerprint::new().fingerprint(&after),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Runs one full reconciliation.
    ///
    /// # Errors
    ///
    /// Returns the first stage error. Execution failures carry the list
    /// of operations that were already sent.
    pub async fn run(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            kind = %request.kind,
            mode = %request.mode,
            check_mode = request.check_mode,
            "starting reconciliation"
        );

        let kind = self.registry.get(&request.kind)?;
        let kind = kind.as_ref();

        debug!(stage = %Stage::CollectingFacts);
        let have = FactCollector::new(self.transport).collect(kind).await?;

        debug!(stage = %Stage::Normalizing);
        let want = self.normalize(kind, request)?;

        debug!(stage = %Stage::Validating);
        kind.validate_want(&want.state, request.mode)?;

        debug!(stage = %Stage::Diffing);
        let delta =
            DiffEngine::new().diff(kind, &want, &have, request.mode, &self.protected)?;

        debug!(stage = %Stage::Synthesizing);
        let operations = self.synthesize(kind, &delta, request.mode)?;

        debug!(stage = %Stage::Executing, count = operations.len());
        let report = Executor::new(self.transport, request.check_mode)
            .execute(&operations)
            .await?;

        debug!(stage = %Stage::Reporting);
        self.report(kind, request, run_id, started_at, have, delta, &operations, report)
            .await
    }

    fn normalize(&self, kind: &dyn ResourceKind, request: &ReconcileRequest) -> Result<NormalizedWant> {
        let mut normalizer = Normalizer::new(kind);
        if let Some(null_handling) = self.null_handling {
            normalizer = normalizer.with_null_handling(null_handling);
        }
        normalizer.normalize(&request.resources, request.mode)
    }

    fn synthesize(
        &self,
        kind: &dyn ResourceKind,
        delta: &StateDelta,
        mode: StateMode,
    ) -> Result<Vec<Operation>> {
        let mut operations = Vec::new();
        for resource_delta in &delta.deltas {
            operations.extend(kind.synthesize(resource_delta, mode)?);
        }
        Ok(operations)
    }

    #[allow(clippy::too_many_arguments)]
    async fn report(
        &self,
        kind: &dyn ResourceKind,
        request: &ReconcileRequest,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        have: ResourceState,
        delta: StateDelta,
        operations: &[Operation],
        report: ApplyReport,
    ) -> Result<ReconcileOutcome> {
        let after = if request.check_mode {
            delta.project(&have, kind)
        } else if report.changed {
            FactCollector::new(self.transport).collect(kind).await?
        } else {
            have.clone()
        };

        let outcome = ReconcileOutcome {
            run_id,
            kind: kind.name().to_string(),
            mode: request.mode,
            check_mode: request.check_mode,
            changed: report.changed,
            summary: ChangeSummary::from_delta(&delta),
            operations: operations.iter().map(Operation::describe).collect(),
            applied: report.applied,
            warnings: delta.warnings,
            before_fingerprint: StateFingerprint::new().fingerprint(&have),
            after_fingerprint: StateFingerprint::new().fingerprint(&after),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            run_id = %outcome.run_id,
            changed = outcome.changed,
            operations = outcome.operations.len(),
            "reconciliation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FixtureTransport, MockTransport, RawFacts};

    const SHOW_VLAN: &str = "\
1    default     active
10   ten         active
20   twenty      active
";

    fn request(yaml: &str, mode: StateMode, check_mode: bool) -> ReconcileRequest {
        ReconcileRequest {
            kind: "vlans".into(),
            resources: serde_yaml::from_str(yaml).unwrap(),
            mode,
            check_mode,
        }
    }

    #[tokio::test]
    async fn test_check_mode_predicts_without_mutating() {
        let mut transport = MockTransport::new();
        transport
            .expect_get_facts()
            .times(1)
            .returning(|_| Ok(RawFacts::CliText(SHOW_VLAN.into())));
        // No edit_config / send_requests expectations: any call panics.

        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let outcome = reconciler
            .run(&request(
                "- {vlan_id: 30, name: thirty}",
                StateMode::Merged,
                true,
            ))
            .await
            .unwrap();

        assert!(outcome.changed);
        assert!(outcome.check_mode);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.summary.creates, 1);
        assert_eq!(outcome.operations, vec!["vlan 30", "name thirty"]);
        assert_ne!(outcome.before_fingerprint, outcome.after_fingerprint);
    }

    #[tokio::test]
    async fn test_converged_state_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vlans.txt"), SHOW_VLAN).unwrap();
        let transport = FixtureTransport::new(dir.path());

        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let outcome = reconciler
            .run(&request(
                "- {vlan_id: 10, name: ten}",
                StateMode::Merged,
                false,
            ))
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert!(transport.sent().is_empty());
        assert_eq!(outcome.before_fingerprint, outcome.after_fingerprint);
    }

    #[tokio::test]
    async fn test_apply_sends_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vlans.txt"), SHOW_VLAN).unwrap();
        let transport = FixtureTransport::new(dir.path());

        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let outcome = reconciler
            .run(&request("- {vlan_id: 20}", StateMode::Deleted, false))
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.applied, vec!["no vlan 20"]);
        assert_eq!(transport.sent(), vec!["no vlan 20"]);
    }

    #[tokio::test]
    async fn test_plan_forces_check_mode() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FixtureTransport::new(dir.path());

        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let outcome = reconciler
            .plan(&request(
                "- {vlan_id: 10, name: ten}",
                StateMode::Merged,
                false,
            ))
            .await
            .unwrap();

        assert!(outcome.check_mode);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_render_never_contacts_the_device() {
        // No expectations: any transport call panics.
        let transport = MockTransport::new();
        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let outcome = reconciler
            .render(&request(
                "- {vlan_id: 10, name: ten}",
                StateMode::Merged,
                false,
            ))
            .unwrap();

        assert!(outcome.changed);
        assert!(outcome.check_mode);
        assert_eq!(outcome.operations, vec!["vlan 10", "name ten"]);
        assert_eq!(outcome.summary.creates, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_before_collection() {
        let transport = MockTransport::new();
        let registry = KindRegistry::with_builtin_kinds();
        let reconciler = Reconciler::new(&registry, &transport);
        let err = reconciler
            .run(&ReconcileRequest {
                kind: "bgp".into(),
                resources: Vec::new(),
                mode: StateMode::Merged,
                check_mode: true,
            })
            .await
            .unwrap_err();
        assert!(err.is_pre_mutation());
    }
}
