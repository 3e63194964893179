use crate::context::ContextGatherer;
use crate::error::OrchestratorError;
use crate::executor::{self, ActionRunner};
use crate::gate::ApprovalPolicy;
use crate::incident::{
    now_millis, ActionOutcome, Diagnosis, Incident, NewIncident, OutcomeStatus, Plan, Status,
};
use crate::notify::{NotificationEvent, NotificationKind};
use crate::planner;
use crate::postmortem::{self, PostmortemSink};
use crate::reasoner::Reasoner;
use crate::store::IncidentStore;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// The collaborators behind each loop phase. All injected so tests and
/// alternative deployments can substitute in-memory fakes.
pub struct Collaborators {
    pub gatherer: ContextGatherer,
    pub reasoner: Arc<dyn Reasoner>,
    pub runner: Arc<dyn ActionRunner>,
    pub postmortems: Arc<dyn PostmortemSink>,
}

/// Result of one agent-loop invocation.
#[derive(Clone, Debug)]
pub enum LoopResult {
    /// Suspended awaiting a human decision; resumes via the approval gate.
    PendingApproval,
    Denied,
    Completed {
        status: Status,
        diagnosis: Option<Diagnosis>,
        plan: Option<Plan>,
        actions_taken: Vec<ActionOutcome>,
    },
}

impl LoopResult {
    pub fn status(&self) -> Status {
        match self {
            LoopResult::PendingApproval => Status::PendingApproval,
            LoopResult::Denied => Status::Denied,
            LoopResult::Completed { status, .. } => *status,
        }
    }
}

/// Sequences Observe -> Reason -> Plan -> Act over a versioned incident
/// record. Stateless between invocations: every entry re-reads the latest
/// revision and every transition is a conditional append.
pub struct Orchestrator {
    pub(crate) store: Arc<dyn IncidentStore>,
    pub(crate) policy: ApprovalPolicy,
    pub(crate) gatherer: ContextGatherer,
    pub(crate) reasoner: Arc<dyn Reasoner>,
    pub(crate) runner: Arc<dyn ActionRunner>,
    pub(crate) postmortems: Arc<dyn PostmortemSink>,
    pub(crate) notify_tx: Sender<NotificationEvent>,
    pub(crate) trigger_tx: Sender<String>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        policy: ApprovalPolicy,
        collaborators: Collaborators,
        notify_tx: Sender<NotificationEvent>,
        trigger_tx: Sender<String>,
    ) -> Self {
        Self {
            store,
            policy,
            gatherer: collaborators.gatherer,
            reasoner: collaborators.reasoner,
            runner: collaborators.runner,
            postmortems: collaborators.postmortems,
            notify_tx,
            trigger_tx,
        }
    }

    /// Ingestion entry point: assigns an id if absent, evaluates the
    /// approval policy once, persists the OPEN revision and triggers the
    /// loop asynchronously. A failed trigger is logged; the incident
    /// remains valid and can be re-triggered.
    pub fn create_incident(&self, incoming: NewIncident) -> Result<String, OrchestratorError> {
        let incident_id = incoming
            .incident_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let requires_approval = self.policy.requires_approval(&incoming);

        let existing = self.store.latest(&incident_id)?;
        let expected_prev = existing.as_ref().map(|prev| prev.revision_timestamp);
        let now = now_millis();
        let revision_timestamp = match expected_prev {
            Some(prev) if prev >= now => prev + 1,
            _ => now,
        };

        let incident = Incident {
            incident_id: incident_id.clone(),
            revision_timestamp,
            status: Status::Open,
            severity: incoming.severity,
            title: incoming.title,
            description: incoming.description,
            source: incoming.source,
            metadata: incoming.metadata,
            requires_approval,
            auto_approve: incoming.auto_approve,
            created_at: now,
            diagnosis: None,
            plan: None,
            actions_taken: None,
            approved_by: None,
            approved_at: None,
            denied_by: None,
            denied_at: None,
            denial_reason: None,
        };
        self.store.append(&incident, expected_prev)?;
        info!(incident_id = %incident_id, requires_approval, "incident created");

        if let Err(err) = self.trigger_tx.send(incident_id.clone()) {
            warn!(incident_id = %incident_id, error = %err, "failed to trigger agent loop");
        }

        Ok(incident_id)
    }

    /// One agent-loop invocation over the latest revision.
    pub fn run(&self, incident_id: &str) -> Result<LoopResult, OrchestratorError> {
        let incident = self
            .store
            .latest(incident_id)?
            .ok_or_else(|| OrchestratorError::NotFound(incident_id.to_string()))?;

        // Terminal and suspended incidents are no-ops under duplicate
        // triggers; at-least-once delivery must not double-execute actions.
        if incident.status == Status::Denied {
            return Ok(LoopResult::Denied);
        }
        if incident.status.is_terminal() {
            return Ok(LoopResult::Completed {
                status: incident.status,
                diagnosis: incident.diagnosis,
                plan: incident.plan,
                actions_taken: incident.actions_taken.unwrap_or_default(),
            });
        }
        if incident.status == Status::PendingApproval {
            return Ok(LoopResult::PendingApproval);
        }
        // IN_PROGRESS with parked unsafe actions is also a suspension:
        // only an explicit approval may dispatch them, never a re-trigger.
        if incident.has_deferred_actions() {
            return Ok(LoopResult::Completed {
                status: incident.status,
                diagnosis: incident.diagnosis,
                plan: incident.plan,
                actions_taken: incident.actions_taken.unwrap_or_default(),
            });
        }

        if incident.requires_approval && incident.status == Status::Open {
            // Suspension point: persist the parked state and return. The
            // loop re-enters later through the approval gate.
            self.emit(
                NotificationKind::ApprovalRequest,
                &incident,
                None,
                Status::PendingApproval,
            );
            let mut next = incident.next_revision();
            next.status = Status::PendingApproval;
            self.store.append(&next, Some(incident.revision_timestamp))?;
            info!(incident_id, "awaiting approval");
            return Ok(LoopResult::PendingApproval);
        }

        // Observe
        info!(incident_id, phase = "observe", "gathering context");
        let context = self.gatherer.gather(&incident);

        // Reason
        info!(incident_id, phase = "reason", "deriving root cause");
        let diagnosis = self.reasoner.diagnose(&context);
        self.emit(
            NotificationKind::Progress,
            &incident,
            Some(&diagnosis),
            Status::InProgress,
        );

        // Plan
        info!(incident_id, phase = "plan", "deriving remediation plan");
        let plan = planner::plan_remediation(&diagnosis);

        // Act
        info!(incident_id, phase = "act", actions = plan.actions.len(), "executing plan");
        let human_approved = incident.approved_by.is_some();
        let actions_taken =
            executor::execute_plan(self.runner.as_ref(), &plan, incident_id, human_approved);

        let pending = actions_taken
            .iter()
            .any(|o| o.status == OutcomeStatus::PendingApproval);
        let status = if plan.success && !pending {
            Status::Resolved
        } else {
            Status::InProgress
        };

        let mut next = incident.next_revision();
        next.status = status;
        next.diagnosis = Some(diagnosis.clone());
        next.plan = Some(plan.clone());
        next.actions_taken = Some(actions_taken.clone());
        self.store.append(&next, Some(incident.revision_timestamp))?;

        if status == Status::Resolved {
            self.finish_resolved(&next, &actions_taken);
        }

        Ok(LoopResult::Completed {
            status,
            diagnosis: Some(diagnosis),
            plan: Some(plan),
            actions_taken,
        })
    }

    /// Second-stage entry after an explicit approval: dispatches exactly
    /// the outcomes parked as PENDING_APPROVAL, without re-running
    /// Observe/Reason/Plan (safe actions already ran once).
    pub fn resume_deferred(&self, incident_id: &str) -> Result<LoopResult, OrchestratorError> {
        let incident = self
            .store
            .latest(incident_id)?
            .ok_or_else(|| OrchestratorError::NotFound(incident_id.to_string()))?;

        let Some(outcomes) = incident.actions_taken.clone() else {
            return self.run(incident_id);
        };
        if !incident.has_deferred_actions() {
            return self.run(incident_id);
        }

        let actions_taken =
            executor::dispatch_deferred(self.runner.as_ref(), incident_id, &outcomes);
        let plan_success = incident.plan.as_ref().map_or(true, |p| p.success);
        let pending = actions_taken
            .iter()
            .any(|o| o.status == OutcomeStatus::PendingApproval);
        let status = if plan_success && !pending {
            Status::Resolved
        } else {
            Status::InProgress
        };

        let mut next = incident.next_revision();
        next.status = status;
        next.actions_taken = Some(actions_taken.clone());
        self.store.append(&next, Some(incident.revision_timestamp))?;

        if status == Status::Resolved {
            self.finish_resolved(&next, &actions_taken);
        }

        Ok(LoopResult::Completed {
            status,
            diagnosis: next.diagnosis,
            plan: next.plan,
            actions_taken,
        })
    }

    /// Resolution side effects: best-effort notification and a
    /// fire-and-forget postmortem. Neither can fail the loop.
    fn finish_resolved(&self, incident: &Incident, actions_taken: &[ActionOutcome]) {
        self.emit(
            NotificationKind::Resolved,
            incident,
            incident.diagnosis.as_ref(),
            Status::Resolved,
        );
        let report = postmortem::render_report(incident, actions_taken);
        if let Err(err) = self.postmortems.store(&incident.incident_id, &report) {
            warn!(
                incident_id = %incident.incident_id,
                error = %err,
                "postmortem storage failed"
            );
        }
    }

    pub(crate) fn emit(
        &self,
        kind: NotificationKind,
        incident: &Incident,
        diagnosis: Option<&Diagnosis>,
        status: Status,
    ) {
        let event = NotificationEvent::new(kind, incident, diagnosis, status);
        if self.notify_tx.send(event).is_err() {
            warn!(incident_id = %incident.incident_id, "notification channel closed; event dropped");
        }
    }
}

/// Drains loop triggers on a worker thread. Each trigger is an independent
/// invocation; failures are logged and never retried here (retry is the
/// trigger source's responsibility).
pub fn spawn_worker(orchestrator: Arc<Orchestrator>, triggers: Receiver<String>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(incident_id) = triggers.recv() {
            match orchestrator.run(&incident_id) {
                Ok(result) => {
                    info!(incident_id = %incident_id, status = ?result.status(), "agent loop finished");
                }
                Err(err) => {
                    warn!(incident_id = %incident_id, error = %err, "agent loop failed");
                }
            }
        }
    })
}
