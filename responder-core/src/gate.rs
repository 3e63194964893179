use crate::error::OrchestratorError;
use crate::incident::{now_millis, NewIncident, Severity, Status};
use crate::notify::NotificationKind;
use crate::orchestrator::Orchestrator;
use tracing::info;

/// Approval policy, evaluated exactly once at ingestion. The verdict is
/// persisted on the incident record and never re-evaluated.
#[derive(Clone, Debug)]
pub struct ApprovalPolicy {
    pub auto_approve_low: bool,
    pub auto_approve_medium: bool,
    pub auto_approve_high: bool,
    pub auto_approve_critical: bool,
    pub auto_approve_sources: Vec<String>,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            auto_approve_low: true,
            auto_approve_medium: false,
            auto_approve_high: false,
            auto_approve_critical: false,
            auto_approve_sources: Vec::new(),
        }
    }
}

impl ApprovalPolicy {
    pub fn from_env() -> Self {
        Self {
            auto_approve_low: env_flag("AUTO_APPROVE_LOW_SEVERITY", true),
            auto_approve_medium: env_flag("AUTO_APPROVE_MEDIUM_SEVERITY", false),
            auto_approve_high: env_flag("AUTO_APPROVE_HIGH_SEVERITY", false),
            auto_approve_critical: env_flag("AUTO_APPROVE_CRITICAL_SEVERITY", false),
            auto_approve_sources: std::env::var("AUTO_APPROVE_SOURCES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Explicit auto-approve flag, then the per-severity table, then the
    /// source allow-list. Default: approval required.
    pub fn requires_approval(&self, incoming: &NewIncident) -> bool {
        if incoming.auto_approve {
            return false;
        }
        let severity_auto = match incoming.severity {
            Severity::Low => self.auto_approve_low,
            Severity::Medium => self.auto_approve_medium,
            Severity::High => self.auto_approve_high,
            Severity::Critical => self.auto_approve_critical,
        };
        if severity_auto {
            return false;
        }
        if self
            .auto_approve_sources
            .iter()
            .any(|s| s == &incoming.source)
        {
            return false;
        }
        true
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn parse(value: &str) -> Result<Decision, OrchestratorError> {
        match value.to_lowercase().as_str() {
            "approve" => Ok(Decision::Approve),
            "deny" => Ok(Decision::Deny),
            other => Err(OrchestratorError::InvalidRequest(format!(
                "invalid decision '{other}'; use \"approve\" or \"deny\""
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecisionOutcome {
    pub incident_id: String,
    pub status: Status,
    pub message: String,
}

impl Orchestrator {
    /// Processes a human approval decision. Decisions against terminal
    /// incidents are rejected: replaying APPROVE on a resolved incident
    /// would double-execute its safe actions.
    pub fn decide(
        &self,
        incident_id: &str,
        decision: Decision,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<DecisionOutcome, OrchestratorError> {
        let incident = self
            .store
            .latest(incident_id)?
            .ok_or_else(|| OrchestratorError::NotFound(incident_id.to_string()))?;

        if incident.status.is_terminal() {
            return Err(OrchestratorError::InvalidRequest(format!(
                "incident {incident_id} is already {:?}",
                incident.status
            )));
        }

        match decision {
            Decision::Approve => {
                let had_deferred = incident.has_deferred_actions();

                let mut next = incident.next_revision();
                next.status = Status::Approved;
                next.requires_approval = false;
                next.approved_by = Some(actor.to_string());
                next.approved_at = Some(now_millis());
                self.store.append(&next, Some(incident.revision_timestamp))?;
                info!(incident_id, actor, "incident approved");

                // Synchronous hand-off back into the loop. An incident that
                // already ran and parked unsafe actions gets exactly those
                // dispatched; anything else resumes the full loop.
                let result = if had_deferred {
                    self.resume_deferred(incident_id)?
                } else {
                    self.run(incident_id)?
                };

                Ok(DecisionOutcome {
                    incident_id: incident_id.to_string(),
                    status: result.status(),
                    message: format!("incident {incident_id} approved and processing resumed"),
                })
            }
            Decision::Deny => {
                let mut next = incident.next_revision();
                next.status = Status::Denied;
                next.denied_by = Some(actor.to_string());
                next.denied_at = Some(now_millis());
                next.denial_reason =
                    Some(reason.unwrap_or("No reason provided").to_string());
                self.store.append(&next, Some(incident.revision_timestamp))?;
                info!(incident_id, actor, "incident denied");

                self.emit(NotificationKind::Denied, &next, None, Status::Denied);

                Ok(DecisionOutcome {
                    incident_id: incident_id.to_string(),
                    status: Status::Denied,
                    message: format!("incident {incident_id} denied by {actor}"),
                })
            }
        }
    }
}
