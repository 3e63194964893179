use serde::{Deserialize, Serialize};

/// Incident lifecycle status. Transitions are driven exclusively by the
/// orchestrator and the approval gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Open,
    PendingApproval,
    Approved,
    Denied,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Resolved | Status::Denied | Status::Closed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive parse; unknown values fall back to MEDIUM, the
    /// ingestion default.
    pub fn parse_or_default(value: &str) -> Severity {
        match value.to_lowercase().as_str() {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

/// Root-cause hypothesis produced by the diagnostic reasoner.
/// Never absent from a completed loop: reasoner failures degrade to a
/// zero-confidence diagnosis with `error` set instead of aborting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub diagnosis: String,
    /// 0-100.
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    /// Safe actions are authorized for automatic execution; unsafe ones
    /// are deferred until the incident carries a human approval.
    pub safe: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub actions: Vec<Action>,
    pub requires_approval: bool,
    pub success: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Unknown,
    PendingApproval,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: OutcomeStatus,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub status: OutcomeStatus,
    /// Present iff the action was dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    pub timestamp: i64,
}

/// One revision of an incident. The store never mutates in place: every
/// update writes a new revision carrying forward all fields, and "the
/// incident" always means the revision with the maximum revision timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub incident_id: String,
    /// Monotonically increasing epoch milliseconds.
    pub revision_timestamp: i64,
    pub status: Status,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Fixed at ingestion by policy; cleared only by the gate on APPROVE.
    pub requires_approval: bool,
    #[serde(default)]
    pub auto_approve: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_taken: Option<Vec<ActionOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
}

impl Incident {
    /// Full read-modify-write revision: clone of the current state with the
    /// revision timestamp bumped past the previous one even when the clock
    /// has not advanced.
    pub fn next_revision(&self) -> Incident {
        let mut next = self.clone();
        let now = now_millis();
        next.revision_timestamp = if now > self.revision_timestamp {
            now
        } else {
            self.revision_timestamp + 1
        };
        next
    }

    pub fn has_deferred_actions(&self) -> bool {
        self.actions_taken
            .as_ref()
            .is_some_and(|outcomes| {
                outcomes
                    .iter()
                    .any(|o| o.status == OutcomeStatus::PendingApproval)
            })
    }
}

/// Ingestion input, before an id or policy verdict exists.
#[derive(Clone, Debug)]
pub struct NewIncident {
    pub incident_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub source: String,
    pub metadata: serde_json::Value,
    pub auto_approve: bool,
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    duration.as_millis() as i64
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn open_incident(id: &str, severity: Severity, requires_approval: bool) -> Incident {
        Incident {
            incident_id: id.into(),
            revision_timestamp: now_millis(),
            status: Status::Open,
            severity,
            title: "High CPU Alert".into(),
            description: "CPU utilization exceeded 90%".into(),
            source: "cloudwatch".into(),
            metadata: serde_json::json!({}),
            requires_approval,
            auto_approve: false,
            created_at: now_millis(),
            diagnosis: None,
            plan: None,
            actions_taken: None,
            approved_by: None,
            approved_at: None,
            denied_by: None,
            denied_at: None,
            denial_reason: None,
        }
    }

    #[test]
    fn next_revision_is_strictly_increasing() {
        let first = open_incident("inc-1", Severity::High, true);
        let second = first.next_revision();
        let third = second.next_revision();
        assert!(second.revision_timestamp > first.revision_timestamp);
        assert!(third.revision_timestamp > second.revision_timestamp);
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&Status::PendingApproval).expect("serialize");
        assert_eq!(json, "\"PENDING_APPROVAL\"");
    }

    #[test]
    fn severity_parse_defaults_to_medium() {
        assert_eq!(Severity::parse_or_default("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse_or_default("nonsense"), Severity::Medium);
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Resolved.is_terminal());
        assert!(Status::Denied.is_terminal());
        assert!(Status::Closed.is_terminal());
        assert!(!Status::PendingApproval.is_terminal());
    }
}
