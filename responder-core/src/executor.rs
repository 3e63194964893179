use crate::incident::{now_millis, Action, ActionOutcome, ActionResult, OutcomeStatus, Plan};
use tracing::{info, warn};

/// Dispatches a single remediation action. Unknown action types return an
/// UNKNOWN result rather than failing.
pub trait ActionRunner: Send + Sync {
    fn run(&self, action: &Action) -> ActionResult;
}

/// Executes a plan in order. Safe actions are dispatched immediately;
/// unsafe ones are deferred with a PENDING_APPROVAL outcome unless the
/// incident already carries an explicit human approval.
pub fn execute_plan(
    runner: &dyn ActionRunner,
    plan: &Plan,
    incident_id: &str,
    human_approved: bool,
) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::with_capacity(plan.actions.len());

    for action in &plan.actions {
        if action.safe || human_approved {
            let result = runner.run(action);
            info!(
                incident_id,
                action = %action.kind,
                status = ?result.status,
                "action dispatched"
            );
            outcomes.push(ActionOutcome {
                action: action.clone(),
                status: result.status,
                result: Some(result),
                timestamp: now_millis(),
            });
        } else {
            warn!(incident_id, action = %action.kind, "unsafe action deferred for approval");
            outcomes.push(ActionOutcome {
                action: action.clone(),
                status: OutcomeStatus::PendingApproval,
                result: None,
                timestamp: now_millis(),
            });
        }
    }

    outcomes
}

/// Second-stage dispatch after an explicit approval: executes exactly the
/// outcomes still pending, leaving already-dispatched ones untouched.
pub fn dispatch_deferred(
    runner: &dyn ActionRunner,
    incident_id: &str,
    outcomes: &[ActionOutcome],
) -> Vec<ActionOutcome> {
    outcomes
        .iter()
        .map(|outcome| {
            if outcome.status != OutcomeStatus::PendingApproval {
                return outcome.clone();
            }
            let result = runner.run(&outcome.action);
            info!(
                incident_id,
                action = %outcome.action.kind,
                status = ?result.status,
                "deferred action dispatched after approval"
            );
            ActionOutcome {
                action: outcome.action.clone(),
                status: result.status,
                result: Some(result),
                timestamp: now_millis(),
            }
        })
        .collect()
}

/// Simulated execution collaborator: mirrors the command-runner contract
/// without touching any infrastructure.
pub struct SimulatedRunner;

impl ActionRunner for SimulatedRunner {
    fn run(&self, action: &Action) -> ActionResult {
        match action.kind.as_str() {
            "restart_service" => ActionResult {
                status: OutcomeStatus::Success,
                message: "Service restarted (simulated)".into(),
            },
            "scale_up" => ActionResult {
                status: OutcomeStatus::Success,
                message: "Scaled up (simulated)".into(),
            },
            other => ActionResult {
                status: OutcomeStatus::Unknown,
                message: format!("Unknown action type: {other}"),
            },
        }
    }
}
