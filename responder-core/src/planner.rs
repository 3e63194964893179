use crate::incident::{Action, Diagnosis, Plan};

/// Deterministic rule evaluation over the diagnosis text. Intentionally
/// simple policy logic: replaceable by a richer planner without touching
/// the orchestrator contract.
pub fn plan_remediation(diagnosis: &Diagnosis) -> Plan {
    let text = diagnosis.diagnosis.to_lowercase();
    let mut actions = Vec::new();

    if text.contains("cpu") {
        actions.push(Action {
            kind: "restart_service".into(),
            target: "application".into(),
            safe: true,
        });
    }
    if text.contains("memory") {
        actions.push(Action {
            kind: "scale_up".into(),
            target: "auto_scaling_group".into(),
            safe: true,
        });
    }

    Plan {
        requires_approval: actions.iter().any(|a| !a.safe),
        actions,
        success: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnosis(text: &str) -> Diagnosis {
        Diagnosis {
            diagnosis: text.into(),
            confidence: 80,
            raw: None,
            error: None,
        }
    }

    #[test]
    fn cpu_diagnosis_plans_safe_restart() {
        let plan = plan_remediation(&diagnosis("High CPU utilization on app tier"));
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, "restart_service");
        assert_eq!(plan.actions[0].target, "application");
        assert!(plan.actions[0].safe);
        assert!(!plan.requires_approval);
        assert!(plan.success);
    }

    #[test]
    fn memory_diagnosis_plans_scale_up() {
        let plan = plan_remediation(&diagnosis("memory pressure on workers"));
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, "scale_up");
        assert_eq!(plan.actions[0].target, "auto_scaling_group");
    }

    #[test]
    fn combined_diagnosis_plans_both() {
        let plan = plan_remediation(&diagnosis("cpu and memory exhaustion"));
        assert_eq!(plan.actions.len(), 2);
    }

    #[test]
    fn unknown_diagnosis_plans_nothing() {
        let plan = plan_remediation(&diagnosis("network partition in us-east-1"));
        assert!(plan.actions.is_empty());
        assert!(plan.success);
        assert!(!plan.requires_approval);
    }
}
