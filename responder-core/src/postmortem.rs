use crate::error::CollaboratorError;
use crate::incident::{now_millis, ActionOutcome, Incident};
use std::path::PathBuf;

/// Retrospective report storage. Failures are logged by the caller and
/// never propagate into the loop.
pub trait PostmortemSink: Send + Sync {
    fn store(&self, incident_id: &str, report: &str) -> Result<(), CollaboratorError>;
}

/// Renders the postmortem markdown for a resolved incident.
pub fn render_report(incident: &Incident, actions: &[ActionOutcome]) -> String {
    let root_cause = incident
        .diagnosis
        .as_ref()
        .map(|d| d.diagnosis.as_str())
        .unwrap_or("Unknown");
    let actions_json =
        serde_json::to_string_pretty(actions).unwrap_or_else(|_| "[]".to_string());

    format!(
        "# Incident Postmortem: {id}\n\
         \n\
         ## Summary\n\
         {title}\n\
         \n\
         ## Timeline\n\
         - Detected: {created_at}\n\
         - Resolved: {resolved_at}\n\
         \n\
         ## Root Cause\n\
         {root_cause}\n\
         \n\
         ## Actions Taken\n\
         ```json\n\
         {actions_json}\n\
         ```\n\
         \n\
         ## Prevention\n\
         - Review monitoring thresholds\n\
         - Update runbooks\n\
         - Implement additional safeguards\n",
        id = incident.incident_id,
        title = incident.title,
        created_at = incident.created_at,
        resolved_at = now_millis(),
    )
}

/// Writes reports to `{dir}/{incident_id}/postmortem.md`.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PostmortemSink for FileSink {
    fn store(&self, incident_id: &str, report: &str) -> Result<(), CollaboratorError> {
        let dir = self.dir.join(incident_id);
        std::fs::create_dir_all(&dir).map_err(|e| CollaboratorError(e.to_string()))?;
        std::fs::write(dir.join("postmortem.md"), report)
            .map_err(|e| CollaboratorError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::open_incident;
    use crate::incident::{ActionResult, Diagnosis, OutcomeStatus, Severity};

    #[test]
    fn report_carries_root_cause_and_actions() {
        let mut incident = open_incident("inc-a", Severity::High, false);
        incident.diagnosis = Some(Diagnosis {
            diagnosis: "cpu saturation on app tier".into(),
            confidence: 80,
            raw: None,
            error: None,
        });
        let actions = vec![ActionOutcome {
            action: crate::incident::Action {
                kind: "restart_service".into(),
                target: "application".into(),
                safe: true,
            },
            status: OutcomeStatus::Success,
            result: Some(ActionResult {
                status: OutcomeStatus::Success,
                message: "Service restarted (simulated)".into(),
            }),
            timestamp: 1,
        }];

        let report = render_report(&incident, &actions);
        assert!(report.contains("# Incident Postmortem: inc-a"));
        assert!(report.contains("cpu saturation on app tier"));
        assert!(report.contains("restart_service"));
    }

    #[test]
    fn file_sink_writes_under_incident_dir() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = format!("/tmp/responder-tests/postmortems-{nanos}");

        let sink = FileSink::new(&dir);
        sink.store("inc-a", "# Incident Postmortem: inc-a").expect("store");

        let written =
            std::fs::read_to_string(format!("{dir}/inc-a/postmortem.md")).expect("read");
        assert!(written.starts_with("# Incident Postmortem"));
    }
}
