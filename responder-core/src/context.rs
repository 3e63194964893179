use crate::error::CollaboratorError;
use crate::incident::Incident;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Diagnostic context assembled during the Observe phase.
#[derive(Clone, Debug)]
pub struct IncidentContext {
    pub incident: Incident,
    pub metrics: Vec<serde_json::Value>,
    pub logs: Vec<String>,
    pub runbooks: Vec<String>,
}

pub trait MetricsProvider: Send + Sync {
    fn query(&self, incident: &Incident) -> Result<Vec<serde_json::Value>, CollaboratorError>;
}

pub trait LogProvider: Send + Sync {
    fn tail(&self, incident: &Incident) -> Result<Vec<String>, CollaboratorError>;
}

pub trait RunbookProvider: Send + Sync {
    fn retrieve(&self, incident: &Incident) -> Result<Vec<String>, CollaboratorError>;
}

/// Collects metrics, logs and runbook excerpts for an incident. Each
/// sub-source failure is isolated: it degrades to an empty contribution
/// and is logged, never aborting the loop.
pub struct ContextGatherer {
    metrics: Arc<dyn MetricsProvider>,
    logs: Arc<dyn LogProvider>,
    runbooks: Arc<dyn RunbookProvider>,
}

impl ContextGatherer {
    pub fn new(
        metrics: Arc<dyn MetricsProvider>,
        logs: Arc<dyn LogProvider>,
        runbooks: Arc<dyn RunbookProvider>,
    ) -> Self {
        Self {
            metrics,
            logs,
            runbooks,
        }
    }

    pub fn gather(&self, incident: &Incident) -> IncidentContext {
        let metrics = self.metrics.query(incident).unwrap_or_else(|err| {
            warn!(incident_id = %incident.incident_id, error = %err, "metrics retrieval failed");
            Vec::new()
        });
        let logs = self.logs.tail(incident).unwrap_or_else(|err| {
            warn!(incident_id = %incident.incident_id, error = %err, "log retrieval failed");
            Vec::new()
        });
        let runbooks = self.runbooks.retrieve(incident).unwrap_or_else(|err| {
            warn!(incident_id = %incident.incident_id, error = %err, "runbook retrieval failed");
            Vec::new()
        });

        IncidentContext {
            incident: incident.clone(),
            metrics,
            logs,
            runbooks,
        }
    }
}

/// Stand-ins for environments without telemetry backends wired up.
pub struct NullMetrics;

impl MetricsProvider for NullMetrics {
    fn query(&self, _incident: &Incident) -> Result<Vec<serde_json::Value>, CollaboratorError> {
        Ok(Vec::new())
    }
}

pub struct NullLogs;

impl LogProvider for NullLogs {
    fn tail(&self, _incident: &Incident) -> Result<Vec<String>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Knowledge-base retrieval from a local directory: up to five documents,
/// lexicographic order, unreadable files skipped.
pub struct RunbookDir {
    dir: PathBuf,
}

impl RunbookDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RunbookProvider for RunbookDir {
    fn retrieve(&self, _incident: &Incident) -> Result<Vec<String>, CollaboratorError> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| CollaboratorError(e.to_string()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut runbooks = Vec::new();
        for path in paths.into_iter().take(5) {
            match std::fs::read_to_string(&path) {
                Ok(content) => runbooks.push(content),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable runbook");
                }
            }
        }
        Ok(runbooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::open_incident;
    use crate::incident::Severity;

    struct FailingMetrics;

    impl MetricsProvider for FailingMetrics {
        fn query(
            &self,
            _incident: &Incident,
        ) -> Result<Vec<serde_json::Value>, CollaboratorError> {
            Err(CollaboratorError("metrics backend down".into()))
        }
    }

    struct StaticLogs;

    impl LogProvider for StaticLogs {
        fn tail(&self, _incident: &Incident) -> Result<Vec<String>, CollaboratorError> {
            Ok(vec!["cpu spiked".into()])
        }
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        PathBuf::from(format!("/tmp/responder-tests/{name}-{nanos}"))
    }

    #[test]
    fn source_failure_degrades_to_empty() {
        let gatherer = ContextGatherer::new(
            Arc::new(FailingMetrics),
            Arc::new(StaticLogs),
            Arc::new(NullMetricsRunbooks),
        );
        let incident = open_incident("inc-a", Severity::High, false);

        let ctx = gatherer.gather(&incident);
        assert!(ctx.metrics.is_empty());
        assert_eq!(ctx.logs, vec!["cpu spiked".to_string()]);
        assert!(ctx.runbooks.is_empty());
    }

    struct NullMetricsRunbooks;

    impl RunbookProvider for NullMetricsRunbooks {
        fn retrieve(&self, _incident: &Incident) -> Result<Vec<String>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn runbook_dir_reads_at_most_five() {
        let dir = tmp_dir("runbooks");
        std::fs::create_dir_all(&dir).expect("mkdir");
        for i in 0..7 {
            std::fs::write(dir.join(format!("rb-{i}.md")), format!("runbook {i}")).expect("write");
        }

        let provider = RunbookDir::new(&dir);
        let incident = open_incident("inc-a", Severity::High, false);
        let runbooks = provider.retrieve(&incident).expect("retrieve");
        assert_eq!(runbooks.len(), 5);
        assert_eq!(runbooks[0], "runbook 0");
    }

    #[test]
    fn runbook_dir_missing_is_a_collaborator_error() {
        let provider = RunbookDir::new("/tmp/responder-tests/does-not-exist");
        let incident = open_incident("inc-a", Severity::High, false);
        assert!(provider.retrieve(&incident).is_err());
    }
}
