use crate::incident::{Diagnosis, Incident, Severity, Status};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ApprovalRequest,
    Progress,
    Resolved,
    Denied,
}

/// Snapshot emitted by the orchestrator on a status change. Delivery is
/// best-effort and happens off the loop's critical path.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub incident_id: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationKind,
        incident: &Incident,
        diagnosis: Option<&Diagnosis>,
        status: Status,
    ) -> Self {
        Self {
            kind,
            incident_id: incident.incident_id.clone(),
            title: incident.title.clone(),
            severity: incident.severity,
            description: incident.description.clone(),
            status,
            diagnosis: diagnosis.cloned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped(String),
    Failed(String),
}

/// A single notification channel. Implementations report their own
/// outcome and must not assume any other channel ran before them.
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &str;
    fn deliver(&self, event: &NotificationEvent) -> Delivery;
}

/// Channel-id registry. Dispatch iterates every registered channel; a
/// failure in one never short-circuits the rest.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn dispatch(&self, event: &NotificationEvent) -> Vec<(String, Delivery)> {
        let mut results = Vec::with_capacity(self.notifiers.len());
        for notifier in &self.notifiers {
            let delivery = notifier.deliver(event);
            match &delivery {
                Delivery::Sent => {
                    debug!(channel = notifier.channel(), incident_id = %event.incident_id, "notification sent");
                }
                Delivery::Skipped(reason) => {
                    debug!(channel = notifier.channel(), %reason, "notification skipped");
                }
                Delivery::Failed(reason) => {
                    warn!(channel = notifier.channel(), incident_id = %event.incident_id, %reason, "notification failed");
                }
            }
            results.push((notifier.channel().to_string(), delivery));
        }
        results
    }
}

pub fn notification_channel() -> (Sender<NotificationEvent>, Receiver<NotificationEvent>) {
    mpsc::channel()
}

/// Drains notification events on a dedicated thread so delivery latency
/// never affects the agent loop.
pub fn spawn_notifier(
    registry: NotifierRegistry,
    events: Receiver<NotificationEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(event) = events.recv() {
            registry.dispatch(&event);
        }
    })
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn channel(&self) -> &str {
        "console"
    }

    fn deliver(&self, event: &NotificationEvent) -> Delivery {
        eprintln!(
            "[{:?}] {} ({:?}) {}: {}",
            event.kind, event.incident_id, event.severity, event.title, event.description
        );
        if let Some(diagnosis) = &event.diagnosis {
            eprintln!(
                "  diagnosis ({}%): {}",
                diagnosis.confidence, diagnosis.diagnosis
            );
        }
        Delivery::Sent
    }
}

/// Appends one JSON line per event to a journal file.
pub struct JournalNotifier {
    path: PathBuf,
}

impl JournalNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Notifier for JournalNotifier {
    fn channel(&self) -> &str {
        "journal"
    }

    fn deliver(&self, event: &NotificationEvent) -> Delivery {
        use std::io::Write;

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => return Delivery::Failed(err.to_string()),
        };
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path);
        match file {
            Ok(mut file) => match writeln!(file, "{line}") {
                Ok(()) => Delivery::Sent,
                Err(err) => Delivery::Failed(err.to_string()),
            },
            Err(err) => Delivery::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::open_incident;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Flaky {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Notifier for Flaky {
        fn channel(&self) -> &str {
            self.name
        }

        fn deliver(&self, _event: &NotificationEvent) -> Delivery {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Delivery::Failed("webhook unreachable".into())
            } else {
                Delivery::Sent
            }
        }
    }

    #[test]
    fn failure_does_not_short_circuit_other_channels() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(Flaky {
            name: "chat",
            fail: true,
            calls: first.clone(),
        }));
        registry.register(Box::new(Flaky {
            name: "pager",
            fail: false,
            calls: second.clone(),
        }));

        let incident = open_incident("inc-a", Severity::High, true);
        let event = NotificationEvent::new(
            NotificationKind::ApprovalRequest,
            &incident,
            None,
            Status::PendingApproval,
        );
        let results = registry.dispatch(&event);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Delivery::Failed(_)));
        assert_eq!(results[1].1, Delivery::Sent);
    }

    #[test]
    fn journal_notifier_appends_json_lines() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let path = format!("/tmp/responder-tests/journal-{nanos}.jsonl");
        std::fs::create_dir_all("/tmp/responder-tests").expect("mkdir");

        let notifier = JournalNotifier::new(&path);
        let incident = open_incident("inc-a", Severity::Low, false);
        let event =
            NotificationEvent::new(NotificationKind::Resolved, &incident, None, Status::Resolved);

        assert_eq!(notifier.deliver(&event), Delivery::Sent);
        assert_eq!(notifier.deliver(&event), Delivery::Sent);

        let contents = std::fs::read_to_string(&path).expect("read journal");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(parsed["incidentId"], "inc-a");
        assert_eq!(parsed["status"], "RESOLVED");
    }
}
