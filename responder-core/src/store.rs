use crate::error::StoreError;
use crate::incident::Incident;
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Versioned incident persistence. Append-only: a revision is never
/// overwritten or deleted, and reads resolve to the maximum revision
/// timestamp per incident.
pub trait IncidentStore: Send + Sync {
    /// Append a new revision. `expected_prev` is the revision timestamp this
    /// operation observed when it read the incident (`None` for a fresh
    /// incident); the write fails with `StoreError::Conflict` if another
    /// revision landed in between.
    fn append(&self, incident: &Incident, expected_prev: Option<i64>) -> Result<(), StoreError>;

    fn latest(&self, incident_id: &str) -> Result<Option<Incident>, StoreError>;

    /// Full revision history, oldest first.
    fn revisions(&self, incident_id: &str) -> Result<Vec<Incident>, StoreError>;

    /// Latest revision per incident, most recently touched first.
    fn list_latest(&self, limit: usize) -> Result<Vec<Incident>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db_path = PathBuf::from(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS incident_revisions (
                incident_id TEXT NOT NULL,
                revision_ts INTEGER NOT NULL,
                status TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (incident_id, revision_ts)
            );
            CREATE INDEX IF NOT EXISTS idx_revisions_ts ON incident_revisions(revision_ts);
            ",
        )?;

        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&*self.db_path)?)
    }
}

impl IncidentStore for SqliteStore {
    fn append(&self, incident: &Incident, expected_prev: Option<i64>) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: Option<i64> = tx.query_row(
            "SELECT MAX(revision_ts) FROM incident_revisions WHERE incident_id = ?1",
            params![incident.incident_id],
            |row| row.get(0),
        )?;

        if found != expected_prev {
            return Err(StoreError::Conflict {
                incident_id: incident.incident_id.clone(),
                expected: expected_prev,
                found,
            });
        }
        if let Some(prev) = found {
            if incident.revision_timestamp <= prev {
                return Err(StoreError::Conflict {
                    incident_id: incident.incident_id.clone(),
                    expected: expected_prev,
                    found,
                });
            }
        }

        let status = serde_json::to_string(&incident.status)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let body =
            serde_json::to_string(incident).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        tx.execute(
            "INSERT INTO incident_revisions (incident_id, revision_ts, status, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                incident.incident_id,
                incident.revision_timestamp,
                status,
                body,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn latest(&self, incident_id: &str) -> Result<Option<Incident>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM incident_revisions
             WHERE incident_id = ?1
             ORDER BY revision_ts DESC
             LIMIT 1",
        )?;

        let mut rows = stmt.query(params![incident_id])?;
        match rows.next()? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(parse_body(&body)?))
            }
            None => Ok(None),
        }
    }

    fn revisions(&self, incident_id: &str) -> Result<Vec<Incident>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM incident_revisions
             WHERE incident_id = ?1
             ORDER BY revision_ts ASC",
        )?;

        let rows = stmt.query_map(params![incident_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(parse_body(&row?)?);
        }
        Ok(out)
    }

    fn list_latest(&self, limit: usize) -> Result<Vec<Incident>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM incident_revisions r
             WHERE revision_ts = (
                 SELECT MAX(revision_ts) FROM incident_revisions
                 WHERE incident_id = r.incident_id
             )
             ORDER BY revision_ts DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(parse_body(&row?)?);
        }
        Ok(out)
    }
}

fn parse_body(body: &str) -> Result<Incident, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::open_incident;
    use crate::incident::{Severity, Status};

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/responder-tests/{name}-{nanos}.db")
    }

    #[test]
    fn append_and_latest_roundtrip() {
        let store = SqliteStore::open(&db_path("roundtrip")).expect("open");
        let incident = open_incident("inc-a", Severity::High, true);

        store.append(&incident, None).expect("append");

        let loaded = store.latest("inc-a").expect("latest").expect("present");
        assert_eq!(loaded, incident);
    }

    #[test]
    fn latest_reads_are_identical_without_writes() {
        let store = SqliteStore::open(&db_path("idempotent-read")).expect("open");
        let incident = open_incident("inc-a", Severity::Low, false);
        store.append(&incident, None).expect("append");

        let first = store.latest("inc-a").expect("latest");
        let second = store.latest("inc-a").expect("latest");
        assert_eq!(first, second);
    }

    #[test]
    fn latest_resolves_to_maximum_revision() {
        let store = SqliteStore::open(&db_path("max-revision")).expect("open");
        let first = open_incident("inc-a", Severity::High, true);
        store.append(&first, None).expect("append first");

        let mut second = first.next_revision();
        second.status = Status::PendingApproval;
        store
            .append(&second, Some(first.revision_timestamp))
            .expect("append second");

        let loaded = store.latest("inc-a").expect("latest").expect("present");
        assert_eq!(loaded.status, Status::PendingApproval);
        assert_eq!(loaded.revision_timestamp, second.revision_timestamp);

        let history = store.revisions("inc-a").expect("revisions");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, Status::Open);
    }

    #[test]
    fn conditional_append_rejects_stale_writer() {
        let store = SqliteStore::open(&db_path("conflict")).expect("open");
        let first = open_incident("inc-a", Severity::High, true);
        store.append(&first, None).expect("append first");

        let mut second = first.next_revision();
        second.status = Status::PendingApproval;
        store
            .append(&second, Some(first.revision_timestamp))
            .expect("append second");

        // A racing writer that also read `first` must be rejected.
        let mut stale = first.next_revision();
        stale.status = Status::InProgress;
        let err = store
            .append(&stale, Some(first.revision_timestamp))
            .expect_err("stale write");
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn conditional_append_rejects_duplicate_create() {
        let store = SqliteStore::open(&db_path("dup-create")).expect("open");
        let incident = open_incident("inc-a", Severity::High, true);
        store.append(&incident, None).expect("append");

        let err = store.append(&incident, None).expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn list_latest_dedupes_by_incident() {
        let store = SqliteStore::open(&db_path("list-latest")).expect("open");

        let a1 = open_incident("inc-a", Severity::High, true);
        store.append(&a1, None).expect("a1");
        let mut a2 = a1.next_revision();
        a2.status = Status::Resolved;
        store
            .append(&a2, Some(a1.revision_timestamp))
            .expect("a2");

        let b1 = open_incident("inc-b", Severity::Low, false);
        store.append(&b1, None).expect("b1");

        let listed = store.list_latest(50).expect("list");
        assert_eq!(listed.len(), 2);

        let mut ids: Vec<&str> = listed.iter().map(|i| i.incident_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 2);

        let a = listed
            .iter()
            .find(|i| i.incident_id == "inc-a")
            .expect("inc-a listed");
        assert_eq!(a.status, Status::Resolved);
        assert_eq!(a.revision_timestamp, a2.revision_timestamp);
    }
}
