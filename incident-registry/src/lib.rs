use serde::{Deserialize, Serialize};

/// Canonical ingestion payload, schema `incident.v1`.
/// Every adapter normalizes its source format into this shape before the
/// orchestrator sees it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalIncidentV1 {
    pub schema: String,
    /// Empty when the source did not supply one; the orchestrator assigns
    /// an id at ingestion in that case.
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub source: String,
    pub metadata: serde_json::Value,
    pub auto_approve: bool,
    pub occurred_at: String,
}

pub fn validate_incident_v1(incident: &CanonicalIncidentV1) -> Result<(), String> {
    if incident.schema != "incident.v1" {
        return Err(format!("unsupported schema '{}'", incident.schema));
    }
    if incident.title.trim().is_empty() {
        return Err("title is required".into());
    }
    match incident.severity.to_lowercase().as_str() {
        "low" | "medium" | "high" | "critical" => {}
        other => return Err(format!("invalid severity '{other}'")),
    }
    if incident.source.trim().is_empty() {
        return Err("source is required".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalIncidentV1 {
        CanonicalIncidentV1 {
            schema: "incident.v1".into(),
            incident_id: "inc-1".into(),
            title: "High CPU Alert".into(),
            description: "CPU utilization exceeded 90%".into(),
            severity: "high".into(),
            source: "cloudwatch".into(),
            metadata: serde_json::json!({}),
            auto_approve: false,
            occurred_at: "1".into(),
        }
    }

    #[test]
    fn validates_incident_v1() {
        assert!(validate_incident_v1(&sample()).is_ok());
    }

    #[test]
    fn rejects_unknown_schema() {
        let mut incident = sample();
        incident.schema = "alert.v1".into();
        assert!(validate_incident_v1(&incident).is_err());
    }

    #[test]
    fn rejects_invalid_severity() {
        let mut incident = sample();
        incident.severity = "urgent".into();
        assert!(validate_incident_v1(&incident).is_err());
    }

    #[test]
    fn allows_missing_incident_id() {
        let mut incident = sample();
        incident.incident_id = "".into();
        assert!(validate_incident_v1(&incident).is_ok());
    }
}
