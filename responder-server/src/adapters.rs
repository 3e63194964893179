use incident_registry::{validate_incident_v1, CanonicalIncidentV1};
use responder_core::incident::{NewIncident, Severity};

pub trait PayloadAdapter: Send + Sync + 'static {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalIncidentV1, String>;
}

/// Direct ingestion: the payload already carries incident fields.
pub struct GenericAdapter;

/// CloudWatch alarm state-change events. EventBridge wraps the alarm under
/// `detail`; SNS notifications carry the same fields flat and PascalCase.
/// Both shapes are accepted, and alarm state maps onto severity.
pub struct CloudwatchAlarmAdapter;

impl PayloadAdapter for GenericAdapter {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalIncidentV1, String> {
        let incident = CanonicalIncidentV1 {
            schema: "incident.v1".into(),
            incident_id: payload
                .get("incidentId")
                .or_else(|| payload.get("incident_id"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            title: payload
                .get("title")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            description: payload
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            severity: payload
                .get("severity")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("medium")
                .to_lowercase(),
            source: payload
                .get("source")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("manual")
                .to_string(),
            metadata: payload
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({})),
            auto_approve: payload
                .get("autoApprove")
                .or_else(|| payload.get("auto_approve"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            occurred_at: current_timestamp(),
        };
        validate_incident_v1(&incident)?;
        Ok(incident)
    }
}

impl PayloadAdapter for CloudwatchAlarmAdapter {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalIncidentV1, String> {
        let detail = payload.get("detail").unwrap_or(payload);
        let alarm_name = detail
            .get("alarmName")
            .or_else(|| detail.get("AlarmName"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| "cloudwatch payload missing alarmName".to_string())?;
        let state = detail
            .get("state")
            .and_then(|state| state.get("value"))
            .or_else(|| detail.get("NewStateValue"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("ALARM");
        let reason = detail
            .get("state")
            .and_then(|state| state.get("reason"))
            .or_else(|| detail.get("NewStateReason"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let occurred_at = detail
            .get("state")
            .and_then(|state| state.get("timestamp"))
            .or_else(|| payload.get("time"))
            .or_else(|| detail.get("StateChangeTime"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(current_timestamp);

        let mut metadata = serde_json::json!({
            "alarmName": alarm_name,
            "state": state,
        });
        if let Some(fields) = metadata.as_object_mut() {
            if let Some(arn) = detail
                .get("alarmArn")
                .or_else(|| payload.get("resources").and_then(|r| r.get(0)))
            {
                fields.insert("alarmArn".into(), arn.clone());
            }
            for key in ["account", "region"] {
                if let Some(value) = payload.get(key) {
                    fields.insert(key.into(), value.clone());
                }
            }
        }

        let incident = CanonicalIncidentV1 {
            schema: "incident.v1".into(),
            incident_id: String::new(),
            title: alarm_name.to_string(),
            description: if reason.is_empty() {
                format!("CloudWatch alarm {alarm_name} entered state {state}")
            } else {
                reason.to_string()
            },
            severity: map_alarm_state(state).to_string(),
            source: "cloudwatch".into(),
            metadata,
            auto_approve: false,
            occurred_at,
        };
        validate_incident_v1(&incident)?;
        Ok(incident)
    }
}

fn map_alarm_state(state: &str) -> &'static str {
    match state {
        "ALARM" => "high",
        "INSUFFICIENT_DATA" => "medium",
        "OK" => "low",
        _ => "medium",
    }
}

/// Canonical payload to orchestrator input. An empty incident id becomes
/// `None` so the orchestrator assigns one; the source occurrence time rides
/// along in metadata.
pub fn to_new_incident(canonical: CanonicalIncidentV1) -> NewIncident {
    let mut metadata = canonical.metadata;
    if !canonical.occurred_at.is_empty() {
        if let Some(fields) = metadata.as_object_mut() {
            fields
                .entry("occurredAt")
                .or_insert_with(|| serde_json::Value::String(canonical.occurred_at.clone()));
        }
    }

    NewIncident {
        incident_id: Some(canonical.incident_id).filter(|id| !id.trim().is_empty()),
        title: canonical.title,
        description: canonical.description,
        severity: Severity::parse_or_default(&canonical.severity),
        source: canonical.source,
        metadata,
        auto_approve: canonical.auto_approve,
    }
}

fn current_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return "0".into();
    };
    duration.as_secs().to_string()
}
