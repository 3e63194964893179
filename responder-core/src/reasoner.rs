use crate::context::IncidentContext;
use crate::incident::Diagnosis;
use futures::executor::block_on;
use rig::client::{completion::CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai;
use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use tracing::warn;

/// Produces a root-cause hypothesis from assembled context. Must not fail:
/// internal errors degrade to a zero-confidence diagnosis.
pub trait Reasoner: Send + Sync {
    fn diagnose(&self, context: &IncidentContext) -> Diagnosis;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.2,
        }
    }
}

pub struct LlmReasoner {
    config: LlmConfig,
}

impl LlmReasoner {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    fn run(&self, context: &IncidentContext) -> Result<Diagnosis, String> {
        let metrics: Vec<&serde_json::Value> = context.metrics.iter().take(5).collect();
        let logs: Vec<&String> = context.logs.iter().take(10).collect();

        let prompt = format!(
            "You are an expert SRE analyzing an incident.\n\
             Return JSON only. Schema: {{\"diagnosis\":\"string\",\"confidence\":0-100}}\n\
             Incident: {}\n\
             Description: {}\n\
             Recent Metrics: {}\n\
             Recent Logs: {}\n\
             Runbooks Available: {} runbooks",
            context.incident.title,
            context.incident.description,
            serde_json::to_string(&metrics).map_err(|e| e.to_string())?,
            serde_json::to_string(&logs).map_err(|e| e.to_string())?,
            context.runbooks.len(),
        );

        let raw = run_prompt(
            &self.config,
            "You are an incident root-cause analyst.",
            &prompt,
        )?;
        Ok(parse_diagnosis(&raw))
    }
}

impl Reasoner for LlmReasoner {
    fn diagnose(&self, context: &IncidentContext) -> Diagnosis {
        match self.run(context) {
            Ok(diagnosis) => diagnosis,
            Err(err) => {
                warn!(
                    incident_id = %context.incident.incident_id,
                    error = %err,
                    "reasoner call failed, degrading to zero-confidence diagnosis"
                );
                Diagnosis {
                    diagnosis: "Unable to determine root cause".into(),
                    confidence: 0,
                    raw: None,
                    error: Some(err),
                }
            }
        }
    }
}

fn run_prompt(config: &LlmConfig, preamble: &str, prompt: &str) -> Result<String, String> {
    if config.provider.to_lowercase() != "openai" {
        return Err(format!("unsupported llm provider '{}'", config.provider));
    }

    let client = if config.api_key_env == "OPENAI_API_KEY" {
        openai::Client::from_env()
    } else {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| format!("missing env var {}", config.api_key_env))?;
        openai::Client::new(&api_key).map_err(|e| format!("openai client error: {e}"))?
    };

    let agent = client
        .agent(&config.model)
        .preamble(preamble)
        .temperature(config.temperature)
        .build();

    let fut = agent.prompt(prompt).into_future();
    let out: Result<String, _> = block_on(fut);
    out.map_err(|e| format!("llm prompt failed: {e}"))
}

/// Structured output is preferred; anything unparsable is still a usable
/// hypothesis, carried verbatim at degraded confidence.
fn parse_diagnosis(raw: &str) -> Diagnosis {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(raw) {
        if let Some(text) = v.get("diagnosis").and_then(serde_json::Value::as_str) {
            let confidence = v
                .get("confidence")
                .and_then(serde_json::Value::as_u64)
                .map(|c| c.min(100) as u8)
                .unwrap_or(75);
            return Diagnosis {
                diagnosis: text.to_string(),
                confidence,
                raw: Some(raw.to_string()),
                error: None,
            };
        }
    }

    Diagnosis {
        diagnosis: raw.to_string(),
        confidence: 75,
        raw: Some(raw.to_string()),
        error: None,
    }
}

/// Keyword fallback for environments without an LLM key configured.
pub struct HeuristicReasoner;

impl Reasoner for HeuristicReasoner {
    fn diagnose(&self, context: &IncidentContext) -> Diagnosis {
        let mut haystack = format!(
            "{} {}",
            context.incident.title, context.incident.description
        )
        .to_lowercase();
        for line in &context.logs {
            haystack.push(' ');
            haystack.push_str(&line.to_lowercase());
        }

        let (text, confidence) = if haystack.contains("cpu") {
            ("cpu saturation suspected from reported symptoms", 60)
        } else if haystack.contains("memory") || haystack.contains("oom") {
            ("memory pressure suspected from reported symptoms", 60)
        } else {
            ("no clear root cause from available signals", 25)
        };

        Diagnosis {
            diagnosis: text.into(),
            confidence,
            raw: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::open_incident;
    use crate::incident::Severity;

    #[test]
    fn parse_structured_diagnosis() {
        let raw = r#"{"diagnosis":"memory leak in app tier","confidence":85}"#;
        let parsed = parse_diagnosis(raw);
        assert_eq!(parsed.diagnosis, "memory leak in app tier");
        assert_eq!(parsed.confidence, 85);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn parse_clamps_confidence() {
        let raw = r#"{"diagnosis":"cpu runaway","confidence":400}"#;
        let parsed = parse_diagnosis(raw);
        assert_eq!(parsed.confidence, 100);
    }

    #[test]
    fn unparsable_output_degrades_to_75() {
        let raw = "The root cause appears to be high CPU on the app nodes.";
        let parsed = parse_diagnosis(raw);
        assert_eq!(parsed.diagnosis, raw);
        assert_eq!(parsed.confidence, 75);
        assert_eq!(parsed.raw.as_deref(), Some(raw));
    }

    #[test]
    fn structured_without_confidence_defaults_to_75() {
        let raw = r#"{"diagnosis":"disk full"}"#;
        let parsed = parse_diagnosis(raw);
        assert_eq!(parsed.diagnosis, "disk full");
        assert_eq!(parsed.confidence, 75);
    }

    #[test]
    fn heuristic_matches_cpu_keyword() {
        let incident = open_incident("inc-a", Severity::High, false);
        let ctx = IncidentContext {
            incident,
            metrics: Vec::new(),
            logs: Vec::new(),
            runbooks: Vec::new(),
        };
        let diagnosis = HeuristicReasoner.diagnose(&ctx);
        assert!(diagnosis.diagnosis.contains("cpu"));
        assert!(diagnosis.confidence > 0);
    }
}
