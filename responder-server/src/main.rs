mod adapters;
mod routes;

use responder_core::context::{ContextGatherer, NullLogs, NullMetrics, RunbookDir};
use responder_core::gate::ApprovalPolicy;
use responder_core::notify::{
    notification_channel, spawn_notifier, ConsoleNotifier, JournalNotifier, NotifierRegistry,
};
use responder_core::orchestrator::{spawn_worker, Collaborators, Orchestrator};
use responder_core::postmortem::FileSink;
use responder_core::reasoner::{HeuristicReasoner, LlmConfig, LlmReasoner, Reasoner};
use responder_core::store::SqliteStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path = std::env::var("INCIDENTS_DB").unwrap_or_else(|_| "incidents.db".into());
    let store = Arc::new(SqliteStore::open(&db_path).expect("open incident store"));

    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(ConsoleNotifier));
    if let Ok(path) = std::env::var("NOTIFY_JOURNAL") {
        registry.register(Box::new(JournalNotifier::new(path)));
    }
    let (notify_tx, notify_rx) = notification_channel();
    spawn_notifier(registry, notify_rx);

    let reasoner: Arc<dyn Reasoner> = match build_llm_config_from_env() {
        Some(config) => {
            info!(model = %config.model, "llm reasoner enabled");
            Arc::new(LlmReasoner::new(config))
        }
        None => {
            info!("no llm key configured, using heuristic reasoner");
            Arc::new(HeuristicReasoner)
        }
    };

    let runbooks_dir = std::env::var("RUNBOOKS_DIR").unwrap_or_else(|_| "runbooks".into());
    let postmortems_dir =
        std::env::var("POSTMORTEMS_DIR").unwrap_or_else(|_| "postmortems".into());

    let (trigger_tx, trigger_rx) = std::sync::mpsc::channel();
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        ApprovalPolicy::from_env(),
        Collaborators {
            gatherer: ContextGatherer::new(
                Arc::new(NullMetrics),
                Arc::new(NullLogs),
                Arc::new(RunbookDir::new(runbooks_dir)),
            ),
            reasoner,
            runner: Arc::new(responder_core::executor::SimulatedRunner),
            postmortems: Arc::new(FileSink::new(postmortems_dir)),
        },
        notify_tx,
        trigger_tx,
    ));
    spawn_worker(orchestrator.clone(), trigger_rx);

    let app = routes::router(routes::AppState {
        orchestrator,
        store,
    });
    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("bind listener");

    info!(%bind, "responder-server listening");
    axum::serve(listener, app).await.expect("serve");
}

fn build_llm_config_from_env() -> Option<LlmConfig> {
    let api_key_env = std::env::var("LLM_API_KEY_ENV").unwrap_or_else(|_| "OPENAI_API_KEY".into());
    if std::env::var(&api_key_env).is_err() {
        return None;
    }

    Some(LlmConfig {
        provider: std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".into()),
        model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        api_key_env,
        temperature: std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.2),
    })
}
