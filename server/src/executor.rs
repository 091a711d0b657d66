use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{error, info, warn};

use common::TaskState;

use crate::error::ExecutorError;
use crate::store::{Applied, TaskStore, Transition};

pub const PROGRESS_EXECUTING: &str = "Executing core research logic...";
pub const PROGRESS_COMPLETED: &str = "Research completed successfully! Results ready for display.";
pub const PROGRESS_TIMED_OUT: &str = "Research timed out - please try a more specific query";

/// Capacidad externa que hace la investigación real. Puede tardar lo que
/// quiera y fallar; el adapter le impone su propio plazo.
#[async_trait]
pub trait ResearchExecutor: Send + Sync {
    async fn research(&self, query: &str) -> Result<String, ExecutorError>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Executor remoto: POST {"query": ...} a una URL, espera {"result": ...}
/// o {"error": ...} si la investigación falló. No aplica timeout propio.
#[derive(Debug, Clone)]
pub struct HttpResearchExecutor {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct ExecutorRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct ExecutorReply {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpResearchExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ResearchExecutor for HttpResearchExecutor {
    async fn research(&self, query: &str) -> Result<String, ExecutorError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&ExecutorRequest { query })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ExecutorError::Status(resp.status()));
        }

        let reply: ExecutorReply = resp.json().await?;
        match (reply.result, reply.error) {
            (_, Some(error)) => Err(ExecutorError::Failed(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ExecutorError::Failed(
                "research executor returned neither result nor error".to_string(),
            )),
        }
    }
}

/// Respuesta de demostración para cuando no hay executor disponible.
pub fn fallback_result(query: &str) -> String {
    format!(
        r#"# Research Results for: {query}

## Summary
This is a test response generated while the Deep Research Agent system is initializing.

## Key Findings
- The research query "{query}" has been received and processed
- The multi-agent system is working on your request
- Real research capabilities will be available once the agent system is fully initialized

## Status
- System Status: Testing Mode
- Agent Initialization: In Progress
- Research Capability: Basic Simulation

*Note: This is a demonstration response. Full research capabilities will be available once all components are properly configured.*
"#
    )
}

pub fn timeout_error(limit: Duration) -> String {
    let secs = limit.as_secs();
    let human = if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if secs >= 1 {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    } else {
        format!("{} ms", limit.as_millis())
    };
    format!("Research timed out after {}", human)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Completada con la respuesta de demostración
    Fallback,
    TimedOut,
    Failed,
}

/// Envuelve al executor con un plazo y traduce su resultado a una
/// transición terminal.
#[derive(Clone)]
pub struct ExecutorAdapter {
    executor: Option<Arc<dyn ResearchExecutor>>,
    timeout: Duration,
}

impl ExecutorAdapter {
    pub fn new(executor: Option<Arc<dyn ResearchExecutor>>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    pub fn is_available(&self) -> bool {
        self.executor.as_ref().is_some_and(|e| e.is_available())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, store: &TaskStore, task_id: &str, query: &str) -> Outcome {
        store.apply(
            task_id,
            Transition::Advance {
                state: TaskState::Running,
                progress: PROGRESS_EXECUTING.to_string(),
            },
        );

        let executor = match &self.executor {
            Some(executor) if executor.is_available() => executor.clone(),
            _ => {
                warn!("tarea {}: executor no disponible, usando respuesta de demostración", task_id);
                finish(
                    store,
                    task_id,
                    Transition::Complete {
                        result: fallback_result(query),
                        progress: PROGRESS_COMPLETED.to_string(),
                    },
                );
                return Outcome::Fallback;
            }
        };

        info!("tarea {}: iniciando investigación para {:?}", task_id, query);

        // Al vencer el plazo se descarta el future; lo que el executor haya
        // lanzado por su cuenta puede seguir corriendo, pero ya no escribe aquí.
        match timeout(self.timeout, executor.research(query)).await {
            Ok(Ok(result)) => {
                info!("tarea {}: investigación completada ({} caracteres)", task_id, result.len());
                finish(
                    store,
                    task_id,
                    Transition::Complete {
                        result,
                        progress: PROGRESS_COMPLETED.to_string(),
                    },
                );
                Outcome::Completed
            }
            Ok(Err(e)) => {
                error!("tarea {}: error del executor: {}", task_id, e);
                finish(
                    store,
                    task_id,
                    Transition::Fail {
                        error: e.to_string(),
                        progress: format!("Research failed: {}", e),
                    },
                );
                Outcome::Failed
            }
            Err(_) => {
                error!("tarea {}: la investigación superó el plazo de {:?}", task_id, self.timeout);
                finish(
                    store,
                    task_id,
                    Transition::Fail {
                        error: timeout_error(self.timeout),
                        progress: PROGRESS_TIMED_OUT.to_string(),
                    },
                );
                Outcome::TimedOut
            }
        }
    }
}

fn finish(store: &TaskStore, task_id: &str, transition: Transition) {
    let target = transition.target();
    match store.apply(task_id, transition) {
        Applied::Committed => info!("tarea {} -> {}", task_id, target),
        other => warn!("tarea {}: escritura tardía {} descartada ({:?})", task_id, target, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use tokio::time::{sleep, Instant};

    struct Echo;

    #[async_trait]
    impl ResearchExecutor for Echo {
        async fn research(&self, query: &str) -> Result<String, ExecutorError> {
            Ok(format!("informe sobre {}", query))
        }
    }

    struct Sleepy(Duration);

    #[async_trait]
    impl ResearchExecutor for Sleepy {
        async fn research(&self, _query: &str) -> Result<String, ExecutorError> {
            sleep(self.0).await;
            Ok("demasiado tarde".to_string())
        }
    }

    struct Boom;

    #[async_trait]
    impl ResearchExecutor for Boom {
        async fn research(&self, _query: &str) -> Result<String, ExecutorError> {
            Err(ExecutorError::Failed("boom".to_string()))
        }
    }

    struct Offline;

    #[async_trait]
    impl ResearchExecutor for Offline {
        async fn research(&self, _query: &str) -> Result<String, ExecutorError> {
            Err(ExecutorError::Failed("no debería llamarse".to_string()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    const LIMIT: Duration = Duration::from_secs(15 * 60);

    fn setup(query: &str) -> (TaskStore, String) {
        let store = TaskStore::new();
        let id = store.create(query.to_string(), None).id.clone();
        (store, id)
    }

    #[tokio::test]
    async fn exito_completa_con_el_resultado() {
        let (store, id) = setup("rust");
        let adapter = ExecutorAdapter::new(Some(Arc::new(Echo)), LIMIT);

        assert_eq!(adapter.run(&store, &id, "rust").await, Outcome::Completed);

        let t = store.get(&id).unwrap();
        assert_eq!(t.state, TaskState::Completed);
        assert_eq!(t.result.as_deref(), Some("informe sobre rust"));
        assert_eq!(t.progress.as_deref(), Some(PROGRESS_COMPLETED));
        assert!(t.error.is_none());
    }

    #[tokio::test]
    async fn error_del_executor_queda_tal_cual() {
        let (store, id) = setup("Z");
        let adapter = ExecutorAdapter::new(Some(Arc::new(Boom)), LIMIT);

        assert_eq!(adapter.run(&store, &id, "Z").await, Outcome::Failed);

        let t = store.get(&id).unwrap();
        assert_eq!(t.state, TaskState::Failed);
        assert_eq!(t.error.as_deref(), Some("boom"));
        assert_eq!(t.progress.as_deref(), Some("Research failed: boom"));
        assert!(t.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn executor_lento_falla_por_timeout_a_los_15_minutos() {
        let (store, id) = setup("Y");
        let adapter = ExecutorAdapter::new(Some(Arc::new(Sleepy(Duration::from_secs(16 * 60)))), LIMIT);
        let start = Instant::now();

        assert_eq!(adapter.run(&store, &id, "Y").await, Outcome::TimedOut);
        assert!(start.elapsed() >= LIMIT);
        assert!(start.elapsed() < Duration::from_secs(16 * 60));

        let t = store.get(&id).unwrap();
        assert_eq!(t.state, TaskState::Failed);
        assert_eq!(t.error.as_deref(), Some("Research timed out after 15 minutes"));
        assert!(t.result.is_none());

        // una escritura tardía del executor no puede revivir la tarea
        let late = store.apply(
            &id,
            Transition::Complete {
                result: "demasiado tarde".to_string(),
                progress: PROGRESS_COMPLETED.to_string(),
            },
        );
        assert_eq!(late, Applied::AlreadyTerminal(TaskState::Failed));
        sleep(Duration::from_secs(120)).await;
        assert_eq!(store.get(&id).unwrap().state, TaskState::Failed);
    }

    #[tokio::test]
    async fn sin_executor_usa_respuesta_de_demostracion() {
        let (store, id) = setup("X");
        let adapter = ExecutorAdapter::new(None, LIMIT);
        assert!(!adapter.is_available());

        assert_eq!(adapter.run(&store, &id, "X").await, Outcome::Fallback);

        let t = store.get(&id).unwrap();
        assert_eq!(t.state, TaskState::Completed);
        let result = t.result.as_deref().unwrap();
        assert!(result.contains("Research Results for: X"));
        assert!(result.contains("demonstration response"));
    }

    #[tokio::test]
    async fn executor_no_disponible_tambien_usa_demostracion() {
        let (store, id) = setup("X");
        let adapter = ExecutorAdapter::new(Some(Arc::new(Offline)), LIMIT);
        assert!(!adapter.is_available());

        assert_eq!(adapter.run(&store, &id, "X").await, Outcome::Fallback);
        assert_eq!(store.get(&id).unwrap().state, TaskState::Completed);
    }

    #[test]
    fn timeout_error_describe_el_plazo() {
        assert_eq!(timeout_error(LIMIT), "Research timed out after 15 minutes");
        assert_eq!(timeout_error(Duration::from_secs(60)), "Research timed out after 1 minute");
        assert_eq!(timeout_error(Duration::from_secs(90)), "Research timed out after 90 seconds");
        assert_eq!(timeout_error(Duration::from_millis(250)), "Research timed out after 250 ms");
    }

    async fn spawn_executor_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/research", addr)
    }

    #[tokio::test]
    async fn http_executor_devuelve_el_campo_result() {
        let router = Router::new().route(
            "/research",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(serde_json::json!({ "result": format!("ok: {}", body["query"].as_str().unwrap_or("")) }))
            }),
        );
        let url = spawn_executor_server(router).await;

        let exec = HttpResearchExecutor::new(url);
        assert_eq!(exec.research("rust").await.unwrap(), "ok: rust");
    }

    #[tokio::test]
    async fn http_executor_propaga_el_error_del_cuerpo() {
        let router = Router::new().route(
            "/research",
            post(|| async { Json(serde_json::json!({ "error": "boom" })) }),
        );
        let url = spawn_executor_server(router).await;

        let exec = HttpResearchExecutor::new(url);
        match exec.research("rust").await {
            Err(e @ ExecutorError::Failed(_)) => assert_eq!(e.to_string(), "boom"),
            other => panic!("se esperaba Failed, llegó {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_executor_mapea_status_de_error() {
        let router = Router::new().route(
            "/research",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = spawn_executor_server(router).await;

        let exec = HttpResearchExecutor::new(url);
        match exec.research("rust").await {
            Err(ExecutorError::Status(s)) => assert_eq!(s.as_u16(), 500),
            other => panic!("se esperaba error de status, llegó {:?}", other),
        }
    }
}
