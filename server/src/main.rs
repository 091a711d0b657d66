mod config;
mod error;
mod executor;
mod handlers;
mod orchestrator;
mod progress;
mod state;
mod store;

use crate::config::Config;
use crate::executor::{ExecutorAdapter, HttpResearchExecutor, ResearchExecutor};
use crate::orchestrator::Orchestrator;
use crate::progress::{Pacing, ProgressEmitter};
use crate::state::AppState;
use crate::store::TaskStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::log_filter(config::debug_mode())));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    if config.debug {
        debug!("config: {:?}", config);
    }

    let executor: Option<Arc<dyn ResearchExecutor>> = match &config.executor_url {
        Some(url) => {
            info!("executor de investigación remoto en {}", url);
            Some(Arc::new(HttpResearchExecutor::new(url.clone())))
        }
        None => {
            warn!("RESEARCH_EXECUTOR_URL no definida, las tareas usarán la respuesta de demostración");
            None
        }
    };

    let adapter = ExecutorAdapter::new(executor, config.research_timeout);
    info!("plazo máximo por investigación: {:?}", adapter.timeout());

    let orchestrator = Orchestrator::new(
        Arc::new(TaskStore::new()),
        ProgressEmitter::new(Pacing::scaled(config.progress_pacing)),
        adapter,
    );

    // router HTTP
    let app = handlers::build_router(AppState::new(orchestrator.clone()));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!("servidor escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let abandoned = orchestrator.shutdown(config.shutdown_grace).await;
    if abandoned > 0 {
        warn!("{} investigaciones quedaron sin terminar al apagar", abandoned);
    } else {
        info!("apagado limpio, sin investigaciones en curso");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("no se pudo escuchar ctrl-c: {:?}", e);
        std::future::pending::<()>().await;
    }
    info!("señal de apagado recibida, dejando de aceptar peticiones");
}
