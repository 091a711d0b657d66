use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::{HealthResponse, ResearchRequest, ResearchResponse, ResearchResult, TaskState};
use reqwest::{Client, StatusCode};
use std::{env, time::Duration};
use tokio::time::{sleep, Instant};

/// - En Docker: RESEARCH_URL=http://server:8000
/// - Local: default http://localhost:8000
fn server_base_url() -> String {
    env::var("RESEARCH_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para lanzar y seguir investigaciones")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Envía una consulta nueva y muestra el id de la tarea
    Submit {
        #[arg(value_name = "CONSULTA")]
        query: String,

        /// Id de sesión opcional
        #[arg(long)]
        session: Option<String>,
    },
    /// Consulta el estado de una tarea
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Sondea la tarea hasta que termine, mostrando cada mensaje de progreso
    Wait {
        #[arg(value_name = "TASK_ID")]
        id: String,

        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,

        /// Tope del lado del cliente (por defecto algo más que el plazo del servidor)
        #[arg(long, default_value_t = 1200)]
        max_wait_secs: u64,
    },
    /// Estado del servicio y del executor
    Health,
}

async fn fetch_status(client: &Client, base_url: &str, id: &str) -> Result<Option<ResearchResult>> {
    let url = format!("{}/api/v1/research/{}", base_url, id);
    let resp = client.get(&url).send().await?;

    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !resp.status().is_success() {
        bail!("error consultando {} (status {})", url, resp.status());
    }
    Ok(Some(resp.json().await?))
}

fn print_result(r: &ResearchResult) {
    println!("Tarea:");
    println!("  id: {}", r.task_id);
    println!("  estado: {}", r.status);
    if let Some(ref p) = r.progress {
        println!("  progreso: {}", p);
    }
    if let Some(ref e) = r.error {
        println!("  error: {}", e);
    }
    if let Some(ref result) = r.result {
        println!();
        println!("{}", result);
    }
}

/// Una tarea que terminó en Failed se reporta como error del comando.
fn ensure_not_failed(r: &ResearchResult) -> Result<()> {
    if r.status == TaskState::Failed {
        bail!("la tarea {} terminó en estado failed", r.task_id);
    }
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = server_base_url();

    match cli.command {
        Commands::Submit { query, session } => {
            let url = format!("{}/api/v1/research", base_url);
            let req = ResearchRequest {
                query,
                session_id: session,
            };

            let resp = client.post(&url).json(&req).send().await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("el servidor rechazó la consulta (status {}): {}", status, body);
            }

            let created: ResearchResponse = resp.json().await?;
            println!("Investigación creada:");
            println!("  id: {}", created.task_id);
            println!("  estado: {}", created.status);
            println!("  mensaje: {}", created.message);
        }

        Commands::Status { id } => match fetch_status(&client, &base_url, &id).await? {
            Some(r) => print_result(&r),
            None => println!("No se encontró la tarea con id {id}"),
        },

        Commands::Wait {
            id,
            interval_ms,
            max_wait_secs,
        } => {
            let deadline = Instant::now() + Duration::from_secs(max_wait_secs);
            let interval = Duration::from_millis(interval_ms.max(100));
            let mut last_progress: Option<String> = None;
            let mut last_state: Option<TaskState> = None;

            loop {
                let Some(r) = fetch_status(&client, &base_url, &id).await? else {
                    bail!("no se encontró la tarea con id {}", id);
                };

                if last_state != Some(r.status) || last_progress != r.progress {
                    println!("[{}] {}", r.status, r.progress.as_deref().unwrap_or("..."));
                    last_state = Some(r.status);
                    last_progress = r.progress.clone();
                }

                if r.status.is_terminal() {
                    println!();
                    print_result(&r);
                    ensure_not_failed(&r)?;
                    break;
                }

                if Instant::now() >= deadline {
                    bail!("se agotó la espera de {}s (último estado: {})", max_wait_secs, r.status);
                }
                sleep(interval).await;
            }
        }

        Commands::Health => {
            let url = format!("{}/health", base_url);
            let resp = client.get(&url).send().await?;
            if !resp.status().is_success() {
                bail!("error consultando /health (status {})", resp.status());
            }

            let h: HealthResponse = resp.json().await?;
            println!("{} v{}", h.service, h.version);
            println!("  estado            : {}", h.status);
            println!("  executor          : {}", if h.executor_available { "disponible" } else { "modo demostración" });
            println!("  en vuelo          : {}", h.in_flight);
            println!("  tareas por estado :");
            for state in TaskState::ALL {
                let n = h.tasks.get(state.as_str()).copied().unwrap_or(0);
                println!("    {:<13}: {}", state.as_str(), n);
            }
        }
    }

    Ok(())
}
