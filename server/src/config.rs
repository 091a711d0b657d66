use std::{env, time::Duration};
use tracing::warn;

use crate::progress::Pacing;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_RESEARCH_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
pub const DEFAULT_PROGRESS_PACING: f64 = 1.0;

/// Configuración del servidor, leída una vez desde variables de entorno.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// Techo de tiempo para una llamada al executor de investigación
    pub research_timeout: Duration,
    /// None => modo degradado (respuesta de demostración)
    pub executor_url: Option<String>,
    /// Multiplicador de las pausas de la narrativa (0 = sin pausas)
    pub progress_pacing: f64,
    pub shutdown_grace: Duration,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            research_timeout: Duration::from_secs(DEFAULT_RESEARCH_TIMEOUT_SECS),
            executor_url: None,
            progress_pacing: DEFAULT_PROGRESS_PACING,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            debug: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let progress_pacing = checked_pacing(parse_or(
            "PROGRESS_PACING",
            env::var("PROGRESS_PACING").ok(),
            defaults.progress_pacing,
        ));

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or("PORT", env::var("PORT").ok(), defaults.port),
            research_timeout: Duration::from_secs(parse_or(
                "RESEARCH_TIMEOUT_SECS",
                env::var("RESEARCH_TIMEOUT_SECS").ok(),
                DEFAULT_RESEARCH_TIMEOUT_SECS,
            )),
            executor_url: env::var("RESEARCH_EXECUTOR_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            progress_pacing,
            shutdown_grace: Duration::from_secs(parse_or(
                "SHUTDOWN_GRACE_SECS",
                env::var("SHUTDOWN_GRACE_SECS").ok(),
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )),
            debug: debug_mode(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// DEBUG_MODE se lee aparte porque hace falta antes de inicializar los logs.
pub fn debug_mode() -> bool {
    parse_flag(env::var("DEBUG_MODE").ok())
}

/// Filtro de logs por defecto; RUST_LOG lo reemplaza si está definida.
pub fn log_filter(debug: bool) -> &'static str {
    if debug {
        "server=debug,tower_http=debug,axum=info"
    } else {
        "server=info,tower_http=info,axum=info"
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(s) => match s.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("valor inválido para {}: {:?}, usando el valor por defecto", name, s);
                default
            }
        },
    }
}

/// El factor tiene que ser no negativo y dar pausas representables.
fn checked_pacing(factor: f64) -> f64 {
    if factor >= 0.0 && Pacing::try_scaled(factor).is_some() {
        factor
    } else {
        warn!("PROGRESS_PACING={} no es válido, usando {}", factor, DEFAULT_PROGRESS_PACING);
        DEFAULT_PROGRESS_PACING
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    raw.map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
