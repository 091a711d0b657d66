use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,

    /// false => las tareas se resuelven con la respuesta de demostración
    pub executor_available: bool,
    /// Ejecuciones programadas que todavía no terminaron
    pub in_flight: usize,
    /// Cantidad de tareas por estado ("pending", "running", ...)
    pub tasks: BTreeMap<String, usize>,
}
