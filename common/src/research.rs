use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, TaskState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Vacía o ausente => la petición se rechaza sin crear tarea
    #[serde(default)]
    pub query: String,

    /// Sesión del cliente; se guarda con la tarea pero no se interpreta
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub task_id: TaskId,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl From<&Task> for ResearchResult {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.state,
            result: task.result.clone(),
            error: task.error.clone(),
            progress: task.progress.clone(),
        }
    }
}
