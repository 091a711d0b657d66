use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Estado del ciclo de vida de una tarea de investigación.
///
/// El orden es total: Pending < Initializing < Starting < Running < {Completed, Failed}.
/// Completed y Failed son absorbentes y mutuamente excluyentes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Initializing,
    Starting,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub const ALL: [TaskState; 6] = [
        TaskState::Pending,
        TaskState::Initializing,
        TaskState::Starting,
        TaskState::Running,
        TaskState::Completed,
        TaskState::Failed,
    ];

    /// Posición en el orden del ciclo de vida (los dos terminales comparten rango).
    pub fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Initializing => 1,
            TaskState::Starting => 2,
            TaskState::Running => 3,
            TaskState::Completed | TaskState::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Un estado no terminal puede quedarse igual o avanzar; nunca retroceder.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Initializing => "initializing",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot inmutable de una tarea. El store reemplaza el snapshot completo
/// en cada transición, nunca campo por campo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub query: String,
    pub session_id: Option<String>,
    pub state: TaskState,

    /// Último mensaje de progreso (se sobrescribe, no se acumula)
    pub progress: Option<String>,
    /// Sólo presente con state = Completed
    pub result: Option<String>,
    /// Sólo presente con state = Failed
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, query: String, session_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            query,
            session_id,
            state: TaskState::Pending,
            progress: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
