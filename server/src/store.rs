// server/src/store.rs

use chrono::Utc;
use common::{Task, TaskId, TaskState};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Cambio atómico sobre una tarea. Cada variante fija juntos todos los campos
/// que dependen del estado. Sólo `Complete` y `Fail` llegan a un estado
/// terminal; un `Advance` hacia Completed o Failed se rechaza en `apply`.
#[derive(Debug, Clone)]
pub enum Transition {
    Advance { state: TaskState, progress: String },
    Complete { result: String, progress: String },
    Fail { error: String, progress: String },
}

impl Transition {
    pub fn target(&self) -> TaskState {
        match self {
            Transition::Advance { state, .. } => *state,
            Transition::Complete { .. } => TaskState::Completed,
            Transition::Fail { .. } => TaskState::Failed,
        }
    }

    fn apply_to(self, current: &Task) -> Task {
        let mut next = current.clone();
        next.updated_at = Utc::now();
        match self {
            Transition::Advance { state, progress } => {
                next.state = state;
                next.progress = Some(progress);
            }
            Transition::Complete { result, progress } => {
                next.state = TaskState::Completed;
                next.result = Some(result);
                next.error = None;
                next.progress = Some(progress);
            }
            Transition::Fail { error, progress } => {
                next.state = TaskState::Failed;
                next.error = Some(error);
                next.result = None;
                next.progress = Some(progress);
            }
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Committed,
    /// Ya había una escritura terminal; ésta se descarta
    AlreadyTerminal(TaskState),
    /// El estado pedido es anterior al actual; se descarta
    Backward {
        current: TaskState,
        requested: TaskState,
    },
    /// `Advance` pidió un estado terminal sin resultado ni error; se descarta
    TerminalWithoutOutcome(TaskState),
}

/// Registro concurrente de tareas. Cada entrada es un snapshot inmutable
/// (`Arc<Task>`) que se reemplaza entero en cada transición: un lector ve el
/// snapshot anterior o el nuevo, nunca una mezcla.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Arc<Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Los snapshots se cambian de una sola vez, un lock envenenado no deja datos a medias.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Crea una tarea en Pending con un id nuevo y la deja visible de inmediato.
    pub fn create(&self, query: String, session_id: Option<String>) -> Arc<Task> {
        let mut tasks = self.write();
        let mut id = uuid::Uuid::new_v4().to_string();
        while tasks.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let task = Arc::new(Task::new(id.clone(), query, session_id));
        tasks.insert(id, task.clone());
        task
    }

    pub fn get(&self, id: &str) -> Option<Arc<Task>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Aplica una transición de forma atómica.
    ///
    /// La primera escritura terminal gana: cualquier escritura posterior sobre
    /// una tarea terminal se descarta, igual que un intento de retroceder.
    ///
    /// # Panics
    /// Si la tarea no existe. Sólo la ejecución dueña de la tarea la modifica,
    /// así que un id desconocido es un error de programación.
    pub fn apply(&self, id: &str, transition: Transition) -> Applied {
        let outcome = {
            let mut tasks = self.write();
            tasks.get_mut(id).map(|slot| {
                let current = slot.state;
                let requested = transition.target();
                if current.is_terminal() {
                    Applied::AlreadyTerminal(current)
                } else if matches!(transition, Transition::Advance { .. }) && requested.is_terminal() {
                    Applied::TerminalWithoutOutcome(requested)
                } else if !current.can_advance_to(requested) {
                    Applied::Backward { current, requested }
                } else {
                    *slot = Arc::new(transition.apply_to(slot));
                    Applied::Committed
                }
            })
        };

        match outcome {
            Some(applied) => applied,
            None => panic!("transición sobre una tarea inexistente: {}", id),
        }
    }

    /// Quita una tarea del registro. El core nunca lo llama; existe para una
    /// política externa de expiración.
    #[allow(dead_code)]
    pub fn evict(&self, id: &str) -> Option<Arc<Task>> {
        self.write().remove(id)
    }

    /// Cantidad de tareas por estado, en el orden del ciclo de vida.
    pub fn counts(&self) -> Vec<(TaskState, usize)> {
        let tasks = self.read();
        TaskState::ALL
            .iter()
            .map(|state| (*state, tasks.values().filter(|t| t.state == *state).count()))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
