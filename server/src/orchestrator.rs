use std::{
    any::Any,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use common::{Task, TaskId};
use tokio::{sync::Notify, task::JoinError, time::timeout};
use tracing::{error, info, warn};

use crate::error::OrchestratorError;
use crate::executor::ExecutorAdapter;
use crate::progress::{Narration, ProgressEmitter};
use crate::store::{TaskStore, Transition};

/// Contador de ejecuciones programadas, para el apagado ordenado.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Coordinador del ciclo de vida: crea tareas, programa su ejecución
/// (narrativa y luego executor) y atiende las lecturas de estado.
///
/// No guarda referencia a las ejecuciones en curso más allá del id de tarea;
/// sólo lleva la cuenta para poder esperar a que terminen al apagar.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<TaskStore>,
    emitter: ProgressEmitter,
    adapter: ExecutorAdapter,
    in_flight: Arc<InFlight>,
}

impl Orchestrator {
    pub fn new(store: Arc<TaskStore>, emitter: ProgressEmitter, adapter: ExecutorAdapter) -> Self {
        Self {
            store,
            emitter,
            adapter,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Crea la tarea en Pending y programa su ejecución sin esperarla.
    /// Debe llamarse dentro de un runtime de tokio.
    pub fn submit(&self, query: &str, session_id: Option<String>) -> Result<Arc<Task>, OrchestratorError> {
        if query.trim().is_empty() {
            return Err(OrchestratorError::InvalidQuery);
        }

        let task = self.store.create(query.to_string(), session_id);
        info!("tarea de investigación creada: {}", task.id);

        let guard = self.in_flight.enter();
        let store = self.store.clone();
        let emitter = self.emitter.clone();
        let adapter = self.adapter.clone();
        let task_id = task.id.clone();
        let query = task.query.clone();

        tokio::spawn(async move {
            supervise(store, emitter, adapter, task_id, query).await;
            drop(guard);
        });

        Ok(task)
    }

    pub fn status(&self, task_id: &str) -> Result<Arc<Task>, OrchestratorError> {
        self.store
            .get(task_id)
            .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))
    }

    pub fn executor_available(&self) -> bool {
        self.adapter.is_available()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Espera hasta `grace` a que terminen las ejecuciones en curso.
    /// Devuelve cuántas quedaron sin terminar (siguen en estado no terminal).
    pub async fn shutdown(&self, grace: Duration) -> usize {
        if timeout(grace, self.in_flight.wait_idle()).await.is_err() {
            let pending = self.in_flight.current();
            warn!("apagado con {} ejecuciones sin terminar", pending);
            return pending;
        }
        0
    }
}

/// Corre la ejecución en su propia tarea y convierte cualquier panic en un
/// Failed, para que ninguna tarea quede colgada en un estado intermedio.
async fn supervise(
    store: Arc<TaskStore>,
    emitter: ProgressEmitter,
    adapter: ExecutorAdapter,
    task_id: TaskId,
    query: String,
) {
    let handle = {
        let store = store.clone();
        let task_id = task_id.clone();
        tokio::spawn(async move { execute(&store, &emitter, &adapter, &task_id, &query).await })
    };

    if let Err(e) = handle.await {
        let reason = describe_join_error(e);
        error!("tarea {}: fallo inesperado en la ejecución: {}", task_id, reason);

        if !store.contains(&task_id) {
            return;
        }
        store.apply(
            &task_id,
            Transition::Fail {
                error: format!("Internal error: {}", reason),
                progress: format!("Research failed: {}", reason),
            },
        );
    }
}

async fn execute(
    store: &TaskStore,
    emitter: &ProgressEmitter,
    adapter: &ExecutorAdapter,
    task_id: &str,
    query: &str,
) {
    if emitter.run(store, task_id).await == Narration::Abandoned {
        return;
    }
    let outcome = adapter.run(store, task_id, query).await;
    info!("tarea {} terminó: {:?}", task_id, outcome);
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "execution was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
