use common::TaskState;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::debug;

use crate::store::{Applied, TaskStore, Transition};

/// Narrativa fija que se muestra antes de invocar al executor.
/// No refleja las etapas reales del executor; es un guion de presentación.
pub const NARRATIVE: [&str; 21] = [
    "Initializing Deep Research Agent system...",
    "Parsing and analyzing research query structure...",
    "Activating LeadResearcher Agent...",
    "Configuring search parameters for Azure AI Search...",
    "Initializing document retrieval systems...",
    "Starting multi-agent orchestration process...",
    "LeadResearcher Agent: Delegating tasks to specialist agents...",
    "Search Agent: Querying internal document indexes...",
    "CredibilityAgent: Preparing source validation criteria...",
    "SummarizerAgent: Initializing content analysis engines...",
    "ReportWriterAgent: Setting up report generation framework...",
    "ReflectionAgent: Configuring quality validation processes...",
    "CitationAgent: Preparing reference management system...",
    "Executing deep search across knowledge base...",
    "Processing retrieved documents and data sources...",
    "CredibilityAgent: Assessing source reliability and quality...",
    "SummarizerAgent: Creating structured content summaries...",
    "ReportWriterAgent: Generating comprehensive research report...",
    "ReflectionAgent: Validating report completeness and accuracy...",
    "CitationAgent: Finalizing references and citations...",
    "Multi-agent research process completed successfully!",
];

/// Pausas entre mensajes según el tipo de trabajo que anuncian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub deep_search: Duration,
    pub heavy: Duration,
    pub standard: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            deep_search: Duration::from_millis(1000),
            heavy: Duration::from_millis(800),
            standard: Duration::from_millis(400),
        }
    }
}

impl Pacing {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            deep_search: Duration::ZERO,
            heavy: Duration::ZERO,
            standard: Duration::ZERO,
        }
    }

    /// Pausas por defecto multiplicadas por `factor` (PROGRESS_PACING).
    /// Un factor que no da una duración representable deja las pausas por defecto.
    pub fn scaled(factor: f64) -> Self {
        Self::try_scaled(factor).unwrap_or_default()
    }

    /// Como `scaled`, pero devuelve None si `factor` no es finito o si alguna
    /// pausa desborda `Duration`. Los factores negativos cuentan como 0.
    pub fn try_scaled(factor: f64) -> Option<Self> {
        if !factor.is_finite() {
            return None;
        }
        let factor = factor.max(0.0);
        let scale = |d: Duration| Duration::try_from_secs_f64(d.as_secs_f64() * factor).ok();

        let base = Self::default();
        Some(Self {
            deep_search: scale(base.deep_search)?,
            heavy: scale(base.heavy)?,
            standard: scale(base.standard)?,
        })
    }

    pub fn delay_for(&self, message: &str) -> Duration {
        let lower = message.to_lowercase();
        if message.contains("Executing deep search") {
            self.deep_search
        } else if lower.contains("generating") || lower.contains("processing") {
            self.heavy
        } else {
            self.standard
        }
    }
}

/// Estado que corresponde al paso `index` de un guion de `total` mensajes:
/// primer tercio Initializing, segundo tercio Starting, el resto Running.
pub fn state_for_step(index: usize, total: usize) -> TaskState {
    if index * 3 < total {
        TaskState::Initializing
    } else if index * 3 < total * 2 {
        TaskState::Starting
    } else {
        TaskState::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narration {
    Finished,
    /// La tarea desapareció del store a mitad del guion
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    script: Arc<[String]>,
    pacing: Pacing,
}

impl ProgressEmitter {
    pub fn new(pacing: Pacing) -> Self {
        Self::with_script(NARRATIVE.iter().map(|m| m.to_string()).collect(), pacing)
    }

    pub fn with_script(script: Vec<String>, pacing: Pacing) -> Self {
        Self {
            script: script.into(),
            pacing,
        }
    }

    /// Recorre el guion escribiendo cada mensaje en la tarea y avanzando su estado.
    /// Antes de cada escritura verifica que la tarea siga en el store; si no,
    /// abandona el resto del guion en silencio.
    pub async fn run(&self, store: &TaskStore, task_id: &str) -> Narration {
        let total = self.script.len();

        for (i, message) in self.script.iter().enumerate() {
            if !store.contains(task_id) {
                debug!("tarea {} ya no está en el store, se corta la narrativa", task_id);
                return Narration::Abandoned;
            }

            let state = state_for_step(i, total);
            let applied = store.apply(
                task_id,
                Transition::Advance {
                    state,
                    progress: message.clone(),
                },
            );
            if applied != Applied::Committed {
                debug!("tarea {}: paso {} descartado ({:?})", task_id, i, applied);
            }

            let delay = self.pacing.delay_for(message);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            debug!("tarea {} progreso [{}/{}] {}: {}", task_id, i + 1, total, state, message);
        }

        Narration::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn estados_por_tercios_del_guion() {
        let states: Vec<TaskState> = (0..21).map(|i| state_for_step(i, 21)).collect();
        assert!(states[..7].iter().all(|s| *s == TaskState::Initializing));
        assert!(states[7..14].iter().all(|s| *s == TaskState::Starting));
        assert!(states[14..].iter().all(|s| *s == TaskState::Running));

        assert_eq!(state_for_step(0, 1), TaskState::Initializing);
        assert_eq!(state_for_step(2, 3), TaskState::Running);
    }

    #[test]
    fn pausa_segun_categoria_del_mensaje() {
        let p = Pacing::default();
        assert_eq!(p.delay_for("Executing deep search across knowledge base..."), Duration::from_millis(1000));
        assert_eq!(p.delay_for("Processing retrieved documents..."), Duration::from_millis(800));
        assert_eq!(p.delay_for("ReportWriterAgent: Generating report"), Duration::from_millis(800));
        assert_eq!(p.delay_for("Activating LeadResearcher Agent..."), Duration::from_millis(400));
    }

    #[test]
    fn scaled_multiplica_y_ignora_factores_invalidos() {
        let half = Pacing::scaled(0.5);
        assert_eq!(half.standard, Duration::from_millis(200));
        assert_eq!(Pacing::scaled(0.0), Pacing::none());
        assert_eq!(Pacing::scaled(f64::NAN), Pacing::default());
        assert_eq!(Pacing::scaled(-2.0), Pacing::none());
    }

    #[test]
    fn factor_enorme_no_desborda_y_usa_el_default() {
        assert!(Pacing::try_scaled(1e20).is_none());
        assert!(Pacing::try_scaled(f64::INFINITY).is_none());
        assert_eq!(Pacing::scaled(1e20), Pacing::default());
        assert_eq!(Pacing::try_scaled(2.0).unwrap().deep_search, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn narrativa_avanza_monotona_hasta_running() {
        let store = Arc::new(TaskStore::new());
        let id = store.create("q".to_string(), None).id.clone();
        let emitter = ProgressEmitter::new(Pacing::default());

        let expected: Duration = NARRATIVE.iter().map(|m| Pacing::default().delay_for(m)).sum();
        let start = Instant::now();

        let handle = {
            let store = store.clone();
            let id = id.clone();
            let emitter = emitter.clone();
            tokio::spawn(async move { emitter.run(&store, &id).await })
        };

        let mut seen = Vec::new();
        while !handle.is_finished() {
            let t = store.get(&id).unwrap();
            seen.push(t.state);
            if t.state != TaskState::Pending {
                assert!(t.progress.as_deref().is_some_and(|p| !p.is_empty()));
            }
            sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(handle.await.unwrap(), Narration::Finished);
        assert!(start.elapsed() >= expected);
        assert!(seen.windows(2).all(|w| w[0].rank() <= w[1].rank()));
        assert!(seen.contains(&TaskState::Starting));

        let t = store.get(&id).unwrap();
        assert_eq!(t.state, TaskState::Running);
        assert_eq!(t.progress.as_deref(), Some(NARRATIVE[20]));
    }

    #[tokio::test(start_paused = true)]
    async fn narrativa_se_abandona_si_la_tarea_desaparece() {
        let store = Arc::new(TaskStore::new());
        let id = store.create("q".to_string(), None).id.clone();
        let emitter = ProgressEmitter::new(Pacing::default());

        let handle = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move { emitter.run(&store, &id).await })
        };

        sleep(Duration::from_millis(900)).await;
        store.evict(&id);

        assert_eq!(handle.await.unwrap(), Narration::Abandoned);
    }

    #[tokio::test]
    async fn guion_vacio_termina_sin_escribir() {
        let store = TaskStore::new();
        let id = store.create("q".to_string(), None).id.clone();
        let emitter = ProgressEmitter::with_script(Vec::new(), Pacing::none());

        assert_eq!(emitter.run(&store, &id).await, Narration::Finished);
        assert_eq!(store.get(&id).unwrap().state, TaskState::Pending);
    }
}
