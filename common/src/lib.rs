pub mod health;
pub mod research;
pub mod task;

pub use health::HealthResponse;
pub use research::{ResearchRequest, ResearchResponse, ResearchResult};
pub use task::{Task, TaskId, TaskState};
