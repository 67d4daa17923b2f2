pub mod analysis;
pub mod deps;
pub mod extract;
pub mod fetcher;
pub mod orchestrator;
pub mod rank;
pub mod relevance;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod summarizer;
pub mod traits;

pub use deps::EngineDeps;
pub use orchestrator::Orchestrator;
pub use scheduler::DueAuditScheduler;
pub use service::AuditService;
