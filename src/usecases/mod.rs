//! Use Cases Layer - The Account Task Orchestration Core
//!
//! Coordinates registry membership, scheduled and streamed work,
//! bounded-concurrency execution, and publication. Each component is
//! failure-isolated: one account's trouble never touches another's.
//!
//! Components:
//! - `AccountRegistry`: process-wide (account, mode) membership
//! - `TaskQueue`: ordered hand-off between scheduler and workers
//! - `Publisher`: lazily-connecting fire-and-forget sink
//! - `PollScheduler`: registry -> tasks on two cadences
//! - `WorkerPool`: N concurrent task consumers
//! - `StreamSupervisor`: one supervised session per streaming account

pub mod publisher;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod stream_supervisor;
pub mod worker_pool;

pub use publisher::Publisher;
pub use queue::TaskQueue;
pub use registry::AccountRegistry;
pub use scheduler::PollScheduler;
pub use stream_supervisor::StreamSupervisor;
pub use worker_pool::WorkerPool;
