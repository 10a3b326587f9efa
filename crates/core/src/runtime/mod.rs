//! Structured-concurrency helpers shared by the bus and the DAG scheduler.

mod cancel;
mod task_scope;

pub use cancel::CancelToken;
pub use task_scope::TaskScope;
