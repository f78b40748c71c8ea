#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod hub;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod summary;
pub mod tracker;

pub use config::{Config, ALLOWED_EXTENSIONS};
pub use domain::{
    FileId, FileRecord, FileState, Language, ModelKey, ProgressEvent, Segment, Summary,
    SummaryStatus, Word,
};
pub use error::{CoreError, CoreResult};
pub use history::HistoryStore;
pub use hub::{EventSink, Hub, SessionId};
pub use ports::{
    CancelCheck, DocRenderer, Llm, Normalizer, ProgressCb, RunnerError, TranscribeMeta,
    Transcriber,
};
pub use registry::{ListFilter, ListResult, Registry, Statistics};
pub use scheduler::{BatchResult, JobHandle, Scheduler, SubmitRequest};
pub use summary::SummaryOrchestrator;

// Silence unused dev-dependency warnings until the axum crate wires up
// integration tests against these fakes.
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;
