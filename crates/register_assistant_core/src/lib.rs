pub mod domain;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod normalize;
pub mod ports;
pub mod reveal;
pub mod session;

pub use domain::{FileKind, RecordId, StagedFile, StudentRecord, TrackedRecord};
pub use error::{PipelineError, PipelineResult, ServiceErrorKind};
pub use gateway::ExtractionGateway;
pub use ingest::IngestionRouter;
pub use normalize::{normalize, normalize_with_rng};
pub use ports::{ExtractionService, PortError, PortResult};
pub use reveal::{Phase, RevealScheduler, Tick};
pub use session::{Generation, Notice, Session, SessionView};
