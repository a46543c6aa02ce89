//! Tagger engine: effect execution against the inbox, the remote stores and
//! the operator.
mod alerts;
mod driver;
mod error;
mod events;
mod http;
mod machine_id;
mod mapping;
mod metrics;
mod persist;
mod registry;
mod resolver;
mod runner;
mod settings;

pub use alerts::{AlertSink, HttpAlertSink, NullAlertSink};
pub use driver::{pause, wait_for, UiDriver};
pub use error::{DriverError, RemoteError, RemoteFailure, ResolverError};
pub use events::{ChannelEventSink, Clock, EventSink, FixedClock, SystemClock};
pub use machine_id::{generate_machine_id, load_or_create_machine_id};
pub use mapping::{HttpMappingStore, MappingEntry, MappingStore, MemoryMappingStore};
pub use metrics::CollectedMetrics;
pub use persist::{ensure_state_dir, read_state_file, AtomicFileWriter, PersistError};
pub use registry::{HttpPanelRegistry, PanelRegistry, StaticPanelRegistry};
pub use resolver::{parse_letter, LetterResolver, OperatorPrompt, PendingResolution};
pub use runner::{PipelineRunner, RunSummary};
pub use settings::{PipelineSettings, RemoteSettings, ResolverSettings, WaitBudget};
