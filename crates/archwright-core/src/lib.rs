pub mod course;
pub mod graph;
pub mod rules;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod templates;

pub use course::{
    Course, CourseProgress, CourseStatus, PlanStep, ProgressStatus, StepProgress, StepStatus,
    TransitionError,
};
pub use graph::{
    default_source_anchor, default_target_anchor, make_edge_id, Anchor, Edge, Graph, GraphError,
    Node, Position, Size, DEFAULT_NODE_KIND, SEED_NODE_ID,
};
pub use settings::{ai_configured, read_settings, write_settings, Settings, SettingsError};
pub use snapshot::{ConversationTurn, DiagramSnapshot, Role};
pub use store::{data_dir, BlobStore, FsBlobStore, MemoryBlobStore, StoreError};
