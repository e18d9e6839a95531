pub mod clock;
pub mod dictation;
pub mod error;
pub mod repository;
pub mod store;
pub mod views;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dictation::{capture_utterance, DictationError, DictationSource, Fragment, LineDictation, Transcript};
pub use error::{JournalError, StoreError};
pub use repository::{connected_ids, InfluenceRepository};
pub use store::{InfluenceStore, MemoryStore, SqliteStore};
pub use views::{build_graph, timeline};
