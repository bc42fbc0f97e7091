//! Service layer - the import engine
//!
//! Each stage of an import lives in its own module: normalization
//! (`timezone`, `description`, `normalize`, `identity`), matching,
//! rectangle computation, diffing and writing. `import` wires them together.

pub mod description;
pub mod diff;
pub mod identity;
pub mod import;
pub mod lock;
pub mod logging;
pub mod matching;
pub mod migration;
pub mod normalize;
pub mod rectangle;
pub mod timezone;
pub mod writer;

pub use diff::{ModifyPlan, Partition};
pub use import::{ImportPreview, ImportService, ImportSummary};
pub use lock::ImportLock;
pub use logging::{EventStats, LogEntry, LogEvent, LoggingService};
pub use matching::StoreIndex;
pub use migration::{MigrationResult, MigrationService};
pub use normalize::NormalizeReport;
pub use timezone::ZoneOrigin;
