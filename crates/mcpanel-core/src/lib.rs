pub mod error;
pub mod types;

// Re-export commonly used items
pub use error::{AddonError, ErrorInfo, Result};
pub use types::{
    ConfigFormat,
    ContentItem,
    ContentKind,
    ContentVersion,
    DownloadSpec,
    HistoryEntry,
    HistoryRecord,
    JobKind,
    JobPhase,
    JobStatus,
    MinecraftVersion,
    PackType,
    ProgressRecord,
    ProviderKind,
    SearchPage,
};
