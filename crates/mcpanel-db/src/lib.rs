pub mod db;
pub mod history;
pub mod versions;

// Re-export commonly used items
pub use db::{init_db, open};
pub use history::{HistoryLedger, RECENT_LIMIT};
pub use versions::ServerVersionStore;
