//! Server module - what lives on the game server itself
//!
//! - Server software switching (mcjars forks, versions, builds)
//! - Installed worlds, active world and datapack targets
//! - server.properties parser and editor
//! - EULA handling
//! - server-icon.png

pub mod eula;
pub mod icon;
pub mod properties;
pub mod version;
pub mod worlds;

pub use eula::EulaStatus;
pub use properties::ServerProperties;
pub use version::{BuildSource, CurrentVersion, SwitchRequest, VersionService};
pub use worlds::{InstalledWorlds, WorldEntry, WorldService};
