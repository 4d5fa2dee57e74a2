//! Tracking state shared by both engines.
//!
//! - [`registry`]: the durable JSON store of what the user asked to watch
//! - [`snapshot`]: the per-cycle view of every concrete watched file
//! - [`layout`] and [`artifacts`]: where outputs live and how they are named
//!
//! # Usage
//!
//! ```no_run
//! use vigil::tracking::{Snapshot, TargetRegistry};
//! use vigil::{EngineKind, Layout};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> anyhow::Result<()> {
//! let layout = Layout::new(EngineKind::Backup, PathBuf::from("/srv/vigil/backup"));
//! layout.ensure_exists()?;
//!
//! let mut registry = TargetRegistry::open(&layout)?;
//! registry.register(Path::new("/home/user/notes.txt"), "user")?;
//!
//! let snapshot = Snapshot::build(&layout, &mut registry)?;
//! println!("watching {} files", snapshot.len());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod layout;
pub mod registry;
pub mod snapshot;

pub use registry::{TargetEntry, TargetRegistry};
pub use snapshot::{FileTimes, MetadataRecord, Snapshot, TrackedPath};
