//! Self-update of an installed command set.
//!
//! An update replaces the installation directory with the resource directory
//! of the latest published release. It never leaves a mix of old and new
//! files behind: the new tree is staged next to the installation and swapped
//! in with directory renames, and any failure after the pre-update backup
//! was taken restores that backup.
//!
//! # Components
//!
//! - [`InstallationLocator`] / [`Installation`]: where the commands live
//! - [`ReleaseClient`]: release index lookup and archive download
//! - [`archive`]: zip extraction into staging
//! - [`BackupManager`]: timestamped sibling backups
//! - [`UpdateLock`]: one update per installation at a time
//! - [`UpdateManager`]: the state machine tying them together
//!
//! # On-disk layout
//!
//! ```text
//! <parent>/commands/                          installation
//! <parent>/commands.backup.<timestamp>/       backups
//! <parent>/.commands.version                  installed release tag
//! <parent>/.commands.update.lock              update lock
//! <parent>/.commands.staging-XXXXXX/          staging (removed after use)
//! ```

pub mod archive;
pub mod backup;
pub mod installation;
pub mod lock;
pub mod manager;
pub mod release;

pub use backup::{Backup, BackupManager};
pub use installation::{InstallScope, Installation, InstallationLocator};
pub use lock::UpdateLock;
pub use manager::{
    RollbackOutcome, RunOutcome, UpdateFailure, UpdateManager, UpdatePhase, UpdateProgress,
    UpdateResult, UpdateStatus,
};
pub use release::{ReleaseClient, ReleaseDescriptor, ReleaseTag, parse_release_index};
