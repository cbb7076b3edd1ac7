//! Utility modules for claude-slash
//!
//! - [`fs`] - directory copies, atomic writes, the directory swap primitive
//!   and content digests
//! - [`progress`] - terminal spinners that respect `--no-progress`

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, copy_dir, dir_digest, ensure_dir, swap_dir_into_place};
pub use progress::Spinner;
