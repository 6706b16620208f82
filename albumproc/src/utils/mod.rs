//! Utility modules for albumproc

pub mod disk_space;
pub mod fs_ops;

pub use disk_space::{FsSpaceProbe, SpaceProbe};
pub use fs_ops::{dir_size, move_dir, remove_dir_if_exists, sha256_file};
