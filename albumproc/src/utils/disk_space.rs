//! Free-space probing

use std::io;
use std::path::Path;

/// Reports bytes available to an unprivileged writer on the filesystem holding `path`
pub trait SpaceProbe: Send + Sync {
    fn available(&self, path: &Path) -> io::Result<u64>;
}

/// Real probe backed by `statvfs`/`GetDiskFreeSpaceEx` via fs2
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn available(&self, path: &Path) -> io::Result<u64> {
        // The scratch root may not exist yet; probe its nearest existing ancestor
        let mut probe_path = path;
        while !probe_path.exists() {
            match probe_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => probe_path = parent,
                _ => {
                    probe_path = Path::new(".");
                    break;
                }
            }
        }
        fs2::available_space(probe_path)
    }
}

/// Bytes required to extract an archive of `archive_size` bytes
pub fn required_space(archive_size: u64, floor: u64) -> u64 {
    archive_size.saturating_mul(2).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_required_space() {
        assert_eq!(required_space(10, 100), 100);
        assert_eq!(required_space(500, 100), 1000);
        assert_eq!(required_space(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_probe_missing_directory_uses_ancestor() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("not").join("yet").join("created");

        let available = FsSpaceProbe.available(&missing).unwrap();
        assert!(available > 0);
    }
}
