//! Crash-safe file replacement.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MAX_LINK_HOPS: usize = 40;

/// Write `bytes` to `path` by writing a sibling temp file and renaming it
/// over the target. Creates the parent directory if needed.
///
/// A symlinked `path` is followed, so the file it points at is replaced and
/// the link itself stays in place.
pub fn write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let path = &resolve_links(path)?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Follow symlinks until a non-link (or missing) path. Dangling links
/// resolve to the path they name.
fn resolve_links(path: &Path) -> io::Result<PathBuf> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = std::fs::read_link(&current)?;
                current = match current.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
            }
            _ => return Ok(current),
        }
    }
    Err(io::Error::other(format!(
        "too many levels of symbolic links: {}",
        path.display()
    )))
}
