use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replace `path` with `data` through a temp file in the same directory.
///
/// The destination is only touched by the final rename, so a failed write
/// leaves any previous content in place. Returns the number of bytes written.
pub async fn write_atomic(path: &Path, data: bytes::Bytes) -> io::Result<u64> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &data))
        .await
        .map_err(io::Error::other)?
}

fn write_atomic_blocking(path: &Path, data: &[u8]) -> io::Result<u64> {
    let dir = parent_dir(path);
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(data.len() as u64)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
