//! Named-pipe helpers used on both ends of a session.

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// Creates a FIFO at `path`, replacing whatever stale node was there.
pub fn create_fifo(path: &Path) -> io::Result<()> {
    remove_fifo(path)?;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Removes `path` if it exists.
pub fn remove_fifo(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn is_fifo(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.file_type().is_fifo())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rendezvous");

        create_fifo(&path).unwrap();
        assert!(is_fifo(&path));

        // Recreating over an existing node is fine.
        create_fifo(&path).unwrap();
        assert!(is_fifo(&path));

        remove_fifo(&path).unwrap();
        assert!(!path.exists());
        remove_fifo(&path).unwrap();
    }

    #[test]
    fn test_regular_file_is_not_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        fs::write(&path, b"x").unwrap();
        assert!(!is_fifo(&path));
    }
}
