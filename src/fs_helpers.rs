use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

pub fn ensure_directory(fs_path: &Path) -> Result<(), Error> {
    if !fs_path.exists() {
        if let Err(e) = std::fs::create_dir_all(fs_path) {
            if e.kind() == ErrorKind::AlreadyExists {
                return Ok(());
            }
            return Err(e);
        }
    } else if !fs_path.is_dir() {
        // use ErrorKind::NotADirectory when it becomes stable
        return Err(Error::new(
            ErrorKind::Other,
            format!("spill location {fs_path:?} should be a directory"),
        ));
    }
    Ok(())
}

/// Picks the directory for the `index`-th spill file, spreading files over
/// all configured locations.
pub fn spill_directory(directories: &[PathBuf], index: usize) -> Result<&Path, Error> {
    if directories.is_empty() {
        return Err(Error::new(
            ErrorKind::NotFound,
            "no temporary directory configured for spill files",
        ));
    }
    let directory = &directories[index % directories.len()];
    ensure_directory(directory)?;
    Ok(directory)
}
