//! Small utilities shared across the compiler.

pub mod vfs;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Where the pipeline reads application sources from. The OS
/// implementation is the default; tests drive the pipeline through the
/// in-memory [`vfs::Vfs`].
pub trait FileSource {
    /// Relative paths of the `.rs` files under `root`, sorted.
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_file(&self, root: &Path, rel: &Path) -> io::Result<String>;
}

/// Reads straight from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFiles;

impl FileSource for OsFiles {
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            // The root itself is always walked, whatever its name.
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name.starts_with('.') && name.len() > 1) && name != "target"
        });
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "rs") {
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .to_path_buf();
                out.push(rel);
            }
        }
        out.sort();
        Ok(out)
    }

    fn read_file(&self, root: &Path, rel: &Path) -> io::Result<String> {
        fs::read_to_string(root.join(rel))
    }
}

#[cfg(test)]
mod util_tests {
    use super::*;

    use rstest::*;
    use std::io::Write;

    #[rstest]
    fn os_files_lists_sorted_rust_files() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["b/api.rs", "a/api.rs", "a/notes.txt"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let mut f = fs::File::create(path).unwrap();
            writeln!(f, "// {}", rel).unwrap();
        }

        let files = OsFiles.list_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("a/api.rs"), PathBuf::from("b/api.rs")]
        );

        let text = OsFiles
            .read_file(dir.path(), Path::new("a/api.rs"))
            .unwrap();
        assert!(text.contains("a/api.rs"));
    }
}
