//! An in-memory hierarchical filesystem. Used as a neutral input where
//! a collaborator (or a test) supplies sources without touching disk.

use crate::util::FileSource;

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

/// Metadata for one VFS entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stat {
    pub is_dir: bool,
    pub len: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Vfs {
    root: BTreeMap<String, Node>,
}

impl Vfs {
    pub fn new() -> Self {
        Vfs::default()
    }

    /// Adds a file, creating parent directories. An existing file at
    /// the path is replaced.
    pub fn add_file(
        &mut self,
        path: impl AsRef<Path>,
        contents: impl Into<Vec<u8>>,
    ) {
        let parts = normal_components(path.as_ref());
        if parts.is_empty() {
            return;
        }
        let mut dir = &mut self.root;
        for part in &parts[..parts.len() - 1] {
            let entry = dir
                .entry(part.clone())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match entry {
                Node::Dir(children) => children,
                Node::File(_) => {
                    *entry = Node::Dir(BTreeMap::new());
                    match entry {
                        Node::Dir(children) => children,
                        Node::File(_) => unreachable!(),
                    }
                }
            };
        }
        dir.insert(
            parts[parts.len() - 1].clone(),
            Node::File(contents.into()),
        );
    }

    fn lookup(&self, path: &Path) -> Option<&Node> {
        let parts = normal_components(path);
        let mut node: Option<&Node> = None;
        let mut dir = &self.root;
        for part in &parts {
            let next = dir.get(part)?;
            if let Node::Dir(children) = next {
                dir = children;
            } else if part != parts.last().unwrap() {
                return None;
            }
            node = Some(next);
        }
        node
    }

    /// Opens a file, returning its contents.
    pub fn open(&self, path: impl AsRef<Path>) -> io::Result<&[u8]> {
        match self.lookup(path.as_ref()) {
            Some(Node::File(bytes)) => Ok(bytes),
            Some(Node::Dir(_)) => Err(io::Error::new(
                io::ErrorKind::Other,
                "is a directory",
            )),
            None => Err(not_found(path.as_ref())),
        }
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> io::Result<Stat> {
        match self.lookup(path.as_ref()) {
            Some(Node::File(bytes)) => Ok(Stat {
                is_dir: false,
                len: bytes.len(),
            }),
            Some(Node::Dir(children)) => Ok(Stat {
                is_dir: true,
                len: children.len(),
            }),
            None => Err(not_found(path.as_ref())),
        }
    }

    /// The sorted entry names of a directory.
    pub fn read_dir(&self, path: impl AsRef<Path>) -> io::Result<Vec<String>> {
        let path = path.as_ref();
        let children = if normal_components(path).is_empty() {
            &self.root
        } else {
            match self.lookup(path) {
                Some(Node::Dir(children)) => children,
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "not a directory",
                    ))
                }
                None => return Err(not_found(path)),
            }
        };
        Ok(children.keys().cloned().collect())
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> io::Result<String> {
        let bytes = self.open(path.as_ref())?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e)
        })
    }

    /// A new VFS rooted at a subdirectory.
    pub fn sub(&self, path: impl AsRef<Path>) -> io::Result<Vfs> {
        let path = path.as_ref();
        if normal_components(path).is_empty() {
            return Ok(self.clone());
        }
        match self.lookup(path) {
            Some(Node::Dir(children)) => Ok(Vfs {
                root: children.clone(),
            }),
            Some(Node::File(_)) => Err(io::Error::new(
                io::ErrorKind::Other,
                "not a directory",
            )),
            None => Err(not_found(path)),
        }
    }
}

impl FileSource for Vfs {
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let scoped = self.sub(root)?;
        let mut out = Vec::new();
        walk(&scoped.root, PathBuf::new(), &mut out);
        out.sort();
        Ok(out)
    }

    fn read_file(&self, root: &Path, rel: &Path) -> io::Result<String> {
        self.read_file(root.join(rel))
    }
}

fn walk(dir: &BTreeMap<String, Node>, prefix: PathBuf, out: &mut Vec<PathBuf>) {
    for (name, node) in dir {
        let path = prefix.join(name);
        match node {
            Node::File(_) => {
                if path.extension().map_or(false, |ext| ext == "rs") {
                    out.push(path);
                }
            }
            Node::Dir(children) => walk(children, path, out),
        }
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => {
                Some(part.to_string_lossy().into_owned())
            }
            _ => None,
        })
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such path: {}", path.display()),
    )
}

#[cfg(test)]
mod vfs_tests {
    use super::*;

    use rstest::*;

    fn sample() -> Vfs {
        let mut vfs = Vfs::new();
        vfs.add_file("blog/api.rs", "fn a() {}");
        vfs.add_file("blog/notes.md", "notes");
        vfs.add_file("user/auth.rs", "fn b() {}");
        vfs
    }

    #[rstest]
    fn open_and_stat() {
        let vfs = sample();
        assert_eq!(vfs.open("blog/api.rs").unwrap(), b"fn a() {}");
        assert_eq!(
            vfs.stat("blog/api.rs").unwrap(),
            Stat {
                is_dir: false,
                len: 9
            }
        );
        assert!(vfs.stat("blog").unwrap().is_dir);
        assert!(vfs.open("missing.rs").is_err());
    }

    #[rstest]
    fn read_dir_is_sorted() {
        let vfs = sample();
        assert_eq!(vfs.read_dir("").unwrap(), vec!["blog", "user"]);
        assert_eq!(
            vfs.read_dir("blog").unwrap(),
            vec!["api.rs", "notes.md"]
        );
    }

    #[rstest]
    fn sub_scopes_the_tree() {
        let vfs = sample();
        let sub = vfs.sub("blog").unwrap();
        assert!(sub.open("api.rs").is_ok());
        assert!(sub.open("user/auth.rs").is_err());
    }

    #[rstest]
    fn file_source_lists_only_rust_files() {
        let vfs = sample();
        let files = vfs.list_files(Path::new("")).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("blog/api.rs"),
                PathBuf::from("user/auth.rs")
            ]
        );
    }
}
