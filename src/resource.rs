//! Resource provider module
//!
//! Abstracts where served bytes come from. The content engine only needs an
//! async readable, seekable handle plus its stat information, so anything
//! from a real directory tree to an in-memory cursor can back it.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeek};

/// Stat information for an opened resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Base name, used for extension-based content typing
    pub name: String,
    pub is_dir: bool,
    /// `None` when the length is unknown
    pub size: Option<u64>,
    /// `None` when the modification time is unknown
    pub modified: Option<DateTime<Utc>>,
}

/// An opened resource, closed when dropped
pub struct OpenResource<R> {
    pub content: R,
    pub info: ResourceInfo,
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Source of resources addressed by slash-separated names
pub trait ResourceProvider: Send + Sync + 'static {
    type Content: AsyncRead + AsyncSeek + Unpin + Send + 'static;

    fn open(
        &self,
        name: &str,
    ) -> impl Future<Output = io::Result<OpenResource<Self::Content>>> + Send;

    /// Entries of the directory `name`, sorted by name
    fn list(&self, name: &str) -> impl Future<Output = io::Result<Vec<DirEntry>>> + Send;
}

/// Provider rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirProvider {
    root: PathBuf,
}

impl DirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request name onto a path under the root
    ///
    /// `.` and empty segments are dropped; `..` is refused so a name can
    /// never climb out of the root.
    pub fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in name.split(['/', '\\']) {
            match Path::new(segment).components().next() {
                None | Some(Component::CurDir) => {}
                Some(Component::Normal(part)) => path.push(part),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("refusing path segment {segment:?}"),
                    ))
                }
            }
        }
        Ok(path)
    }
}

impl ResourceProvider for DirProvider {
    type Content = fs::File;

    async fn open(&self, name: &str) -> io::Result<OpenResource<fs::File>> {
        let path = self.resolve(name)?;
        let content = fs::File::open(&path).await?;
        let meta = content.metadata().await?;

        let info = ResourceInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_dir: meta.is_dir(),
            size: meta.is_file().then_some(meta.len()),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        };
        Ok(OpenResource { content, info })
    }

    async fn list(&self, name: &str) -> io::Result<Vec<DirEntry>> {
        let mut dir = fs::read_dir(self.resolve(name)?).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type().await?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_resolve_stays_under_root() {
        let provider = DirProvider::new("/srv/files");
        assert_eq!(
            provider.resolve("/a/./b//c.txt").unwrap(),
            PathBuf::from("/srv/files/a/b/c.txt")
        );
        assert_eq!(provider.resolve("/").unwrap(), PathBuf::from("/srv/files"));
        assert_eq!(
            provider.resolve("/a/../../etc/passwd").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_open_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let provider = DirProvider::new(dir.path());

        let mut file = provider.open("/hello.txt").await.unwrap();
        assert_eq!(file.info.name, "hello.txt");
        assert_eq!(file.info.size, Some(5));
        assert!(!file.info.is_dir);
        assert!(file.info.modified.is_some());
        let mut text = String::new();
        file.content.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "hello");

        let sub = provider.open("/sub").await.unwrap();
        assert!(sub.info.is_dir);
        assert_eq!(sub.info.size, None);

        let missing = provider.open("/nope").await.err().unwrap();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("c")).unwrap();

        let entries = DirProvider::new(dir.path()).list("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c"]);
        assert!(entries[2].is_dir);
    }
}
