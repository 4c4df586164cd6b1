//! # Local Filesystem Backend

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::backend::{ObjectBody, ObjectMetadata, ObjectStream, StorageBackend};
use super::config::StorageConfig;
use super::errors::{StorageError, StorageResult};
use super::path::PathResolver;
use super::signed_url::{RequestContext, SignedUrlIssuer, SignedUrlRequest};

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    resolver: PathResolver,
    signer: SignedUrlIssuer,
}

impl LocalBackend {
    /// Create a new local backend from validated configuration. The root
    /// directory is not touched.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        Ok(Self {
            resolver: PathResolver::new(&config.storage_root_path),
            signer: SignedUrlIssuer::new(config)?,
        })
    }

    /// Create a backend and make sure the root directory exists
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        let backend = Self::new(config)?;
        fs::create_dir_all(&config.storage_root_path)
            .await
            .map_err(|e| StorageError::on_write(&config.storage_root_path.display().to_string(), e))?;

        tracing::info!(root = %config.storage_root_path.display(), "local storage backend ready");
        Ok(backend)
    }

    /// Key resolver for this backend
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Signed URL issuer for this backend
    pub fn signer(&self) -> &SignedUrlIssuer {
        &self.signer
    }

    async fn copy_into(&self, source: &Path, dest: &Path, label: &str) -> StorageResult<()> {
        let source = fs::canonicalize(source)
            .await
            .map_err(|e| StorageError::on_copy(label, e))?;
        let dest = canonicalize_lenient(dest)
            .await
            .map_err(|e| StorageError::on_copy(label, e))?;

        if dest == source {
            return Err(StorageError::CopyError(format!(
                "{}: source and destination are the same",
                label
            )));
        }
        if dest.starts_with(&source) {
            return Err(StorageError::CopyError(format!(
                "{}: destination is inside the source tree",
                label
            )));
        }

        copy_tree(&source, &dest)
            .await
            .map_err(|e| StorageError::on_copy(label, e))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn head_object(&self, key: &str) -> StorageResult<ObjectMetadata> {
        let path = self.resolver.resolve(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::on_read(key, e))?;

        Ok(ObjectMetadata {
            content_length: meta.len(),
        })
    }

    async fn get_object(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.resolver.resolve(key)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| StorageError::on_read(key, e))?;

        tracing::debug!(key, size = data.len(), "read object");
        Ok(Bytes::from(data))
    }

    async fn create_read_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        let path = self.resolver.resolve(key)?;
        let file = File::open(&path)
            .await
            .map_err(|e| StorageError::on_read(key, e))?;
        // Stat the open handle so the length matches what will be read
        let meta = file
            .metadata()
            .await
            .map_err(|e| StorageError::on_read(key, e))?;

        Ok(ObjectStream {
            content_length: meta.len(),
            stream: Box::new(BufReader::new(file)),
        })
    }

    #[tracing::instrument(skip(self, body))]
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        content_length: Option<u64>,
    ) -> StorageResult<()> {
        let path = self.resolver.resolve(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(key.to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::on_write(key, e))?;

        let (mut staged, mut file) = StagedFile::create(&path)
            .await
            .map_err(|e| StorageError::on_write(key, e))?;

        let written = match body {
            ObjectBody::Bytes(data) => {
                file.write_all(&data)
                    .await
                    .map_err(|e| StorageError::on_write(key, e))?;
                data.len() as u64
            }
            ObjectBody::Stream(mut reader) => tokio::io::copy(&mut reader, &mut file)
                .await
                .map_err(|e| StorageError::on_write(key, e))?,
        };

        if let Some(expected) = content_length {
            if expected != written {
                return Err(StorageError::ContentLengthMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        staged
            .commit(file, &path)
            .await
            .map_err(|e| StorageError::on_write(key, e))?;

        tracing::debug!(size = written, "stored object");
        Ok(())
    }

    async fn upload_object(&self, key: &str, source: &Path) -> StorageResult<()> {
        let dest = self.resolver.resolve(key)?;
        self.copy_into(source, &dest, &source.display().to_string())
            .await?;

        tracing::debug!(key, source = %source.display(), "uploaded local path");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn copy_object(&self, source_key: &str, dest_key: &str) -> StorageResult<()> {
        let source = self.resolver.resolve(source_key)?;
        let dest = self.resolver.resolve(dest_key)?;
        self.copy_into(&source, &dest, source_key).await
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let start = self.resolver.resolve_prefix(prefix)?;

        let meta = match fs::metadata(&start).await {
            Ok(meta) => meta,
            // Absent prefix lists as empty
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::on_read(prefix, e)),
        };

        let files = if meta.is_dir() {
            walk_files(&start)
                .await
                .map_err(|e| StorageError::on_read(prefix, e))?
        } else {
            vec![start]
        };

        let mut keys = files
            .iter()
            .map(|path| self.resolver.to_logical(path))
            .collect::<StorageResult<Vec<_>>>()?;
        keys.sort();

        tracing::debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let path = self.resolver.resolve(key)?;

        let result = match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!(key, "deleted");
                Ok(())
            }
            // Deleting something that is not there is a no-op
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::on_delete(key, e)),
        }
    }

    fn get_signed_url(
        &self,
        ctx: &RequestContext,
        request: &SignedUrlRequest,
    ) -> StorageResult<String> {
        self.signer.issue(ctx, request)
    }
}

/// Sibling temp file that becomes the target on commit and is removed otherwise
struct StagedFile {
    temp_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    async fn create(target: &Path) -> io::Result<(Self, File)> {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));
        let file = File::create(&temp_path).await?;

        let staged = Self {
            temp_path,
            committed: false,
        };
        Ok((staged, file))
    }

    async fn commit(&mut self, mut file: File, target: &Path) -> io::Result<()> {
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.temp_path, target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.temp_path.display(), error = %e, "failed to remove staged file");
            }
        }
    }
}

/// Whether a file name is an in-flight staged write
fn is_staged_name(name: &str) -> bool {
    let Some(inner) = name.strip_prefix('.').and_then(|n| n.strip_suffix(".tmp")) else {
        return false;
    };
    match inner.rsplit_once('.') {
        Some((_, id)) => id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Every regular file below `root`, skipping staged writes
async fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if !is_staged_name(&entry.file_name().to_string_lossy()) {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

/// Absolute, symlink-free form of a path that may not exist yet. The nearest
/// existing ancestor is canonicalized and the missing tail appended.
async fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        match fs::canonicalize(&existing).await {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(e);
                };
                missing.push(name);
                existing = match existing.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
            }
            Err(e) => return Err(e),
        }
    }
}

/// Copy a file or directory tree, overwriting existing files
async fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::metadata(source).await?;
    if !meta.is_dir() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(source, dest).await?;
        return Ok(());
    }

    let mut pending = vec![(source.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn backend(temp: &TempDir) -> LocalBackend {
        let config = StorageConfig::new("docs", "files", temp.path(), "secret");
        LocalBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("test.txt", b"hello".as_slice().into(), None).await.unwrap();
        let data = backend.get_object("test.txt").await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn test_nested_path() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend
            .put_object("a/b/c/file.txt", b"nested".as_slice().into(), Some(6))
            .await
            .unwrap();
        let data = backend.get_object("a/b/c/file.txt").await.unwrap();
        assert_eq!(&data[..], b"nested");
        assert!(temp.path().join("a/b/c/file.txt").is_file());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("f.bin", b"first version".as_slice().into(), None).await.unwrap();
        backend.put_object("f.bin", b"second".as_slice().into(), None).await.unwrap();
        assert_eq!(&backend.get_object("f.bin").await.unwrap()[..], b"second");
    }

    #[tokio::test]
    async fn test_put_stream() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        let body = ObjectBody::from_reader(std::io::Cursor::new(b"streamed bytes".to_vec()));
        backend.put_object("s/stream.bin", body, Some(14)).await.unwrap();

        let mut opened = backend.create_read_stream("s/stream.bin").await.unwrap();
        assert_eq!(opened.content_length, 14);
        let mut buf = Vec::new();
        opened.stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"streamed bytes");
    }

    #[tokio::test]
    async fn test_length_mismatch_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        let result = backend.put_object("dir/short.bin", b"abc".as_slice().into(), Some(10)).await;
        assert!(matches!(
            result,
            Err(StorageError::ContentLengthMismatch { expected: 10, actual: 3 })
        ));

        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("dir")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_head() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("h.txt", b"12345".as_slice().into(), None).await.unwrap();
        let meta = backend.head_object("h.txt").await.unwrap();
        assert_eq!(meta.content_length, 5);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("delete-me.txt", b"bye".as_slice().into(), None).await.unwrap();
        backend.delete_object("delete-me.txt").await.unwrap();
        assert!(matches!(
            backend.head_object("delete-me.txt").await,
            Err(StorageError::ObjectNotFound(_))
        ));

        // Second delete is a no-op
        backend.delete_object("delete-me.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_path_removes_tree() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("doc/1.txt", b"1".as_slice().into(), None).await.unwrap();
        backend.put_object("doc/sub/2.txt", b"2".as_slice().into(), None).await.unwrap();
        backend.delete_path("doc").await.unwrap();

        assert!(!temp.path().join("doc").exists());
        assert!(backend.list_objects("doc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        let result = backend.get_object("nonexistent.txt").await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound(_))));

        let result = backend.create_read_stream("nonexistent.txt").await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        let result = backend.put_object("../escape.txt", b"x".as_slice().into(), None).await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
        assert!(matches!(
            backend.delete_object("a/../../b").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        let result = backend.copy_object("missing", "dest").await;
        assert!(matches!(result, Err(StorageError::CopyError(_))));
    }

    #[tokio::test]
    async fn test_copy_into_itself_is_rejected() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("tree/a.txt", b"a".as_slice().into(), None).await.unwrap();
        let result = backend.copy_object("tree", "tree/nested").await;
        assert!(matches!(result, Err(StorageError::CopyError(_))));
    }

    #[tokio::test]
    async fn test_copy_onto_itself_keeps_content() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);

        backend.put_object("doc/a.txt", b"precious".as_slice().into(), None).await.unwrap();

        for (source, dest) in [("doc/a.txt", "doc/a.txt"), ("doc/a.txt", "doc/./a.txt"), ("doc", "doc")] {
            let result = backend.copy_object(source, dest).await;
            assert!(
                matches!(result, Err(StorageError::CopyError(_))),
                "{} -> {} should be rejected",
                source,
                dest
            );
            assert_eq!(&backend.get_object("doc/a.txt").await.unwrap()[..], b"precious");
        }
    }

    #[tokio::test]
    async fn test_upload_relative_source_into_itself() {
        let temp = TempDir::new().unwrap();
        let backend = backend(&temp);
        backend.put_object("tree/a.txt", b"a".as_slice().into(), None).await.unwrap();

        // Same directory, spelled relative to the working directory
        let cwd = std::env::current_dir().unwrap();
        let mut relative = PathBuf::new();
        for _ in cwd.components().skip(1) {
            relative.push("..");
        }
        relative.push(temp.path().join("tree").strip_prefix("/").unwrap());
        assert!(relative.is_relative());

        let result = backend.upload_object("tree/nested", &relative).await;
        assert!(matches!(result, Err(StorageError::CopyError(_))));
        assert!(!temp.path().join("tree/nested").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_through_symlink_into_itself() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let backend = backend(&temp);
        backend.put_object("tree/a.txt", b"a".as_slice().into(), None).await.unwrap();

        let link = outside.path().join("link");
        std::os::unix::fs::symlink(temp.path().join("tree"), &link).unwrap();

        let result = backend.upload_object("tree/nested", &link).await;
        assert!(matches!(result, Err(StorageError::CopyError(_))));
        assert!(!temp.path().join("tree/nested").exists());
    }

    #[test]
    fn test_staged_names() {
        assert!(is_staged_name(".Editor.bin.0123456789abcdef0123456789abcdef.tmp"));
        assert!(!is_staged_name(".hidden.tmp"));
        assert!(!is_staged_name("Editor.bin"));
    }
}
