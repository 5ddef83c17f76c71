//! A minimal in-memory hierarchical namespace, standing in for the
//! out-of-scope remote filesystem transport so `open`/`mkdir`/`unlink`/
//! `stat`/`rename`/`link` and the path resolver have a real (if synthetic)
//! tree to exercise instead of only type-checking against the `Transport`
//! trait.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use fdio_core::{
    metadata::{AttrUpdate, Metadata, NodeType},
    status::{IoResult, Status},
    transport::{MiscRequest, MiscResponse, OpenFlags, Transport, Whence},
};

struct FileNode {
    data: Mutex<Vec<u8>>,
    meta: Mutex<Metadata>,
}

impl FileNode {
    fn new(mode: u32) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(Vec::new()),
            meta: Mutex::new(Metadata {
                node_type: NodeType::File,
                mode,
                ..Default::default()
            }),
        })
    }
}

struct DirNode {
    children: Mutex<BTreeMap<String, Entry>>,
    meta: Mutex<Metadata>,
}

impl DirNode {
    fn new(mode: u32) -> Arc<Self> {
        Arc::new(Self {
            children: Mutex::new(BTreeMap::new()),
            meta: Mutex::new(Metadata {
                node_type: NodeType::Directory,
                mode,
                ..Default::default()
            }),
        })
    }
}

#[derive(Clone)]
enum Entry {
    File(Arc<FileNode>),
    Dir(Arc<DirNode>),
}

impl Entry {
    fn metadata(&self) -> Metadata {
        match self {
            Entry::File(f) => {
                let mut m = *f.meta.lock();
                m.size = f.data.lock().len() as u64;
                m
            }
            Entry::Dir(d) => *d.meta.lock(),
        }
    }
}

/// One open instance of a node: the shared entry plus a per-open cursor,
/// since the same `FileNode`/`DirNode` may be opened by several
/// descriptors concurrently, each with its own seek position.
pub struct MemFsTransport {
    entry: Entry,
    pos: AtomicU64,
}

impl MemFsTransport {
    /// A fresh, empty namespace root.
    pub fn new_root() -> Arc<dyn Transport> {
        Arc::new(MemFsTransport {
            entry: Entry::Dir(DirNode::new(0o755)),
            pos: AtomicU64::new(0),
        })
    }

    fn as_dir(&self) -> IoResult<&Arc<DirNode>> {
        match &self.entry {
            Entry::Dir(d) => Ok(d),
            Entry::File(_) => Err(Status::NotADirectory),
        }
    }

    fn wrap(entry: Entry) -> Arc<dyn Transport> {
        Arc::new(MemFsTransport {
            entry,
            pos: AtomicU64::new(0),
        })
    }

    /// Walk `path` component-by-component from `dir`, creating the final
    /// component if `flags` asks for it. Intermediate components must
    /// already exist (no implicit `mkdir -p`).
    fn traverse(dir: &Arc<DirNode>, path: &str, flags: OpenFlags, mode: u32) -> IoResult<Entry> {
        let components: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        if components.is_empty() {
            return Ok(Entry::Dir(dir.clone()));
        }

        let mut current = dir.clone();
        for (i, component) in components.iter().enumerate() {
            let last = i == components.len() - 1;
            let existing = current.children.lock().get(*component).cloned();

            match existing {
                Some(entry) if last => {
                    if flags.contains(OpenFlags::CREAT) && flags.contains(OpenFlags::EXCL) {
                        return Err(Status::AlreadyExists);
                    }
                    return Ok(entry);
                }
                Some(Entry::Dir(d)) => current = d,
                Some(Entry::File(_)) => return Err(Status::NotADirectory),
                None if last && flags.contains(OpenFlags::CREAT) => {
                    let entry = if flags.contains(OpenFlags::DIRECTORY) {
                        Entry::Dir(DirNode::new(mode))
                    } else {
                        Entry::File(FileNode::new(mode))
                    };
                    current.children.lock().insert(component.to_string(), entry.clone());
                    return Ok(entry);
                }
                None => return Err(Status::NotFound),
            }
        }
        unreachable!("loop always returns on its last iteration")
    }
}

impl Transport for MemFsTransport {
    fn read(&self, buf: &mut [u8]) -> IoResult<usize> {
        let Entry::File(f) = &self.entry else {
            return Err(Status::NotSupported);
        };
        let data = f.data.lock();
        let pos = self.pos.load(Ordering::Relaxed) as usize;
        if pos >= data.len() {
            return Ok(0);
        }
        let n = (data.len() - pos).min(buf.len());
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.pos.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        let Entry::File(f) = &self.entry else {
            return Err(Status::NotSupported);
        };
        let mut data = f.data.lock();
        let pos = self.pos.load(Ordering::Relaxed) as usize;
        if pos + buf.len() > data.len() {
            data.resize(pos + buf.len(), 0);
        }
        data[pos..pos + buf.len()].copy_from_slice(buf);
        self.pos.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<usize> {
        let Entry::File(f) = &self.entry else {
            return Err(Status::NotSupported);
        };
        let data = f.data.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = (data.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        let Entry::File(f) = &self.entry else {
            return Err(Status::NotSupported);
        };
        let mut data = f.data.lock();
        let offset = offset as usize;
        if offset + buf.len() > data.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn seek(&self, offset: i64, whence: Whence) -> IoResult<u64> {
        let Entry::File(f) = &self.entry else {
            return Err(Status::NotSupported);
        };
        let len = f.data.lock().len() as i64;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos.load(Ordering::Relaxed) as i64,
            Whence::End => len,
        };
        let new_pos = base
            .checked_add(offset)
            .filter(|&p| p >= 0)
            .ok_or(Status::InvalidArgs)?;
        self.pos.store(new_pos as u64, Ordering::Relaxed);
        Ok(new_pos as u64)
    }

    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> IoResult<Arc<dyn Transport>> {
        let dir = self.as_dir()?;
        let entry = Self::traverse(dir, path, flags, mode)?;
        if flags.contains(OpenFlags::DIRECTORY) && !matches!(entry, Entry::Dir(_)) {
            return Err(Status::NotADirectory);
        }
        Ok(Self::wrap(entry))
    }

    fn misc(&self, req: MiscRequest<'_>) -> IoResult<MiscResponse> {
        match req {
            MiscRequest::Stat => Ok(MiscResponse::Stat(self.entry.metadata())),

            MiscRequest::Truncate { len } => {
                let Entry::File(f) = &self.entry else {
                    return Err(Status::NotSupported);
                };
                f.data.lock().resize(len as usize, 0);
                Ok(MiscResponse::Unit)
            }

            MiscRequest::SetAttr(AttrUpdate { mode, atime: _, mtime }) => {
                let mut meta = match &self.entry {
                    Entry::File(f) => f.meta.lock(),
                    Entry::Dir(d) => d.meta.lock(),
                };
                if let Some(mode) = mode {
                    meta.mode = mode;
                }
                if let Some(mtime) = mtime {
                    meta.mtime = mtime;
                }
                Ok(MiscResponse::Unit)
            }

            MiscRequest::UnlinkInContainer { leaf } => {
                let dir = self.as_dir()?;
                dir.children
                    .lock()
                    .remove(leaf)
                    .ok_or(Status::NotFound)?;
                Ok(MiscResponse::Unit)
            }

            MiscRequest::Rename { old, new } => {
                let dir = self.as_dir()?;
                let mut children = dir.children.lock();
                let entry = children.remove(old).ok_or(Status::NotFound)?;
                children.insert(new.to_string(), entry);
                Ok(MiscResponse::Unit)
            }

            MiscRequest::Link { old, new } => {
                let dir = self.as_dir()?;
                let mut children = dir.children.lock();
                let entry = children.get(old).cloned().ok_or(Status::NotFound)?;
                if children.contains_key(new) {
                    return Err(Status::AlreadyExists);
                }
                children.insert(new.to_string(), entry);
                Ok(MiscResponse::Unit)
            }

            MiscRequest::Sync { .. } => Ok(MiscResponse::Unit),

            MiscRequest::ReadDir { reset, out } => {
                // The whole listing is handed back in one batch on the
                // first (reset) fetch; a subsequent non-reset fetch means
                // the caller already consumed that batch and has nothing
                // left, so it must report end-of-stream, not repeat it.
                let dir = self.as_dir()?;
                out.clear();
                if reset {
                    out.extend(dir.children.lock().keys().cloned());
                }
                Ok(MiscResponse::Unit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_read_roundtrip() {
        let root = MemFsTransport::new_root();
        let file = root
            .open("a.txt", OpenFlags::CREAT | OpenFlags::RDWR, 0o644)
            .unwrap();
        assert_eq!(file.write(b"hello").unwrap(), 5);
        file.seek(0, Whence::Start).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(file.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn open_missing_without_creat_fails_not_found() {
        let root = MemFsTransport::new_root();
        assert_eq!(
            root.open("missing", OpenFlags::RDONLY, 0).unwrap_err(),
            Status::NotFound
        );
    }

    #[test]
    fn excl_create_on_existing_fails() {
        let root = MemFsTransport::new_root();
        root.open("a", OpenFlags::CREAT, 0o644).unwrap();
        let err = root
            .open("a", OpenFlags::CREAT | OpenFlags::EXCL, 0o644)
            .unwrap_err();
        assert_eq!(err, Status::AlreadyExists);
    }

    #[test]
    fn unlink_removes_child_from_parent() {
        let root = MemFsTransport::new_root();
        root.open("a", OpenFlags::CREAT, 0o644).unwrap();
        root.misc(MiscRequest::UnlinkInContainer { leaf: "a" }).unwrap();
        assert_eq!(
            root.open("a", OpenFlags::RDONLY, 0).unwrap_err(),
            Status::NotFound
        );
    }

    #[test]
    fn nested_directories_resolve() {
        let root = MemFsTransport::new_root();
        root.open("dir", OpenFlags::CREAT | OpenFlags::DIRECTORY, 0o755)
            .unwrap();
        let nested = root
            .open("dir/file", OpenFlags::CREAT | OpenFlags::RDWR, 0o644)
            .unwrap();
        nested.write(b"x").unwrap();
        let reopened = root.open("dir/file", OpenFlags::RDONLY, 0).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(reopened.read(&mut buf).unwrap(), 1);
    }

    #[test]
    fn stat_reports_file_size() {
        let root = MemFsTransport::new_root();
        let file = root
            .open("a", OpenFlags::CREAT | OpenFlags::RDWR, 0o644)
            .unwrap();
        file.write(b"abcd").unwrap();
        let MiscResponse::Stat(meta) = file.misc(MiscRequest::Stat).unwrap() else {
            panic!("expected Stat response");
        };
        assert_eq!(meta.size, 4);
    }
}
