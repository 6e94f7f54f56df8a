//! The reference in-memory filesystem.
//!
//! Objects are plain Rust structs wrapped in `Arc` and addressed only
//! through their [`FileHandle`]; a directory's children map stores handles,
//! not strong references to the child objects themselves, so the
//! [`Mux`](crate::mux::Mux) remains the single source of truth for whether
//! an object is still alive. This keeps the parent/child graph (which is
//! cyclic once a directory has been through MKDIR and gained a `..` entry)
//! free of reference cycles.

use crate::handle::{next_id, FileHandle};
use crate::mux::Mux;
use crate::nfs::{fattr3, ftype3, nfsstat3, nfstime3, sattr3, set_size3, specdata3};
use indexmap::IndexMap;
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;

fn server_start_time() -> nfstime3 {
    static START: OnceLock<nfstime3> = OnceLock::new();
    *START.get_or_init(|| {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        nfstime3 {
            seconds: now.as_secs() as u32,
            nseconds: now.subsec_nanos(),
        }
    })
}

#[derive(Clone)]
pub enum BackendNode {
    Dir(Arc<Directory>),
    File(Arc<RegularFile>),
}

impl BackendNode {
    pub fn id(&self) -> FileHandle {
        match self {
            BackendNode::Dir(d) => d.handle,
            BackendNode::File(f) => f.handle,
        }
    }

    pub fn attr(&self) -> fattr3 {
        match self {
            BackendNode::Dir(d) => d.getattr(),
            BackendNode::File(f) => f.getattr(),
        }
    }

    pub fn as_dir(&self) -> Option<Arc<Directory>> {
        match self {
            BackendNode::Dir(d) => Some(d.clone()),
            BackendNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<Arc<RegularFile>> {
        match self {
            BackendNode::File(f) => Some(f.clone()),
            BackendNode::Dir(_) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, BackendNode::Dir(_))
    }
}

pub struct Directory {
    handle: FileHandle,
    is_root: bool,
    parent: Mutex<Option<FileHandle>>,
    children: Mutex<IndexMap<Vec<u8>, FileHandle>>,
}

impl Directory {
    pub fn new(handle: FileHandle, is_root: bool) -> Self {
        Directory {
            handle,
            is_root,
            parent: Mutex::new(None),
            children: Mutex::new(IndexMap::new()),
        }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn getattr(&self) -> fattr3 {
        let now = server_start_time();
        let nlink = 2 + self
            .children
            .lock()
            .unwrap()
            .keys()
            .filter(|n| n.as_slice() != b"." && n.as_slice() != b"..")
            .count() as u32;
        fattr3 {
            ftype: ftype3::NF3DIR,
            mode: 0o755,
            nlink,
            uid: 0,
            gid: 0,
            size: 4096,
            used: 4096,
            rdev: specdata3 {
                specdata1: 0,
                specdata2: 0,
            },
            fsid: 0,
            fileid: self.handle.0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// SETATTR on a directory is always a no-op success.
    pub fn setattr(&self, _attr: &sattr3) -> fattr3 {
        self.getattr()
    }

    pub fn access(&self, mask: u32) -> u32 {
        mask
    }

    fn bind_self_entries(self: &Arc<Self>) {
        let mut children = self.children.lock().unwrap();
        children.insert(b".".to_vec(), self.handle);
    }

    pub fn lookup(&self, name: &[u8]) -> Result<FileHandle, nfsstat3> {
        self.children
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .ok_or(nfsstat3::NFS3ERR_NOENT)
    }

    pub fn readdirplus_entries(&self, mux: &Mux) -> Vec<(Vec<u8>, BackendNode)> {
        let names: Vec<(Vec<u8>, FileHandle)> = self
            .children
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        names
            .into_iter()
            .filter_map(|(name, handle)| mux.load(handle).map(|node| (name, node)))
            .collect()
    }

    pub fn mkdir(self: &Arc<Self>, mux: &Mux, name: Vec<u8>) -> BackendNode {
        let new_handle = FileHandle(next_id());
        let new_dir = Arc::new(Directory::new(new_handle, false));
        *new_dir.parent.lock().unwrap() = Some(self.handle);
        new_dir.bind_self_entries();
        new_dir
            .children
            .lock()
            .unwrap()
            .insert(b"..".to_vec(), self.handle);
        let node = BackendNode::Dir(new_dir);
        mux.bind(new_handle, node.clone());
        self.children.lock().unwrap().insert(name, new_handle);
        node
    }

    pub fn create(
        &self,
        mux: &Mux,
        name: Vec<u8>,
        guard_must_not_exist: bool,
    ) -> Result<BackendNode, nfsstat3> {
        let exists = self.children.lock().unwrap().contains_key(&name);
        if exists && guard_must_not_exist {
            return Err(nfsstat3::NFS3ERR_EXIST);
        }
        let new_handle = FileHandle(next_id());
        let file = Arc::new(RegularFile::new(new_handle, Vec::new()));
        let node = BackendNode::File(file);
        mux.bind(new_handle, node.clone());
        self.children.lock().unwrap().insert(name, new_handle);
        Ok(node)
    }

    pub fn link(&self, name: Vec<u8>, target: FileHandle) {
        self.children.lock().unwrap().insert(name, target);
    }

    pub fn remove(&self, mux: &Mux, name: &[u8]) -> Result<(), nfsstat3> {
        let handle = {
            let children = self.children.lock().unwrap();
            *children.get(name).ok_or(nfsstat3::NFS3ERR_NOENT)?
        };
        match mux.load(handle) {
            Some(BackendNode::Dir(_)) => return Err(nfsstat3::NFS3ERR_ISDIR),
            Some(BackendNode::File(_)) | None => {}
        }
        self.children.lock().unwrap().shift_remove(name);
        mux.unbind(handle);
        Ok(())
    }

    pub fn rmdir(&self, mux: &Mux, name: &[u8]) -> Result<(), nfsstat3> {
        let handle = {
            let children = self.children.lock().unwrap();
            *children.get(name).ok_or(nfsstat3::NFS3ERR_NOENT)?
        };
        match mux.load(handle) {
            Some(BackendNode::File(_)) => return Err(nfsstat3::NFS3ERR_NOTDIR),
            Some(BackendNode::Dir(_)) | None => {}
        }
        self.children.lock().unwrap().shift_remove(name);
        mux.unbind(handle);
        Ok(())
    }

    pub fn rename(
        from: &Directory,
        from_name: &[u8],
        to: &Directory,
        to_name: Vec<u8>,
    ) -> Result<(), nfsstat3> {
        let handle = {
            let mut children = from.children.lock().unwrap();
            children
                .shift_remove(from_name)
                .ok_or(nfsstat3::NFS3ERR_NOENT)?
        };
        to.children.lock().unwrap().insert(to_name, handle);
        Ok(())
    }
}

pub struct RegularFile {
    handle: FileHandle,
    data: parking_lot::RwLock<Vec<u8>>,
    mtime: Mutex<nfstime3>,
    ctime: Mutex<nfstime3>,
}

impl RegularFile {
    pub fn new(handle: FileHandle, data: Vec<u8>) -> Self {
        let now = server_start_time();
        RegularFile {
            handle,
            data: parking_lot::RwLock::new(data),
            mtime: Mutex::new(now),
            ctime: Mutex::new(now),
        }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn getattr(&self) -> fattr3 {
        let len = self.data.read().len() as u64;
        let mtime = *self.mtime.lock().unwrap();
        let ctime = *self.ctime.lock().unwrap();
        fattr3 {
            ftype: ftype3::NF3REG,
            mode: 0o644,
            nlink: 1,
            uid: 0,
            gid: 0,
            size: len,
            used: len,
            rdev: specdata3 {
                specdata1: 0,
                specdata2: 0,
            },
            fsid: 0,
            fileid: self.handle.0,
            atime: mtime,
            mtime,
            ctime,
        }
    }

    fn touch(&self) {
        let now = server_start_time();
        *self.mtime.lock().unwrap() = now;
        *self.ctime.lock().unwrap() = now;
    }

    pub fn setattr(&self, attr: &sattr3) -> fattr3 {
        if let set_size3::size(new_size) = attr.size {
            let mut data = self.data.write();
            data.resize(new_size as usize, 0);
            drop(data);
            self.touch();
        }
        self.getattr()
    }

    pub fn access(&self, mask: u32) -> u32 {
        mask
    }

    pub fn read(&self, offset: u64, count: u32) -> (Vec<u8>, bool) {
        let data = self.data.read();
        let offset = offset.min(data.len() as u64) as usize;
        let end = (offset + count as usize).min(data.len());
        let slice = data[offset..end].to_vec();
        let eof = end >= data.len();
        (slice, eof)
    }

    pub fn write(&self, offset: u64, bytes: &[u8]) -> u32 {
        let mut data = self.data.write();
        let end = offset as usize + bytes.len();
        if end > data.len() {
            // Reserve a little extra capacity so a run of small sequential
            // writes doesn't reallocate on every call; logical length still
            // matches exactly what has been written (size == used == len).
            if end > data.capacity() {
                data.reserve(end - data.len() + end / 20);
            }
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(bytes);
        drop(data);
        self.touch();
        bytes.len() as u32
    }

    pub fn commit(&self) {}
}

/// Builds the initial tree every server instance starts with: a root
/// containing `hello` (six bytes, "world\n"), and two empty files `foo`
/// and `example`.
pub fn bootstrap() -> Arc<Mux> {
    let mux = Arc::new(Mux::new());
    let root = Arc::new(Directory::new(FileHandle::ROOT, true));
    root.bind_self_entries();
    mux.bind(FileHandle::ROOT, BackendNode::Dir(root.clone()));

    let hello_handle = FileHandle(next_id());
    let hello = Arc::new(RegularFile::new(hello_handle, b"world\n".to_vec()));
    mux.bind(hello_handle, BackendNode::File(hello));
    root.children
        .lock()
        .unwrap()
        .insert(b"hello".to_vec(), hello_handle);

    for name in [b"foo".to_vec(), b"example".to_vec()] {
        let handle = FileHandle(next_id());
        let file = Arc::new(RegularFile::new(handle, Vec::new()));
        mux.bind(handle, BackendNode::File(file));
        root.children.lock().unwrap().insert(name, handle);
    }

    mux
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_contains_hello_world() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        let hello_handle = root.lookup(b"hello").unwrap();
        let hello = mux.load(hello_handle).unwrap().as_file().unwrap();
        let (data, eof) = hello.read(0, 64);
        assert_eq!(data, b"world\n");
        assert!(eof);
    }

    #[test]
    fn lookup_missing_name_is_noent() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        assert_eq!(root.lookup(b"nope"), Err(nfsstat3::NFS3ERR_NOENT));
    }

    #[test]
    fn create_write_read_round_trip() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        let node = root.create(&mux, b"tmp".to_vec(), false).unwrap();
        let file = node.as_file().unwrap();
        file.write(0, b"abc");
        file.write(3, b"de");
        let (data, eof) = file.read(0, 64);
        assert_eq!(data, b"abcde");
        assert!(eof);
    }

    #[test]
    fn guarded_create_rejects_existing() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        assert_eq!(
            root.create(&mux, b"hello".to_vec(), true),
            Err(nfsstat3::NFS3ERR_EXIST)
        );
    }

    #[test]
    fn remove_then_lookup_is_noent_and_cached_handle_is_stale() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        let hello_handle = root.lookup(b"hello").unwrap();
        root.remove(&mux, b"hello").unwrap();
        assert_eq!(root.lookup(b"hello"), Err(nfsstat3::NFS3ERR_NOENT));
        assert!(mux.load(hello_handle).is_none());
    }

    #[test]
    fn remove_on_directory_is_isdir() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        root.mkdir(&mux, b"sub".to_vec());
        assert_eq!(root.remove(&mux, b"sub"), Err(nfsstat3::NFS3ERR_ISDIR));
    }

    #[test]
    fn rmdir_on_file_is_notdir() {
        let mux = bootstrap();
        let root = mux.load(FileHandle::ROOT).unwrap().as_dir().unwrap();
        assert_eq!(root.rmdir(&mux, b"hello"), Err(nfsstat3::NFS3ERR_NOTDIR));
    }
}
