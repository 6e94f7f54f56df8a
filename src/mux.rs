//! The file-handle demultiplexer.
//!
//! Maps opaque handle bytes to live backend objects. Implemented over
//! `dashmap::DashMap`, whose internal sharding gives every operation
//! lock-free-from-the-caller's-perspective concurrency without a global
//! mutex, matching the reference crate's preference for off-the-shelf
//! concurrent data structures over hand-rolled locking.

use crate::backend::BackendNode;
use crate::handle::FileHandle;
use dashmap::DashMap;

#[derive(Default)]
pub struct Mux {
    table: DashMap<u64, BackendNode>,
}

impl Mux {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    pub fn bind(&self, handle: FileHandle, node: BackendNode) {
        self.table.insert(handle.0, node);
    }

    pub fn load(&self, handle: FileHandle) -> Option<BackendNode> {
        self.table.get(&handle.0).map(|entry| entry.value().clone())
    }

    pub fn unbind(&self, handle: FileHandle) {
        self.table.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Directory;
    use std::sync::Arc;

    #[test]
    fn bind_load_unbind_contract() {
        let mux = Mux::new();
        let h = FileHandle(7);
        let dir = BackendNode::Dir(Arc::new(Directory::new(h, true)));
        assert!(mux.load(h).is_none());
        mux.bind(h, dir);
        assert!(mux.load(h).is_some());
        mux.unbind(h);
        assert!(mux.load(h).is_none());
    }

    #[test]
    fn rebind_is_idempotent() {
        let mux = Mux::new();
        let h = FileHandle(9);
        let dir = BackendNode::Dir(Arc::new(Directory::new(h, false)));
        mux.bind(h, dir.clone());
        mux.bind(h, dir);
        assert!(mux.load(h).is_some());
    }
}
