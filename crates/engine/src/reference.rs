// Reference file handles: one per attached evidence document.

use std::collections::BTreeSet;

use serde::Serialize;

use gridassist_core::palette::{color_for_slot, REFERENCE_PALETTE};
use gridassist_core::{SourceId, SourceRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceFile {
    pub id: SourceId,
    pub display_name: String,
    pub color_slot: usize,
}

impl ReferenceFile {
    pub fn color(&self) -> u32 {
        color_for_slot(self.color_slot)
    }

    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.id.clone(), self.display_name.clone())
    }
}

/// Registry of attached reference files, in attach order.
///
/// Removed files stay in the registry as detached so an undo that restores
/// their rows can restore the handle too.
#[derive(Debug, Clone, Default)]
pub struct ReferenceFiles {
    files: Vec<ReferenceFile>,
    detached: BTreeSet<SourceId>,
    removed: BTreeSet<SourceId>,
    next_slot: usize,
}

impl ReferenceFiles {
    pub fn add(&mut self, display_name: impl Into<String>) -> ReferenceFile {
        let file = ReferenceFile {
            id: SourceId::generate(),
            display_name: display_name.into(),
            color_slot: self.next_slot % REFERENCE_PALETTE.len(),
        };
        self.next_slot += 1;
        self.files.push(file.clone());
        file
    }

    pub fn remove(&mut self, id: &SourceId) -> Option<ReferenceFile> {
        let file = self.get(id)?.clone();
        self.detached.insert(file.id.clone());
        self.removed.insert(file.id.clone());
        Some(file)
    }

    /// Match attachment to the rows a restored state holds. Only files that
    /// were removed at some point move: attached while `owns_rows` says
    /// their rows exist, detached otherwise.
    pub fn sync(&mut self, owns_rows: impl Fn(&SourceId) -> bool) {
        for id in &self.removed {
            let attach = owns_rows(id);
            let changed = if attach {
                self.detached.remove(id)
            } else {
                self.detached.insert(id.clone())
            };
            if changed {
                log::debug!("reference file {id} {}", if attach { "re-attached" } else { "detached" });
            }
        }
    }

    pub fn get(&self, id: &SourceId) -> Option<&ReferenceFile> {
        self.iter().find(|f| &f.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceFile> {
        self.files.iter().filter(|f| !self.detached.contains(&f.id))
    }

    pub fn len(&self) -> usize {
        self.files.len() - self.detached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.detached.clear();
        self.removed.clear();
        self.next_slot = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_slots_round_robin() {
        let mut files = ReferenceFiles::default();
        let slots: Vec<usize> = (0..10).map(|i| files.add(format!("f{i}")).color_slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
    }

    #[test]
    fn test_removed_slot_is_not_reused_immediately() {
        let mut files = ReferenceFiles::default();
        let a = files.add("a.pdf");
        files.add("b.pdf");
        files.remove(&a.id).unwrap();
        assert_eq!(files.add("c.pdf").color_slot, 2);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_sync_reattaches_only_removed_files() {
        let mut files = ReferenceFiles::default();
        let a = files.add("a.pdf");
        let b = files.add("b.pdf");
        files.remove(&a.id).unwrap();
        assert!(files.get(&a.id).is_none());
        assert!(files.remove(&a.id).is_none());
        assert_eq!(files.len(), 1);

        files.sync(|_| true);
        let order: Vec<&str> = files.iter().map(|f| f.display_name.as_str()).collect();
        assert_eq!(order, vec!["a.pdf", "b.pdf"]);

        // b was never removed, so missing rows do not detach it.
        files.sync(|_| false);
        assert!(files.get(&a.id).is_none());
        assert_eq!(files.get(&b.id).map(|f| f.color_slot), Some(1));
    }
}
