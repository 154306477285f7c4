use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Numeric identity of one segment in the dataset.
pub type SegmentId = u64;

/// Hands out unique segment ids and remembers their display labels.
#[derive(Debug, Clone)]
pub struct IdRegistry {
    next: Option<SegmentId>,
    reserved: HashSet<SegmentId>,
    order: Vec<SegmentId>,
    labels: HashMap<SegmentId, String>,
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdRegistry {
    /// Auto-assigned ids start at `initial_id`.
    pub fn new(initial_id: SegmentId) -> Self {
        Self {
            next: Some(initial_id),
            reserved: HashSet::new(),
            order: Vec::new(),
            labels: HashMap::new(),
        }
    }

    /// Reserve `explicit` as-is, or the next unused id when `None`.
    pub fn reserve(&mut self, explicit: Option<SegmentId>) -> Result<SegmentId> {
        let id = match explicit {
            Some(id) => {
                if self.reserved.contains(&id) {
                    return Err(Error::DuplicateId(id));
                }
                id
            }
            None => self.next_free()?,
        };

        self.reserved.insert(id);
        self.order.push(id);
        Ok(id)
    }

    fn next_free(&mut self) -> Result<SegmentId> {
        let mut candidate = self.next.ok_or(Error::IdSpaceExhausted(SegmentId::MAX))?;

        // Skip over ids that were reserved explicitly.
        while self.reserved.contains(&candidate) {
            candidate = candidate
                .checked_add(1)
                .ok_or(Error::IdSpaceExhausted(candidate))?;
        }

        self.next = candidate.checked_add(1);
        Ok(candidate)
    }

    /// Attach a display name to a reserved id. Re-labelling replaces the name.
    pub fn label(&mut self, id: SegmentId, name: impl Into<String>) -> Result<()> {
        if !self.reserved.contains(&id) {
            return Err(Error::UnknownId(id));
        }

        self.labels.insert(id, name.into());
        Ok(())
    }

    pub fn is_reserved(&self, id: SegmentId) -> bool {
        self.reserved.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Every reserved id, in reservation order.
    pub fn reserved_ids(&self) -> &[SegmentId] {
        &self.order
    }

    /// Labelled ids in reservation order. Unlabelled ids are left out.
    pub fn snapshot(&self) -> Vec<(SegmentId, String)> {
        self.order
            .iter()
            .filter_map(|id| self.labels.get(id).map(|name| (*id, name.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_ids_start_at_initial_value() {
        let mut reg = IdRegistry::new(5);
        assert_eq!(reg.reserve(None).unwrap(), 5);
        assert_eq!(reg.reserve(None).unwrap(), 6);
        assert_eq!(reg.reserve(None).unwrap(), 7);
    }

    #[test]
    fn default_starts_at_one() {
        let mut reg = IdRegistry::default();
        assert_eq!(reg.reserve(None).unwrap(), 1);
    }

    #[test]
    fn explicit_duplicate_is_rejected() {
        let mut reg = IdRegistry::new(1);
        reg.reserve(Some(42)).unwrap();
        assert!(matches!(reg.reserve(Some(42)), Err(Error::DuplicateId(42))));
    }

    #[test]
    fn explicit_collides_with_auto() {
        let mut reg = IdRegistry::new(1);
        reg.reserve(None).unwrap();
        assert!(matches!(reg.reserve(Some(1)), Err(Error::DuplicateId(1))));
    }

    #[test]
    fn auto_skips_explicit_ids() {
        let mut reg = IdRegistry::new(1);
        reg.reserve(Some(2)).unwrap();
        reg.reserve(Some(3)).unwrap();
        assert_eq!(reg.reserve(None).unwrap(), 1);
        assert_eq!(reg.reserve(None).unwrap(), 4);
    }

    #[test]
    fn exhausting_the_id_space_fails() {
        let mut reg = IdRegistry::new(SegmentId::MAX);
        assert_eq!(reg.reserve(None).unwrap(), SegmentId::MAX);
        assert!(matches!(reg.reserve(None), Err(Error::IdSpaceExhausted(_))));
    }

    #[test]
    fn label_requires_reservation() {
        let mut reg = IdRegistry::new(1);
        assert!(matches!(reg.label(9, "nine"), Err(Error::UnknownId(9))));
    }

    #[test]
    fn snapshot_keeps_reservation_order_and_skips_unlabelled() {
        let mut reg = IdRegistry::new(1);
        let a = reg.reserve(Some(30)).unwrap();
        let b = reg.reserve(None).unwrap();
        let c = reg.reserve(Some(10)).unwrap();

        reg.label(c, "c").unwrap();
        reg.label(a, "a").unwrap();

        assert_eq!(
            reg.snapshot(),
            vec![(30, "a".to_string()), (10, "c".to_string())]
        );
        assert_eq!(reg.reserved_ids(), &[a, b, c]);
    }

    #[test]
    fn relabel_keeps_position() {
        let mut reg = IdRegistry::new(1);
        reg.reserve(None).unwrap();
        reg.reserve(None).unwrap();
        reg.label(1, "first").unwrap();
        reg.label(2, "second").unwrap();
        reg.label(1, "renamed").unwrap();

        assert_eq!(
            reg.snapshot(),
            vec![(1, "renamed".to_string()), (2, "second".to_string())]
        );
    }
}
