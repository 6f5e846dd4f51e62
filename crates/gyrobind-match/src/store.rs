use crate::position::SavedPosition;
use crate::types::PositionId;
use std::collections::HashMap;

/// Saved positions in user order, with O(1) lookup by id.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    order: Vec<PositionId>,
    by_id: HashMap<PositionId, SavedPosition>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later duplicates of an id replace the earlier entry in place.
    pub fn from_positions(positions: impl IntoIterator<Item = SavedPosition>) -> Self {
        let mut store = Self::new();
        for position in positions {
            store.insert(position);
        }
        store
    }

    pub fn insert(&mut self, position: SavedPosition) {
        if !self.by_id.contains_key(&position.id) {
            self.order.push(position.id.clone());
        }
        self.by_id.insert(position.id.clone(), position);
    }

    pub fn get(&self, id: &PositionId) -> Option<&SavedPosition> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &PositionId) -> Option<&mut SavedPosition> {
        self.by_id.get_mut(id)
    }

    pub fn contains(&self, id: &PositionId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn remove(&mut self, id: &PositionId) -> Option<SavedPosition> {
        let removed = self.by_id.remove(id)?;
        self.order.retain(|other| other != id);
        Some(removed)
    }

    /// Positions in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &SavedPosition> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn index_of(&self, id: &PositionId) -> Option<usize> {
        self.order.iter().position(|other| other == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn to_vec(&self) -> Vec<SavedPosition> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{DetectionAxes, RecordedPoint};
    use glam::DVec3;

    fn position(name: &str) -> SavedPosition {
        let points = vec![RecordedPoint::new(DVec3::ZERO, DVec3::Z)];
        SavedPosition::new(name, points, 1.0, DetectionAxes::default())
    }

    #[test]
    fn keeps_insertion_order() {
        let a = position("A");
        let b = position("B");
        let c = position("C");
        let b_id = b.id.clone();
        let mut store = PositionStore::from_positions([a, b, c]);

        let names: Vec<_> = store.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);

        assert_eq!(store.remove(&b_id).unwrap().name, "B");
        assert_eq!(store.len(), 2);
        assert!(store.get(&b_id).is_none());
    }

    #[test]
    fn reinserting_an_id_replaces_in_place() {
        let a = position("A");
        let mut renamed = a.clone();
        renamed.name = "A2".into();
        let mut store = PositionStore::from_positions([a, position("B")]);
        store.insert(renamed.clone());

        assert_eq!(store.len(), 2);
        assert_eq!(store.index_of(&renamed.id), Some(0));
        assert_eq!(store.iter().next().unwrap().name, "A2");
    }
}
