//! Dense label ids and the polygons that carry them.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};
use crate::polygon::Polygon;

/// Index into a [`LabelTable`].
pub type LabelId = u32;

/// The label of every point no polygon covers.
pub const UNKNOWN: LabelId = 0;

const UNKNOWN_NAME: &str = "unknown";

/// Label strings in first-seen order. Id 0 is always "unknown".
#[derive(Debug, Clone)]
pub struct LabelTable {
    names: Vec<String>,
    ids: HashMap<String, LabelId>,
}

impl LabelTable {
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(UNKNOWN_NAME.to_string(), UNKNOWN);
        Self {
            names: vec![UNKNOWN_NAME.to_string()],
            ids,
        }
    }

    /// Rebuild a table from an exported name list. The first name is taken
    /// as the unknown label whatever it is called.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            return Self::new();
        }
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as LabelId))
            .collect();
        Self { names, ids }
    }

    /// Id for `name`, assigning the next one on first sight.
    pub fn intern(&mut self, name: &str) -> LabelId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as LabelId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<LabelId> {
        self.ids.get(name).copied()
    }

    /// Name of `id`; out-of-range ids read as "unknown".
    pub fn name(&self, id: LabelId) -> &str {
        self.names
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.len() <= 1
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A polygon tagged with the label of the region it outlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPolygon {
    pub polygon: Polygon,
    pub label: LabelId,
}

impl LabeledPolygon {
    pub fn new(polygon: Polygon, label: LabelId) -> Self {
        Self { polygon, label }
    }

    /// Same label, different outline. Used for clipped fragments.
    pub fn with_polygon(&self, polygon: Polygon) -> Self {
        Self {
            polygon,
            label: self.label,
        }
    }

    /// Boundary point count; the unit every cost estimate is measured in.
    pub fn size(&self) -> usize {
        self.polygon.len()
    }

    pub fn bbox(&self) -> &BoundingBox {
        self.polygon.bbox()
    }

    pub fn contains(&self, pt: Point) -> bool {
        self.polygon.contains(pt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_assigns_dense_ids() {
        let mut table = LabelTable::new();
        assert!(table.is_empty());
        assert_eq!(table.intern("Europe/Helsinki"), 1);
        assert_eq!(table.intern("America/Chicago"), 2);
        assert_eq!(table.intern("Europe/Helsinki"), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.name(0), "unknown");
        assert_eq!(table.name(2), "America/Chicago");
        assert_eq!(table.name(99), "unknown");
        assert_eq!(table.id("America/Chicago"), Some(2));
        assert_eq!(table.id("Asia/Tokyo"), None);
    }

    #[test]
    fn test_from_names_round_trip() {
        let mut table = LabelTable::new();
        table.intern("a");
        table.intern("b");
        let copy = LabelTable::from_names(table.names().to_vec());
        assert_eq!(copy.id("b"), Some(2));
        assert_eq!(copy.name(1), "a");
    }
}
