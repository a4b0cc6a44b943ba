//! Element-to-part resolution.
//!
//! The printer log never dumps a full connectivity table, but the
//! smallest-timestep tables and the controlling-element lines both name
//! (element, part) pairs. Collecting those gives a sparse map that
//! covers exactly the elements the analyzers ask about.

use std::collections::HashMap;

use crate::model::{EnergySample, TimestepRecord};

/// Sparse element id -> owning part id map, first association wins.
#[derive(Debug, Default)]
pub struct ElementMapper {
    map: HashMap<u64, u64>,
}

impl ElementMapper {
    /// Build from every (element, part) pair the readers surfaced.
    pub fn build(timesteps: &[TimestepRecord], energy: &[EnergySample]) -> ElementMapper {
        let mut mapper = ElementMapper::default();
        for record in timesteps {
            if let Some(part) = record.part_id {
                mapper.insert(record.element_id, part);
            }
        }
        for sample in energy {
            if sample.controlling_element != 0 && sample.controlling_part != 0 {
                mapper.insert(sample.controlling_element, sample.controlling_part);
            }
        }
        mapper
    }

    fn insert(&mut self, element: u64, part: u64) {
        self.map.entry(element).or_insert(part);
    }

    /// O(1) average lookup; `None` when the element never appeared in
    /// the structural data.
    pub fn owning_part(&self, element_id: u64) -> Option<u64> {
        self.map.get(&element_id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    fn ts(element: u64, part: Option<u64>) -> TimestepRecord {
        TimestepRecord {
            cycle: 0,
            time: 0.0,
            element_kind: ElementKind::Solid,
            element_id: element,
            part_id: part,
            dt: 1e-6,
            rank: None,
        }
    }

    fn energy(element: u64, part: u64) -> EnergySample {
        EnergySample {
            controlling_element: element,
            controlling_part: part,
            ..Default::default()
        }
    }

    #[test]
    fn test_mapper__pairs_from_both_sources__then_lookup_resolves() {
        let mapper = ElementMapper::build(&[ts(100, Some(3))], &[energy(200, 5)]);
        assert_eq!(mapper.owning_part(100), Some(3));
        assert_eq!(mapper.owning_part(200), Some(5));
        assert_eq!(mapper.owning_part(999), None);
    }

    #[test]
    fn test_mapper__conflicting_pairs__then_first_wins() {
        let mapper = ElementMapper::build(&[ts(100, Some(3))], &[energy(100, 7)]);
        assert_eq!(mapper.owning_part(100), Some(3));
    }

    #[test]
    fn test_mapper__no_structural_data__then_empty_not_failing() {
        let mapper = ElementMapper::build(&[ts(100, None)], &[]);
        assert!(mapper.is_empty());
        assert_eq!(mapper.owning_part(100), None);
    }
}
