//! Part reconstruction.
//!
//! PERMAS models have no parts; every element set becomes one. Elements and
//! their connectivity nodes are attached to the first part that claims them.
//! Later claims are reported and never overwrite. The pass is linear in
//! element-node incidences and resolves node ids through the dense index.

use std::collections::{BTreeSet, HashSet};

use log::info;
use pvmap_model::{EntityRegistry, Part, PartId};

use crate::error::{ConvertError, Result};
use crate::report::{Condition, ConversionReport, EntityKind};

/// Where node and surface sets are written, indexed by part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetPlacement {
    /// Indices into `EntityRegistry::node_sets`.
    pub node_sets: Vec<Vec<usize>>,
    pub surface_sets: Vec<Vec<PlacedSurfaceSet>>,
}

/// A surface set with the indices of its surfaces in
/// `EntityRegistry::surfaces`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedSurfaceSet {
    pub name: String,
    pub surfaces: Vec<usize>,
}

/// Builds the parts and places every node and surface set in one of them.
pub fn associate(registry: &mut EntityRegistry, report: &mut ConversionReport) -> Result<SetPlacement> {
    assign_parts(registry, report);
    place_sets(registry, report)
}

/// Fills `registry.parts` and annotates nodes and elements in place.
pub fn assign_parts(registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let sets = std::mem::take(&mut registry.element_sets);
    let mut parts: Vec<Part> = Vec::with_capacity(sets.len());
    let mut slots = Vec::new();
    let mut node_conflicts: HashSet<(usize, PartId)> = HashSet::new();

    for set in &sets {
        slots.clear();
        for &id in &set.elements {
            match registry.element_slot(id) {
                Some(slot) => slots.push(slot),
                None => report.record(Condition::UnknownSetMember {
                    set: set.name.clone(),
                    id,
                }),
            }
        }
        if slots.is_empty() && !set.elements.is_empty() {
            report.record(Condition::SkippedElementSet {
                set: set.name.clone(),
            });
            continue;
        }

        let part_id = parts.len() as PartId;
        let mut members = Vec::with_capacity(slots.len());
        let (nodes, node_index, elements) = registry.arenas_mut();
        for &slot in &slots {
            let element = &mut elements[slot];
            match element.part {
                None => element.part = Some(part_id),
                Some(owner) if owner == part_id => continue,
                Some(owner) => {
                    report.record(Condition::ConflictingPartAssignment {
                        entity: EntityKind::Element,
                        id: element.id,
                        kept: parts[owner as usize].name.clone(),
                        rejected: set.name.clone(),
                    });
                    continue;
                }
            }
            members.push(element.id);

            for &node_id in &element.nodes {
                let Some(node_slot) = node_index.get(node_id) else {
                    continue;
                };
                let node = &mut nodes[node_slot];
                match node.part {
                    None => node.part = Some(part_id),
                    Some(owner) if owner == part_id => {}
                    Some(owner) => {
                        if node_conflicts.insert((node_slot, part_id)) {
                            report.record(Condition::ConflictingPartAssignment {
                                entity: EntityKind::Node,
                                id: node.id,
                                kept: parts[owner as usize].name.clone(),
                                rejected: set.name.clone(),
                            });
                        }
                    }
                }
            }
        }

        parts.push(Part {
            id: part_id,
            name: set.name.clone(),
            elements: members,
            nodes: Vec::new(),
        });
    }
    registry.element_sets = sets;

    for element in registry.elements() {
        if element.part.is_none() {
            report.record(Condition::UnassignedElement {
                element: element.id,
            });
        }
    }

    let mut orphans = 0usize;
    for node in registry.nodes() {
        match node.part {
            Some(part) => parts[part as usize].nodes.push(node.id),
            None => {
                orphans += 1;
                report.record(Condition::OrphanNode { node: node.id });
            }
        }
    }

    info!(
        "{} part(s) from {} element set(s), {orphans} orphan node(s) excluded",
        parts.len(),
        registry.element_sets.len()
    );
    registry.parts = parts;
}

/// Places node and surface sets. A set whose members fall into more than
/// one part cannot be expressed in a part-scoped target and stops the run.
pub fn place_sets(registry: &EntityRegistry, report: &mut ConversionReport) -> Result<SetPlacement> {
    let mut placement = SetPlacement {
        node_sets: vec![Vec::new(); registry.parts.len()],
        surface_sets: vec![Vec::new(); registry.parts.len()],
    };

    for (index, set) in registry.node_sets.iter().enumerate() {
        let mut owners = BTreeSet::new();
        for &id in &set.nodes {
            match registry.node(id) {
                Some(node) => owners.extend(node.part),
                None => report.record(Condition::UnknownSetMember {
                    set: set.name.clone(),
                    id,
                }),
            }
        }
        if let Some(part) = single_owner(registry, &set.name, owners, report)? {
            placement.node_sets[part as usize].push(index);
        }
    }

    for name in surface_set_names(registry) {
        let surfaces = surfaces_of(registry, &name);
        let mut owners = BTreeSet::new();
        for &surface in &surfaces {
            for &(element_id, _) in &registry.surfaces[surface].faces {
                match registry.element(element_id) {
                    Some(element) => owners.extend(element.part),
                    None => report.record(Condition::UnknownSetMember {
                        set: name.clone(),
                        id: element_id,
                    }),
                }
            }
        }
        if let Some(part) = single_owner(registry, &name, owners, report)? {
            placement.surface_sets[part as usize].push(PlacedSurfaceSet { name, surfaces });
        }
    }

    Ok(placement)
}

fn single_owner(
    registry: &EntityRegistry,
    set: &str,
    owners: BTreeSet<PartId>,
    report: &mut ConversionReport,
) -> Result<Option<PartId>> {
    match owners.len() {
        0 => {
            report.record(Condition::UnplacedSet {
                set: set.to_string(),
            });
            Ok(None)
        }
        1 => Ok(owners.into_iter().next()),
        _ => Err(ConvertError::SetContainment {
            set: set.to_string(),
            parts: owners
                .into_iter()
                .map(|p| registry.parts[p as usize].name.clone())
                .collect(),
        }),
    }
}

/// Surface set names in first-seen order: `SFSET` parameters of surfaces,
/// then `$SFSET` blocks.
fn surface_set_names(registry: &EntityRegistry) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let candidates = registry
        .surfaces
        .iter()
        .map(|s| &s.sfset)
        .chain(registry.surface_sets.iter().map(|s| &s.name));
    for name in candidates {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

fn surfaces_of(registry: &EntityRegistry, name: &str) -> Vec<usize> {
    let listed: Vec<i32> = registry
        .surface_sets
        .iter()
        .filter(|s| s.name == name)
        .flat_map(|s| s.surfaces.iter().copied())
        .collect();
    registry
        .surfaces
        .iter()
        .enumerate()
        .filter(|(_, s)| s.sfset == name || listed.contains(&s.id))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_model::{Element, ElementKind, ElementSet, Node, NodeSet, Surface};

    /// Two hexahedra sharing the face 5-6-7-8.
    fn stacked() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        for i in 0..12 {
            let z = (i / 4) as f64;
            reg.insert_node(Node::new(i + 1, [(i % 2) as f64, ((i / 2) % 2) as f64, z]))
                .expect("node");
        }
        reg.insert_element(Element::new(1, ElementKind::Hexe8, (1..=8).collect()))
            .expect("lower");
        reg.insert_element(Element::new(2, ElementKind::Hexe8, (5..=12).collect()))
            .expect("upper");
        reg
    }

    fn eset(name: &str, elements: Vec<i32>) -> ElementSet {
        ElementSet {
            name: name.to_string(),
            elements,
        }
    }

    #[test]
    fn shared_nodes_stay_with_first_part() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("HOUSING", vec![1]), eset("COVER", vec![2])];
        let mut report = ConversionReport::new();
        associate(&mut reg, &mut report).expect("associate");

        assert_eq!(reg.parts.len(), 2);
        assert_eq!(reg.parts[0].nodes, (1..=8).collect::<Vec<_>>());
        assert_eq!(reg.parts[1].nodes, (9..=12).collect::<Vec<_>>());
        assert_eq!(reg.node(5).and_then(|n| n.part), Some(0));

        let conflicts: Vec<_> = report.of_kind("ConflictingPartAssignment").collect();
        assert_eq!(conflicts.len(), 4);
        assert_eq!(
            conflicts[0],
            &Condition::ConflictingPartAssignment {
                entity: EntityKind::Node,
                id: 5,
                kept: "HOUSING".to_string(),
                rejected: "COVER".to_string(),
            }
        );
    }

    #[test]
    fn every_referenced_node_gets_one_part() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("ALL", vec![1, 2])];
        let mut report = ConversionReport::new();
        associate(&mut reg, &mut report).expect("associate");
        assert!(reg.nodes().iter().all(|n| n.part == Some(0)));
        assert!(report.is_clean());
    }

    #[test]
    fn orphans_and_unassigned_elements_are_reported() {
        let mut reg = stacked();
        reg.insert_node(Node::new(99, [5.0, 5.0, 5.0])).expect("orphan");
        reg.element_sets = vec![eset("LOWER", vec![1])];
        let mut report = ConversionReport::new();
        associate(&mut reg, &mut report).expect("associate");
        assert_eq!(report.count("UnassignedElement"), 1);
        // nodes 9..12 only belong to the unassigned element, plus node 99
        assert_eq!(report.count("OrphanNode"), 5);
        assert!(!reg.parts[0].nodes.contains(&99));
    }

    #[test]
    fn empty_eset_yields_empty_part() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("ALL", vec![1, 2]), eset("SPARE", vec![])];
        let mut report = ConversionReport::new();
        associate(&mut reg, &mut report).expect("associate");
        assert_eq!(reg.parts.len(), 2);
        assert!(reg.parts[1].elements.is_empty());
        assert!(reg.parts[1].nodes.is_empty());
    }

    #[test]
    fn eset_of_unknown_elements_is_skipped() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("SHELLS", vec![40, 41]), eset("ALL", vec![1, 2])];
        let mut report = ConversionReport::new();
        associate(&mut reg, &mut report).expect("associate");
        assert_eq!(reg.parts.len(), 1);
        assert_eq!(reg.parts[0].name, "ALL");
        assert_eq!(report.count("SkippedElementSet"), 1);
        assert_eq!(report.count("UnknownSetMember"), 2);
    }

    #[test]
    fn node_set_across_parts_is_fatal() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("LOWER", vec![1]), eset("UPPER", vec![2])];
        reg.node_sets = vec![NodeSet {
            name: "SPAN".to_string(),
            nodes: vec![1, 12],
        }];
        let mut report = ConversionReport::new();
        let err = associate(&mut reg, &mut report).expect_err("containment");
        match err {
            ConvertError::SetContainment { set, parts } => {
                assert_eq!(set, "SPAN");
                assert_eq!(parts, vec!["LOWER".to_string(), "UPPER".to_string()]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn surface_sets_are_placed_with_their_elements() {
        let mut reg = stacked();
        reg.element_sets = vec![eset("LOWER", vec![1]), eset("UPPER", vec![2])];
        reg.surfaces = vec![Surface {
            id: 3,
            sfset: "TOP".to_string(),
            faces: vec![(2, 6)],
        }];
        let mut report = ConversionReport::new();
        let placement = associate(&mut reg, &mut report).expect("associate");
        assert!(placement.surface_sets[0].is_empty());
        assert_eq!(
            placement.surface_sets[1],
            vec![PlacedSurfaceSet {
                name: "TOP".to_string(),
                surfaces: vec![0]
            }]
        );
    }
}
