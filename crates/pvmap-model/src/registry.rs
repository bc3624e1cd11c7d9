//! Arena storage for decoded entities.

use thiserror::Error;

use crate::entities::{
    CoordinateSystem, Element, ElementProperty, ElementSet, Material, Node, NodeSet, Part,
    Surface, SurfaceSet,
};
use crate::index::IdIndex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node {0} defined more than once")]
    DuplicateNode(i32),

    #[error("element {0} defined more than once")]
    DuplicateElement(i32),

    #[error("{0}")]
    InvalidElement(String),
}

/// Holds every entity of one conversion run.
///
/// Nodes and elements live in arenas addressed by slot; `IdIndex` translates
/// source ids. Slots never move, so a slot obtained once stays valid for the
/// lifetime of the registry.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    nodes: Vec<Node>,
    node_index: IdIndex,
    elements: Vec<Element>,
    element_index: IdIndex,
    pub element_sets: Vec<ElementSet>,
    pub node_sets: Vec<NodeSet>,
    pub surfaces: Vec<Surface>,
    pub surface_sets: Vec<SurfaceSet>,
    pub materials: Vec<Material>,
    pub properties: Vec<ElementProperty>,
    pub coordinate_systems: Vec<CoordinateSystem>,
    pub parts: Vec<Part>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: Node) -> Result<usize, RegistryError> {
        let slot = self.nodes.len();
        if self.node_index.insert(node.id, slot).is_some() {
            return Err(RegistryError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        Ok(slot)
    }

    /// Connectivity length is checked here; node existence is the caller's concern.
    pub fn insert_element(&mut self, element: Element) -> Result<usize, RegistryError> {
        element.validate().map_err(RegistryError::InvalidElement)?;
        let slot = self.elements.len();
        if self.element_index.insert(element.id, slot).is_some() {
            return Err(RegistryError::DuplicateElement(element.id));
        }
        self.elements.push(element);
        Ok(slot)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Mutable arenas, for in-place part annotation.
    pub fn arenas_mut(&mut self) -> (&mut [Node], &IdIndex, &mut [Element]) {
        (&mut self.nodes, &self.node_index, &mut self.elements)
    }

    pub fn node_slot(&self, id: i32) -> Option<usize> {
        self.node_index.get(id)
    }

    pub fn element_slot(&self, id: i32) -> Option<usize> {
        self.element_index.get(id)
    }

    pub fn node(&self, id: i32) -> Option<&Node> {
        self.node_slot(id).map(|slot| &self.nodes[slot])
    }

    pub fn element(&self, id: i32) -> Option<&Element> {
        self.element_slot(id).map(|slot| &self.elements[slot])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn material_index(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn element_set(&self, name: &str) -> Option<&ElementSet> {
        self.element_sets.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ElementKind;

    fn cube() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        for (i, c) in corners.iter().enumerate() {
            reg.insert_node(Node::new(i as i32 + 1, *c)).expect("node");
        }
        reg.insert_element(Element::new(1, ElementKind::Hexe8, (1..=8).collect()))
            .expect("element");
        reg
    }

    #[test]
    fn lookups_resolve_by_source_id() {
        let reg = cube();
        assert_eq!(reg.node_count(), 8);
        assert_eq!(reg.node(7).map(|n| n.coords), Some([1.0, 1.0, 1.0]));
        assert_eq!(reg.element(1).map(|e| e.nodes.len()), Some(8));
        assert!(reg.node(9).is_none());
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut reg = cube();
        let err = reg
            .insert_node(Node::new(3, [9.0, 9.0, 9.0]))
            .expect_err("duplicate node");
        assert_eq!(err, RegistryError::DuplicateNode(3));
        assert_eq!(reg.node(3).map(|n| n.coords), Some([1.0, 1.0, 0.0]));
        assert_eq!(reg.node_count(), 8);

        let err = reg
            .insert_element(Element::new(1, ElementKind::Hexe8, (1..=8).collect()))
            .expect_err("duplicate element");
        assert_eq!(err, RegistryError::DuplicateElement(1));
    }

    #[test]
    fn wrong_connectivity_length_is_rejected() {
        let mut reg = EntityRegistry::new();
        let err = reg
            .insert_element(Element::new(5, ElementKind::Tet10, vec![1, 2, 3, 4]))
            .expect_err("short element");
        assert!(matches!(err, RegistryError::InvalidElement(_)));
        assert_eq!(reg.element_count(), 0);
    }
}
