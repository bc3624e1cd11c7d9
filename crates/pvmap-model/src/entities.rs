//! Entities decoded from a PERMAS model.

use serde::Serialize;

/// Index of a part in `EntityRegistry::parts`.
pub type PartId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i32,
    pub coords: [f64; 3],
    /// `RSYS` the coordinates were given in, if not global.
    pub coord_system: Option<i32>,
    pub part: Option<PartId>,
}

impl Node {
    pub fn new(id: i32, coords: [f64; 3]) -> Self {
        Self {
            id,
            coords,
            coord_system: None,
            part: None,
        }
    }
}

/// Supported volumetric element families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ElementKind {
    /// 8-node hexahedron
    Hexe8,
    /// 10-node quadratic tetrahedron
    Tet10,
}

impl ElementKind {
    pub const ALL: [ElementKind; 2] = [ElementKind::Hexe8, ElementKind::Tet10];

    pub fn num_nodes(self) -> usize {
        match self {
            ElementKind::Hexe8 => 8,
            ElementKind::Tet10 => 10,
        }
    }

    pub fn from_permas_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "HEXE8" => Some(ElementKind::Hexe8),
            "TET10" => Some(ElementKind::Tet10),
            _ => None,
        }
    }

    pub fn permas_code(self) -> &'static str {
        match self {
            ElementKind::Hexe8 => "HEXE8",
            ElementKind::Tet10 => "TET10",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: i32,
    pub kind: ElementKind,
    /// Connectivity in PERMAS node order.
    pub nodes: Vec<i32>,
    pub part: Option<PartId>,
}

impl Element {
    pub fn new(id: i32, kind: ElementKind, nodes: Vec<i32>) -> Self {
        Self {
            id,
            kind,
            nodes,
            part: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let expected = self.kind.num_nodes();
        let actual = self.nodes.len();
        if actual != expected {
            return Err(format!(
                "element {} of type {} has {} nodes but expected {}",
                self.id,
                self.kind.permas_code(),
                actual,
                expected
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSet {
    pub name: String,
    pub elements: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    pub name: String,
    pub nodes: Vec<i32>,
}

/// One `$SURFACE ELEMENTS` block: element faces sharing a surface id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub id: i32,
    pub sfset: String,
    /// `(element id, local face number)`
    pub faces: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSet {
    pub name: String,
    pub surfaces: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// `TYPE` of the `$MATERIAL` header, `ISO` when absent.
    pub model: String,
    pub elastic: Vec<f64>,
    pub density: Option<f64>,
    /// Set when a `$ELASTIC`/`$DENSITY` sub-block is tabulated over temperature.
    pub temperature_dependent: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: "ISO".to_string(),
            elastic: Vec::new(),
            density: None,
            temperature_dependent: false,
        }
    }
}

/// `$ELPROP` row: elements of `eset` use `material`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementProperty {
    pub eset: String,
    pub material: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CsysKind {
    Cartesian,
    Cylindrical,
}

impl CsysKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "CARTESIAN" | "RECT" | "RECTANGULAR" => Some(CsysKind::Cartesian),
            "CYLINDRICAL" | "CYL" | "RZ" => Some(CsysKind::Cylindrical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystem {
    pub id: i32,
    pub kind: CsysKind,
    pub origin: [f64; 3],
    pub axis1: [f64; 3],
    pub axis2: [f64; 3],
}

/// Derived from one element set; owns disjoint node and element lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    pub elements: Vec<i32>,
    pub nodes: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_codes_map_both_ways() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_permas_code(kind.permas_code()), Some(kind));
        }
        assert_eq!(ElementKind::from_permas_code("hexe8"), Some(ElementKind::Hexe8));
        assert_eq!(ElementKind::from_permas_code("PENTA6"), None);
    }

    #[test]
    fn validate_checks_connectivity_length() {
        let ok = Element::new(1, ElementKind::Tet10, (1..=10).collect());
        assert!(ok.validate().is_ok());
        let short = Element::new(2, ElementKind::Hexe8, vec![1, 2, 3]);
        let msg = short.validate().expect_err("too few nodes");
        assert!(msg.contains("HEXE8"));
    }
}
