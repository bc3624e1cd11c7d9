//! Element type, connectivity and material mapping between PERMAS and VMAP.

use log::info;
use pvmap_model::{ElementKind, EntityRegistry, Material};

use crate::report::{Condition, ConversionReport};

/// VMAP description of a supported element family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmapElementType {
    pub kind: ElementKind,
    pub identifier: i32,
    pub shape: &'static str,
    pub interpolation: &'static str,
    pub integration: &'static str,
    pub integration_identifier: i32,
    pub integration_points: usize,
}

const HEXAHEDRON_8: VmapElementType = VmapElementType {
    kind: ElementKind::Hexe8,
    identifier: 1,
    shape: "HEXAHEDRON_8",
    interpolation: "TRILINEAR",
    integration: "GAUSS_HEXAHEDRON_8",
    integration_identifier: 1,
    integration_points: 8,
};

const TETRAHEDRON_10: VmapElementType = VmapElementType {
    kind: ElementKind::Tet10,
    identifier: 2,
    shape: "TETRAHEDRON_10",
    interpolation: "TRIQUADRATIC",
    integration: "GAUSS_TETRAHEDRON_4",
    integration_identifier: 2,
    integration_points: 4,
};

/// `vmap[k] = permas[TET10_VMAP_FROM_PERMAS[k]]`
pub const TET10_VMAP_FROM_PERMAS: [usize; 10] = [0, 2, 4, 9, 1, 3, 5, 6, 7, 8];
/// `permas[k] = vmap[TET10_PERMAS_FROM_VMAP[k]]`
pub const TET10_PERMAS_FROM_VMAP: [usize; 10] = [0, 4, 1, 5, 2, 6, 7, 8, 9, 3];

pub fn vmap_element_type(kind: ElementKind) -> &'static VmapElementType {
    match kind {
        ElementKind::Hexe8 => &HEXAHEDRON_8,
        ElementKind::Tet10 => &TETRAHEDRON_10,
    }
}

pub fn kind_from_vmap_identifier(identifier: i64) -> Option<ElementKind> {
    ElementKind::ALL
        .into_iter()
        .find(|k| i64::from(vmap_element_type(*k).identifier) == identifier)
}

pub fn kind_from_vmap_shape(shape: &str) -> Option<ElementKind> {
    ElementKind::ALL
        .into_iter()
        .find(|k| vmap_element_type(*k).shape.eq_ignore_ascii_case(shape.trim()))
}

/// Appends `nodes` (PERMAS order) to `out` in VMAP order.
pub fn extend_vmap_connectivity(kind: ElementKind, nodes: &[i32], out: &mut Vec<i32>) {
    match kind {
        ElementKind::Hexe8 => out.extend_from_slice(nodes),
        ElementKind::Tet10 => out.extend(TET10_VMAP_FROM_PERMAS.iter().map(|&i| nodes[i])),
    }
}

/// Converts VMAP-ordered connectivity back to PERMAS order.
pub fn permas_connectivity(kind: ElementKind, nodes: &[i32]) -> Vec<i32> {
    match kind {
        ElementKind::Hexe8 => nodes.to_vec(),
        ElementKind::Tet10 => TET10_PERMAS_FROM_VMAP.iter().map(|&i| nodes[i]).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParameter {
    pub name: String,
    pub value: f64,
    pub description: String,
}

impl MaterialParameter {
    fn new(name: &str, value: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub identifier: i32,
    pub name: String,
    pub model: String,
    pub idealization: &'static str,
    pub parameters: Vec<MaterialParameter>,
}

/// Copies material constants verbatim. An isotropic material with two
/// elastic constants becomes MODULUS/POISSON; anything else keeps its
/// constants as C1..Cn. Temperature tables are not converted.
pub fn map_materials(materials: &[Material], report: &mut ConversionReport) -> Vec<MaterialRecord> {
    materials
        .iter()
        .enumerate()
        .map(|(index, material)| map_material(index as i32, material, report))
        .collect()
}

fn map_material(identifier: i32, material: &Material, report: &mut ConversionReport) -> MaterialRecord {
    let mut record = MaterialRecord {
        identifier,
        name: material.name.clone(),
        model: material.model.clone(),
        idealization: "isotropic",
        parameters: Vec::new(),
    };
    if material.temperature_dependent {
        report.record(Condition::UnsupportedMaterialModel {
            material: material.name.clone(),
            reason: "temperature-dependent data".to_string(),
        });
        return record;
    }

    match material.elastic.as_slice() {
        [] => {}
        [modulus, poisson] if material.model == "ISO" => {
            record.parameters.push(MaterialParameter::new("MODULUS", *modulus, "Young's modulus"));
            record.parameters.push(MaterialParameter::new("POISSON", *poisson, "Poisson's ratio"));
        }
        constants => {
            record.idealization = "anisotropic";
            record.parameters.extend(constants.iter().enumerate().map(|(i, &c)| {
                MaterialParameter::new(&format!("C{}", i + 1), c, "elastic constant")
            }));
        }
    }
    if let Some(density) = material.density {
        record.parameters.push(MaterialParameter::new("DENSITY", density, "mass density"));
    }
    record
}

/// Material index per element slot, from `$ELPROP` set references.
///
/// The first property naming an element wins. Parts that end up with
/// elements lacking a material are reported once each.
pub fn assign_materials(registry: &EntityRegistry, report: &mut ConversionReport) -> Vec<Option<u32>> {
    let mut assigned: Vec<Option<u32>> = vec![None; registry.element_count()];
    for property in &registry.properties {
        let set = registry.element_set(&property.eset);
        let material = registry.material_index(&property.material);
        let (Some(set), Some(material)) = (set, material) else {
            report.record(Condition::UnresolvedProperty {
                set: property.eset.clone(),
                material: property.material.clone(),
            });
            continue;
        };
        for &id in &set.elements {
            if let Some(slot) = registry.element_slot(id)
                && assigned[slot].is_none()
            {
                assigned[slot] = Some(material as u32);
            }
        }
    }

    for part in &registry.parts {
        let missing = part
            .elements
            .iter()
            .filter_map(|&id| registry.element_slot(id))
            .filter(|&slot| assigned[slot].is_none())
            .count();
        if missing > 0 {
            report.record(Condition::MissingMaterial {
                part: part.name.clone(),
                elements: missing,
            });
        }
    }
    info!(
        "{} of {} elements carry a material",
        assigned.iter().filter(|m| m.is_some()).count(),
        assigned.len()
    );
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_model::{Element, ElementProperty, ElementSet, Node, Part};

    #[test]
    fn tet10_permutations_are_inverse() {
        let permas: Vec<i32> = (10..20).collect();
        let mut vmap = Vec::new();
        extend_vmap_connectivity(ElementKind::Tet10, &permas, &mut vmap);
        assert_eq!(vmap, vec![10, 12, 14, 19, 11, 13, 15, 16, 17, 18]);
        assert_eq!(permas_connectivity(ElementKind::Tet10, &vmap), permas);
    }

    #[test]
    fn hexe8_order_is_unchanged() {
        let nodes: Vec<i32> = (1..=8).collect();
        let mut vmap = Vec::new();
        extend_vmap_connectivity(ElementKind::Hexe8, &nodes, &mut vmap);
        assert_eq!(vmap, nodes);
    }

    #[test]
    fn element_types_resolve_both_ways() {
        for kind in ElementKind::ALL {
            let vmap = vmap_element_type(kind);
            assert_eq!(kind_from_vmap_identifier(vmap.identifier.into()), Some(kind));
            assert_eq!(kind_from_vmap_shape(vmap.shape), Some(kind));
        }
        assert_eq!(vmap_element_type(ElementKind::Tet10).integration, "GAUSS_TETRAHEDRON_4");
        assert_eq!(kind_from_vmap_identifier(7), None);
    }

    #[test]
    fn isotropic_material_maps_to_modulus_and_poisson() {
        let mut steel = Material::new("STEEL");
        steel.elastic = vec![210000.0, 0.3];
        steel.density = Some(7.85e-9);
        let mut report = ConversionReport::new();
        let records = map_materials(&[steel], &mut report);
        let names: Vec<&str> = records[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["MODULUS", "POISSON", "DENSITY"]);
        assert_eq!(records[0].parameters[0].value, 210000.0);
        assert!(report.is_clean());
    }

    #[test]
    fn temperature_dependent_material_is_reported() {
        let mut mat = Material::new("HOT");
        mat.temperature_dependent = true;
        let mut report = ConversionReport::new();
        let records = map_materials(&[mat], &mut report);
        assert!(records[0].parameters.is_empty());
        assert_eq!(report.count("UnsupportedMaterialModel"), 1);
    }

    #[test]
    fn properties_assign_materials_per_element() {
        let mut reg = EntityRegistry::new();
        for i in 1..=8 {
            reg.insert_node(Node::new(i, [0.0; 3])).expect("node");
        }
        reg.insert_element(Element::new(1, ElementKind::Hexe8, (1..=8).collect()))
            .expect("e1");
        reg.insert_element(Element::new(2, ElementKind::Hexe8, (1..=8).collect()))
            .expect("e2");
        reg.element_sets = vec![ElementSet {
            name: "A".to_string(),
            elements: vec![1],
        }];
        reg.materials = vec![Material::new("STEEL")];
        reg.properties = vec![
            ElementProperty {
                eset: "A".to_string(),
                material: "STEEL".to_string(),
            },
            ElementProperty {
                eset: "A".to_string(),
                material: "ALU".to_string(),
            },
        ];
        reg.parts = vec![Part {
            id: 0,
            name: "ALL".to_string(),
            elements: vec![1, 2],
            nodes: (1..=8).collect(),
        }];
        let mut report = ConversionReport::new();
        let assigned = assign_materials(&reg, &mut report);
        assert_eq!(assigned, vec![Some(0), None]);
        assert_eq!(report.count("UnresolvedProperty"), 1);
        assert_eq!(
            report.of_kind("MissingMaterial").next(),
            Some(&Condition::MissingMaterial {
                part: "ALL".to_string(),
                elements: 1
            })
        );
    }
}
