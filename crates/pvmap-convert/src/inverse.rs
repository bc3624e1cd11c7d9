//! VMAP to PERMAS ASCII, model only.
//!
//! Parts come back as element sets, geometry sets as `$NSET` and
//! `$SURFACE ELEMENTS`, materials as `$MATERIAL` cards. Results and
//! coordinate systems have no counterpart in the emitted text and are
//! listed in the report as omitted.

use std::collections::HashMap;

use log::{debug, info};
use pvmap_asc::{KeywordWriter, scientific};
use pvmap_model::{
    Element, ElementKind, ElementProperty, ElementSet, EntityRegistry, Material, Node, NodeSet,
    Part, PartId, RegistryError, Surface, SurfaceSet,
};
use pvmap_store::{AttrValue, Storage, join_path};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::layout::*;
use crate::mapper::{kind_from_vmap_identifier, kind_from_vmap_shape, permas_connectivity};
use crate::report::{Condition, ConversionReport, EntityKind};

/// Element type of a VMAP type id, with its node count for cursor advance.
#[derive(Debug, Clone, Copy)]
struct TypeInfo {
    kind: Option<ElementKind>,
    nodes: usize,
}

/// Rebuilds the entity registry from a VMAP tree.
pub fn read_vmap<S: Storage>(store: &S, report: &mut ConversionReport) -> Result<EntityRegistry> {
    if !store.is_group(GEOMETRY) {
        return Err(ConvertError::MissingBlock(format!("{GEOMETRY} not found")));
    }
    let mut registry = EntityRegistry::new();
    let mut types: HashMap<i32, TypeInfo> = HashMap::new();
    let (materials, material_ids) = read_materials(store, report)?;
    registry.materials = materials;

    for (index, name) in numeric_children(store, GEOMETRY)? {
        let path = join_path(GEOMETRY, &name);
        let part_id = registry.parts.len() as PartId;
        let part_name = attr_text(store, &path, MYNAME)?.unwrap_or_else(|| format!("PART_{index}"));
        let nodes = read_points(store, &path, part_id, &mut registry, report)?;
        let (elements, part_materials) =
            read_elements(store, &path, part_id, &mut types, &mut registry, report)?;
        read_geometry_sets(store, &path, &mut registry, report)?;
        add_property(&part_name, &part_materials, &material_ids, &mut registry, report);

        registry.element_sets.push(ElementSet {
            name: part_name.clone(),
            elements: elements.clone(),
        });
        registry.parts.push(Part {
            id: part_id,
            name: part_name,
            elements,
            nodes,
        });
    }

    if registry.node_count() == 0 {
        return Err(ConvertError::MissingBlock("no points in any part".to_string()));
    }

    let states = numeric_state_count(store)?;
    if states > 0 {
        report.record(Condition::OmittedFeature {
            feature: "result states".to_string(),
            count: states,
        });
    }
    if store.is_group(COORDINATESYSTEM) {
        let systems = store.children(COORDINATESYSTEM)?.len();
        if systems > 0 {
            report.record(Condition::OmittedFeature {
                feature: "coordinate systems".to_string(),
                count: systems,
            });
        }
    }

    let stats = &mut report.stats;
    stats.parts = registry.parts.len();
    stats.nodes = registry.node_count();
    stats.elements = registry.element_count();
    stats.node_sets = registry.node_sets.len();
    stats.surface_sets = registry.surface_sets.len();
    stats.materials = registry.materials.len();
    info!(
        "read {} part(s), {} node(s), {} element(s) from VMAP",
        stats.parts, stats.nodes, stats.elements
    );
    Ok(registry)
}

fn read_points<S: Storage>(
    store: &S,
    part_path: &str,
    part: PartId,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) -> Result<Vec<i32>> {
    let points = join_path(part_path, POINTS);
    let ids = int_dataset(store, &join_path(&points, MYIDENTIFIERS))?;
    let coords_path = join_path(&points, MYCOORDINATES);
    let coords = store
        .dataset(&coords_path)?
        .data
        .to_f64()
        .ok_or_else(|| ConvertError::Malformed(format!("{coords_path} is not numeric")))?;
    if coords.len() != ids.len() * 3 {
        return Err(ConvertError::Malformed(format!(
            "{coords_path}: {} values for {} points",
            coords.len(),
            ids.len()
        )));
    }

    let mut inserted = Vec::with_capacity(ids.len());
    for (&id, xyz) in ids.iter().zip(coords.chunks_exact(3)) {
        let mut node = Node::new(id, [xyz[0], xyz[1], xyz[2]]);
        node.part = Some(part);
        match registry.insert_node(node) {
            Ok(_) => inserted.push(id),
            Err(_) => report.record(Condition::DuplicateDefinition {
                entity: EntityKind::Node,
                id,
            }),
        }
    }

    let systems_path = join_path(&points, MYCOORDINATESYSTEM);
    if store.exists(&systems_path) {
        let local = int_dataset(store, &systems_path)?
            .into_iter()
            .filter(|&s| s != UNDEFINED)
            .count();
        if local > 0 {
            report.record(Condition::OmittedFeature {
                feature: "node coordinate systems".to_string(),
                count: local,
            });
        }
    }
    Ok(inserted)
}

/// Returns the inserted element ids and the material id of each.
fn read_elements<S: Storage>(
    store: &S,
    part_path: &str,
    part: PartId,
    types: &mut HashMap<i32, TypeInfo>,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) -> Result<(Vec<i32>, Vec<i32>)> {
    let elements = join_path(part_path, ELEMENTS);
    let ids = int_dataset(store, &join_path(&elements, MYIDENTIFIERS))?;
    let type_ids = int_dataset(store, &join_path(&elements, MYELEMENTTYPE))?;
    let connectivity = int_dataset(store, &join_path(&elements, MYCONNECTIVITY))?;
    let materials_path = join_path(&elements, MYMATERIALTYPE);
    let materials = if store.exists(&materials_path) {
        int_dataset(store, &materials_path)?
    } else {
        vec![UNDEFINED; ids.len()]
    };
    if type_ids.len() != ids.len() || materials.len() != ids.len() {
        return Err(ConvertError::Malformed(format!(
            "{elements}: element columns differ in length"
        )));
    }

    let mut inserted = Vec::with_capacity(ids.len());
    let mut inserted_materials = Vec::with_capacity(ids.len());
    let mut cursor = 0usize;
    for ((&id, &type_id), &material) in ids.iter().zip(&type_ids).zip(&materials) {
        let info = match types.get(&type_id) {
            Some(info) => *info,
            None => {
                let info = type_info(store, type_id)?;
                types.insert(type_id, info);
                info
            }
        };
        let Some(nodes) = connectivity.get(cursor..cursor + info.nodes) else {
            return Err(ConvertError::Malformed(format!(
                "{elements}: connectivity ends inside element {id}"
            )));
        };
        cursor += info.nodes;

        let Some(kind) = info.kind else {
            report.record(Condition::UnsupportedElementType {
                element: id,
                code: format!("VMAP type {type_id}"),
            });
            continue;
        };
        let mut element = Element::new(id, kind, permas_connectivity(kind, nodes));
        element.part = Some(part);
        match registry.insert_element(element) {
            Ok(_) => {
                inserted.push(id);
                inserted_materials.push(material);
            }
            Err(RegistryError::DuplicateElement(id)) => {
                report.record(Condition::DuplicateDefinition {
                    entity: EntityKind::Element,
                    id,
                })
            }
            Err(e) => {
                return Err(ConvertError::Malformed(format!("{elements}: {e}")));
            }
        }
    }
    Ok((inserted, inserted_materials))
}

fn type_info<S: Storage>(store: &S, type_id: i32) -> Result<TypeInfo> {
    let path = join_path(ELEMENTTYPES, &type_id.to_string());
    let shape = if store.is_group(&path) {
        attr_text(store, &path, MYSHAPETYPE)?
    } else {
        None
    };
    let kind = match shape {
        Some(shape) => kind_from_vmap_shape(&shape),
        None => kind_from_vmap_identifier(i64::from(type_id)),
    };
    if let Some(kind) = kind {
        return Ok(TypeInfo {
            kind: Some(kind),
            nodes: kind.num_nodes(),
        });
    }
    let nodes = if store.is_group(&path) {
        store
            .attribute(&path, MYNUMBEROFNODES)?
            .and_then(AttrValue::as_int)
            .and_then(|n| usize::try_from(n).ok())
    } else {
        None
    };
    match nodes {
        Some(nodes) => Ok(TypeInfo { kind: None, nodes }),
        None => Err(ConvertError::Malformed(format!(
            "element type {type_id} has no node count"
        ))),
    }
}

fn read_geometry_sets<S: Storage>(
    store: &S,
    part_path: &str,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) -> Result<()> {
    let sets = join_path(part_path, GEOMETRYSETS);
    if !store.is_group(&sets) {
        return Ok(());
    }
    for (index, name) in numeric_children(store, &sets)? {
        let path = join_path(&sets, &name);
        let set_name = attr_text(store, &path, MYSETNAME)?.unwrap_or_else(|| format!("SET_{index}"));
        let set_type = attr_int(store, &path, MYSETTYPE)?;
        let index_type = attr_int(store, &path, MYSETINDEXTYPE)?;
        let data = int_dataset(store, &join_path(&path, MYGEOMETRYSETDATA))?;

        match (set_type, index_type) {
            (Some(SET_TYPE_NODE), Some(SET_INDEX_SINGLE)) => registry.node_sets.push(NodeSet {
                name: set_name,
                nodes: data,
            }),
            (Some(SET_TYPE_ELEMENT), Some(SET_INDEX_SINGLE)) => {
                registry.element_sets.push(ElementSet {
                    name: set_name,
                    elements: data,
                })
            }
            (Some(SET_TYPE_ELEMENT), Some(SET_INDEX_PAIR)) => {
                let identifier = attr_int(store, &path, MYIDENTIFIER)?;
                add_surface(&set_name, identifier, &data, registry);
            }
            _ => report.record(Condition::OmittedFeature {
                feature: format!("geometry set {set_name}"),
                count: 1,
            }),
        }
    }
    Ok(())
}

/// Surface sets are written as `<sfset>_<surfid>`; the name is split at the
/// last underscore, falling back to the set identifier.
fn add_surface(name: &str, identifier: Option<i64>, data: &[i32], registry: &mut EntityRegistry) {
    let split = name
        .rsplit_once('_')
        .and_then(|(sfset, id)| id.parse::<i32>().ok().map(|id| (sfset.to_string(), id)));
    let (sfset, id) = match split {
        Some(split) => split,
        None => (
            name.to_string(),
            identifier.and_then(|i| i32::try_from(i).ok()).unwrap_or(0),
        ),
    };
    let faces = data.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
    match registry.surface_sets.iter_mut().find(|s| s.name == sfset) {
        Some(set) if !set.surfaces.contains(&id) => set.surfaces.push(id),
        Some(_) => {}
        None => registry.surface_sets.push(SurfaceSet {
            name: sfset.clone(),
            surfaces: vec![id],
        }),
    }
    registry.surfaces.push(Surface { id, sfset, faces });
}

fn add_property(
    part: &str,
    materials: &[i32],
    material_ids: &HashMap<i64, usize>,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) {
    let mut distinct: Vec<i32> = Vec::new();
    for &m in materials {
        if m != UNDEFINED && !distinct.contains(&m) {
            distinct.push(m);
        }
    }
    let Some((&first, rest)) = distinct.split_first() else {
        return;
    };
    if !rest.is_empty() {
        report.record(Condition::OmittedFeature {
            feature: format!("mixed materials in part {part}"),
            count: rest.len(),
        });
    }
    match material_ids.get(&i64::from(first)) {
        Some(&index) => registry.properties.push(ElementProperty {
            eset: part.to_string(),
            material: registry.materials[index].name.clone(),
        }),
        None => report.record(Condition::UnresolvedProperty {
            set: part.to_string(),
            material: first.to_string(),
        }),
    }
}

/// Materials in identifier order plus a map from VMAP identifier to index.
fn read_materials<S: Storage>(
    store: &S,
    report: &mut ConversionReport,
) -> Result<(Vec<Material>, HashMap<i64, usize>)> {
    let mut materials = Vec::new();
    let mut ids = HashMap::new();
    if !store.is_group(MATERIAL) {
        return Ok((materials, ids));
    }
    for (index, name) in numeric_children(store, MATERIAL)? {
        let path = join_path(MATERIAL, &name);
        let identifier = attr_int(store, &path, MYIDENTIFIER)?.unwrap_or(index as i64);
        let mut material =
            Material::new(attr_text(store, &path, MYNAME)?.unwrap_or_else(|| format!("MAT_{index}")));
        if let Some(model) = attr_text(store, &path, "MYMODEL")? {
            material.model = model;
        }

        let params = join_path(&path, PARAMETERS);
        let names = text_dataset(store, &join_path(&params, MYNAME))?;
        let values = text_dataset(store, &join_path(&params, MYVALUE))?;
        let mut constants: Vec<(usize, f64)> = Vec::new();
        for (param, raw) in names.iter().zip(&values) {
            let Ok(value) = raw.trim().parse::<f64>() else {
                report.record(Condition::MalformedRecord {
                    block: "MATERIAL".to_string(),
                    line: 0,
                    message: format!("{}: {param} = '{raw}'", material.name),
                });
                continue;
            };
            match param.as_str() {
                "MODULUS" => constants.push((0, value)),
                "POISSON" => constants.push((1, value)),
                "DENSITY" => material.density = Some(value),
                other => match other.strip_prefix('C').and_then(|n| n.parse::<usize>().ok()) {
                    Some(n) if n > 0 => constants.push((n - 1, value)),
                    _ => debug!("material {}: parameter {other} not carried", material.name),
                },
            }
        }
        constants.sort_by_key(|(position, _)| *position);
        material.elastic = constants.into_iter().map(|(_, v)| v).collect();

        ids.insert(identifier, materials.len());
        materials.push(material);
    }
    Ok((materials, ids))
}

fn numeric_state_count<S: Storage>(store: &S) -> Result<usize> {
    if !store.is_group(VARIABLES) {
        return Ok(0);
    }
    Ok(store
        .children(VARIABLES)?
        .iter()
        .filter(|name| name.starts_with("STATE-"))
        .count())
}

/// Children named by an index, in numeric order.
fn numeric_children<S: Storage>(store: &S, path: &str) -> Result<Vec<(usize, String)>> {
    let mut children: Vec<(usize, String)> = store
        .children(path)?
        .into_iter()
        .filter_map(|name| name.parse::<usize>().ok().map(|i| (i, name)))
        .collect();
    children.sort_by_key(|(i, _)| *i);
    Ok(children)
}

fn int_dataset<S: Storage>(store: &S, path: &str) -> Result<Vec<i32>> {
    store
        .dataset(path)?
        .data
        .to_i64()
        .ok_or_else(|| ConvertError::Malformed(format!("{path} is not an integer dataset")))?
        .into_iter()
        .map(|v| {
            i32::try_from(v).map_err(|_| ConvertError::Malformed(format!("{path}: {v} out of range")))
        })
        .collect()
}

fn text_dataset<S: Storage>(store: &S, path: &str) -> Result<Vec<String>> {
    if !store.exists(path) {
        return Ok(Vec::new());
    }
    store
        .dataset(path)?
        .data
        .as_text()
        .map(<[String]>::to_vec)
        .ok_or_else(|| ConvertError::Malformed(format!("{path} is not a text dataset")))
}

fn attr_text<S: Storage>(store: &S, path: &str, name: &str) -> Result<Option<String>> {
    Ok(store
        .attribute(path, name)?
        .and_then(AttrValue::as_text)
        .map(str::to_string))
}

fn attr_int<S: Storage>(store: &S, path: &str, name: &str) -> Result<Option<i64>> {
    Ok(store.attribute(path, name)?.and_then(AttrValue::as_int))
}

/// Emits the registry as a PERMAS component plus material section.
pub fn write_permas_text(registry: &EntityRegistry, config: &ConverterConfig) -> String {
    let per_row = config.ids_per_row;
    let mut w = KeywordWriter::new();
    w.header(0, "$ENTER COMPONENT  NAME = MIXED  DOFTYPE = DISP TEMP");
    w.header(1, "$STRUCTURE");

    w.header(2, "$COOR");
    for node in registry.nodes() {
        w.coordinate_row(node.id, node.coords);
    }
    w.comment_end();

    for kind in [ElementKind::Tet10, ElementKind::Hexe8] {
        let mut elements = registry.elements().iter().filter(|e| e.kind == kind).peekable();
        if elements.peek().is_none() {
            continue;
        }
        w.header(2, &format!("$ELEMENT TYPE = {}", kind.permas_code()));
        for element in elements {
            w.row(std::iter::once(&element.id).chain(&element.nodes).map(|id| format!("{id:>8}")));
        }
        w.comment_end();
    }

    for set in &registry.element_sets {
        w.header(2, &format!("$ESET NAME = {}", set.name));
        w.id_rows(&set.elements, per_row);
    }

    let mut node_sets: Vec<&NodeSet> = registry.node_sets.iter().collect();
    node_sets.sort_by(|a, b| a.name.cmp(&b.name));
    for set in node_sets {
        w.header(2, &format!("$NSET NAME = {}", set.name));
        w.id_rows(&set.nodes, per_row);
    }

    for surface in &registry.surfaces {
        w.header(
            2,
            &format!(
                "$SURFACE ELEMENTS  SURFID = {}  SFSET = {}",
                surface.id, surface.sfset
            ),
        );
        for &(element, face) in &surface.faces {
            w.row([format!("{element:>8}"), format!("{face:>8}")]);
        }
    }
    for set in &registry.surface_sets {
        w.header(2, &format!("$SFSET NAME = {}", set.name));
        w.id_rows(&set.surfaces, per_row);
    }

    if !registry.properties.is_empty() {
        w.header(2, "$ELPROP");
        for property in &registry.properties {
            w.row([
                property.eset.as_str(),
                "MATERIAL",
                "=",
                property.material.as_str(),
            ]);
        }
    }
    w.header(1, "$END STRUCTURE");

    for (block, name) in [
        ("CONSTRAINTS", "MYCONSTRAINTS"),
        ("SYSTEM", "MYSYSTEM"),
        ("LOADING", "MYLOADING"),
        ("RESULTS", "MYRESULTS"),
    ] {
        w.header(1, &format!("${block} NAME = {name}"));
        w.header(1, &format!("$END {block}"));
    }
    w.header(1, "$SITUATION NAME = MYSITUATION");
    w.header(
        2,
        "CONSTRAINTS=MYCONSTRAINTS   SYSTEM=MYSYSTEM   LOADING=MYLOADING   RESULTS=MYRESULTS",
    );
    w.header(1, "$END SITUATION");
    w.header(0, "$EXIT COMPONENT");

    if !registry.materials.is_empty() {
        w.header(0, "$ENTER MATERIAL");
        for material in &registry.materials {
            w.header(
                1,
                &format!("$MATERIAL  NAME = {} TYPE = {}", material.name, material.model),
            );
            if !material.elastic.is_empty() {
                w.header(2, "$ELASTIC  GENERAL  INPUT = DATA");
                w.row(material.elastic.iter().map(|&v| scientific(v)));
            }
            if let Some(density) = material.density {
                w.header(2, "$DENSITY  GENERAL  INPUT = DATA");
                w.row([scientific(density)]);
            }
            w.header(1, "$END MATERIAL");
        }
        w.header(0, "$EXIT MATERIAL");
    }
    w.header(0, "$FIN");
    w.finish()
}
