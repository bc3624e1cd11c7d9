//! Writes the mapped model and results into a VMAP tree.
//!
//! One pass per part for geometry, one pass per state for variables.
//! Nothing here is time-dependent, so identical input gives identical trees.

use std::collections::BTreeSet;

use log::{debug, info};
use pvmap_model::{ElementKind, EntityRegistry, FieldValues, Part};
use pvmap_store::{AttrValue, DataBuffer, Dataset, StorageMut, join_path};

use crate::associator::SetPlacement;
use crate::config::ConverterConfig;
use crate::csys::CoordinateSystemRecord;
use crate::error::Result;
use crate::layout::{self, *};
use crate::mapper::{MaterialParameter, MaterialRecord, extend_vmap_connectivity, vmap_element_type};
use crate::report::ConversionReport;
use crate::result_mapper::{ResultMapper, StateRecord, VariableRecord};

/// Everything the assembler writes besides results.
#[derive(Debug, Clone, Copy)]
pub struct MappedModel<'m> {
    pub registry: &'m EntityRegistry,
    pub placement: &'m SetPlacement,
    pub materials: &'m [MaterialRecord],
    /// Material index per element slot.
    pub element_materials: &'m [Option<u32>],
    pub coordinate_systems: &'m [CoordinateSystemRecord],
}

pub fn assemble<T: StorageMut>(
    target: &mut T,
    model: &MappedModel<'_>,
    results: Option<&ResultMapper<'_, '_>>,
    config: &ConverterConfig,
    report: &mut ConversionReport,
) -> Result<()> {
    write_metadata(target, config)?;
    write_units(target, config)?;
    write_element_types(target, model.registry)?;
    write_coordinate_systems(target, model.coordinate_systems)?;
    write_materials(target, model.materials)?;

    let mut stats = std::mem::take(&mut report.stats);
    for part in &model.registry.parts {
        let (nodes, sets) = write_part(target, model, part)?;
        stats.nodes += nodes;
        stats.elements += part.elements.len();
        stats.node_sets += model.placement.node_sets[part.id as usize].len();
        stats.surface_sets += sets;
    }
    stats.parts = model.registry.parts.len();
    stats.materials = model.materials.len();
    stats.coordinate_systems = model.coordinate_systems.len();

    target.create_group(VARIABLES)?;
    if let Some(mapper) = results {
        write_variables(target, mapper, model.registry.parts.len(), config)?;
        stats.states = mapper.state_count();
        stats.variables = mapper.variable_count();
    }
    report.stats = stats;
    info!(
        "assembled {} part(s), {} node(s), {} element(s), {} state(s)",
        report.stats.parts, report.stats.nodes, report.stats.elements, report.stats.states
    );
    Ok(())
}

fn write_metadata<T: StorageMut>(target: &mut T, config: &ConverterConfig) -> Result<()> {
    target.create_group(VMAP)?;
    target.set_attribute(VMAP, "VERSION", config.vmap_version.as_str().into())?;
    target.set_attribute(VMAP, "EXPORTER", config.exporter_name.as_str().into())?;
    if let Some(location) = &config.library_location {
        target.set_attribute(
            VMAP,
            "LIBRARY_LOCATION",
            location.display().to_string().into(),
        )?;
    }
    Ok(())
}

fn write_units<T: StorageMut>(target: &mut T, config: &ConverterConfig) -> Result<()> {
    for (index, (quantity, unit)) in config.units.base_units().into_iter().enumerate() {
        let path = join_path(UNITSYSTEM, quantity);
        target.create_group(&path)?;
        target.set_attribute(&path, MYIDENTIFIER, (index as i64 + 1).into())?;
        target.set_attribute(&path, "MYUNITSYMBOL", unit.symbol.as_str().into())?;
        target.set_attribute(&path, "MYSISCALE", unit.si_scale.into())?;
    }
    for unit in &config.units.derived {
        let path = join_path(UNITS, &unit.identifier.to_string());
        target.create_group(&path)?;
        target.set_attribute(&path, MYIDENTIFIER, unit.identifier.into())?;
        target.set_attribute(&path, "MYUNITSYMBOL", unit.symbol.as_str().into())?;
        target.set_attribute(
            &path,
            "MYUNITDIMENSION",
            unit.dimension.iter().map(|&d| i64::from(d)).collect::<Vec<_>>().into(),
        )?;
    }
    Ok(())
}

/// Element and integration types actually used by assigned elements.
fn write_element_types<T: StorageMut>(target: &mut T, registry: &EntityRegistry) -> Result<()> {
    let used: BTreeSet<ElementKind> = registry
        .elements()
        .iter()
        .filter(|e| e.part.is_some())
        .map(|e| e.kind)
        .collect();
    target.create_group(ELEMENTTYPES)?;
    target.create_group(INTEGRATIONTYPES)?;
    for kind in used {
        let vmap = vmap_element_type(kind);
        let path = join_path(ELEMENTTYPES, &vmap.identifier.to_string());
        target.create_group(&path)?;
        target.set_attribute(&path, MYIDENTIFIER, vmap.identifier.into())?;
        target.set_attribute(&path, "MYTYPENAME", kind.permas_code().into())?;
        target.set_attribute(&path, MYSHAPETYPE, vmap.shape.into())?;
        target.set_attribute(&path, "MYINTERPOLATIONTYPE", vmap.interpolation.into())?;
        target.set_attribute(&path, "MYINTEGRATIONTYPE", vmap.integration_identifier.into())?;
        target.set_attribute(&path, MYNUMBEROFNODES, (kind.num_nodes() as i64).into())?;
        target.set_attribute(&path, "MYDIMENSION", 3i64.into())?;

        let path = join_path(INTEGRATIONTYPES, &vmap.integration_identifier.to_string());
        target.create_group(&path)?;
        target.set_attribute(&path, MYIDENTIFIER, vmap.integration_identifier.into())?;
        target.set_attribute(&path, "MYTYPENAME", vmap.integration.into())?;
        target.set_attribute(
            &path,
            "MYNUMBEROFPOINTS",
            (vmap.integration_points as i64).into(),
        )?;
    }
    Ok(())
}

fn write_coordinate_systems<T: StorageMut>(
    target: &mut T,
    systems: &[CoordinateSystemRecord],
) -> Result<()> {
    target.create_group(COORDINATESYSTEM)?;
    for system in systems {
        let path = join_path(COORDINATESYSTEM, &system.identifier.to_string());
        target.create_group(&path)?;
        target.set_attribute(&path, MYIDENTIFIER, system.identifier.into())?;
        target.set_attribute(&path, "MYTYPE", system.vmap_type().into())?;
        target.set_attribute(&path, "MYREFERENCEPOINT", system.origin.to_vec().into())?;
        target.set_attribute(
            &path,
            "MYAXISVECTORS",
            system.axes.concat().into(),
        )?;
    }
    Ok(())
}

fn write_materials<T: StorageMut>(target: &mut T, materials: &[MaterialRecord]) -> Result<()> {
    target.create_group(MATERIAL)?;
    for material in materials {
        let path = join_path(MATERIAL, &material.identifier.to_string());
        target.create_group(&path)?;
        target.set_attribute(&path, MYNAME, material.name.as_str().into())?;
        target.set_attribute(&path, MYIDENTIFIER, material.identifier.into())?;
        target.set_attribute(&path, "MYMODEL", material.model.as_str().into())?;
        target.set_attribute(&path, "MYIDEALIZATION", material.idealization.into())?;

        let params = join_path(&path, PARAMETERS);
        target.create_group(&params)?;
        target.write_dataset(
            &join_path(&params, MYNAME),
            parameter_column(material, |p| p.name.clone()),
        )?;
        // VMAP material cards hold values as text.
        target.write_dataset(
            &join_path(&params, MYVALUE),
            parameter_column(material, |p| p.value.to_string()),
        )?;
        target.write_dataset(
            &join_path(&params, MYDESCRIPTION),
            parameter_column(material, |p| p.description.clone()),
        )?;
    }
    Ok(())
}

fn parameter_column(material: &MaterialRecord, f: impl Fn(&MaterialParameter) -> String) -> Dataset {
    Dataset::vector(DataBuffer::Text(material.parameters.iter().map(f).collect()))
}

/// Returns the number of points and of surface geometry sets written.
fn write_part<T: StorageMut>(target: &mut T, model: &MappedModel<'_>, part: &Part) -> Result<(usize, usize)> {
    let registry = model.registry;
    let path = layout::part_path(part.id as usize);
    target.create_group(&path)?;
    target.set_attribute(&path, MYNAME, part.name.as_str().into())?;
    target.set_attribute(&path, MYIDENTIFIER, i64::from(part.id).into())?;

    // Points
    let points = join_path(&path, POINTS);
    target.create_group(&points)?;
    let mut coordinates = Vec::with_capacity(part.nodes.len() * 3);
    let mut systems = Vec::with_capacity(part.nodes.len());
    for node in part.nodes.iter().filter_map(|&id| registry.node(id)) {
        coordinates.extend_from_slice(&node.coords);
        systems.push(node.coord_system.unwrap_or(UNDEFINED));
    }
    target.write_dataset(
        &join_path(&points, MYIDENTIFIERS),
        Dataset::vector(DataBuffer::Int32(part.nodes.clone())),
    )?;
    target.write_dataset(
        &join_path(&points, MYCOORDINATES),
        Dataset::matrix(part.nodes.len(), 3, DataBuffer::Float64(coordinates)),
    )?;
    if systems.iter().any(|&s| s != UNDEFINED) {
        target.write_dataset(
            &join_path(&points, MYCOORDINATESYSTEM),
            Dataset::vector(DataBuffer::Int32(systems)),
        )?;
    }

    // Elements
    let elements = join_path(&path, ELEMENTS);
    target.create_group(&elements)?;
    let count = part.elements.len();
    let mut types = Vec::with_capacity(count);
    let mut materials = Vec::with_capacity(count);
    let mut connectivity = Vec::new();
    for &id in &part.elements {
        let Some(slot) = registry.element_slot(id) else {
            continue;
        };
        let element = &registry.elements()[slot];
        types.push(vmap_element_type(element.kind).identifier);
        materials.push(
            model.element_materials[slot]
                .map(|m| m as i32)
                .unwrap_or(UNDEFINED),
        );
        extend_vmap_connectivity(element.kind, &element.nodes, &mut connectivity);
    }
    let int_vector = |v: Vec<i32>| Dataset::vector(DataBuffer::Int32(v));
    target.write_dataset(&join_path(&elements, MYIDENTIFIERS), int_vector(part.elements.clone()))?;
    target.write_dataset(&join_path(&elements, MYELEMENTTYPE), int_vector(types))?;
    target.write_dataset(
        &join_path(&elements, MYCOORDINATESYSTEM),
        int_vector(vec![UNDEFINED; count]),
    )?;
    target.write_dataset(&join_path(&elements, MYMATERIALTYPE), int_vector(materials))?;
    target.write_dataset(&join_path(&elements, MYCONNECTIVITY), int_vector(connectivity))?;

    // Geometry sets
    let sets = join_path(&path, GEOMETRYSETS);
    target.create_group(&sets)?;
    let mut next = 0usize;
    for &index in &model.placement.node_sets[part.id as usize] {
        let set = &registry.node_sets[index];
        let members: Vec<i32> = set
            .nodes
            .iter()
            .copied()
            .filter(|&id| registry.node(id).is_some_and(|n| n.part == Some(part.id)))
            .collect();
        let header = GeometrySet {
            name: &set.name,
            set_type: SET_TYPE_NODE,
            index_type: SET_INDEX_SINGLE,
            identifier: index as i64,
        };
        write_geometry_set(target, &sets, next, &header, Dataset::vector(DataBuffer::Int32(members)))?;
        next += 1;
    }

    let mut surfaces = 0usize;
    for placed in &model.placement.surface_sets[part.id as usize] {
        for &index in &placed.surfaces {
            let surface = &registry.surfaces[index];
            let mut pairs = Vec::with_capacity(surface.faces.len() * 2);
            for &(element, face) in &surface.faces {
                if registry.element(element).is_some_and(|e| e.part == Some(part.id)) {
                    pairs.extend([element, face]);
                }
            }
            let name = format!("{}_{}", placed.name, surface.id);
            let header = GeometrySet {
                name: &name,
                set_type: SET_TYPE_ELEMENT,
                index_type: SET_INDEX_PAIR,
                identifier: i64::from(surface.id),
            };
            let rows = pairs.len() / 2;
            write_geometry_set(
                target,
                &sets,
                next,
                &header,
                Dataset::matrix(rows, 2, DataBuffer::Int32(pairs)),
            )?;
            next += 1;
            surfaces += 1;
        }
    }

    debug!(
        "part {} ({}): {} points, {count} elements, {next} geometry sets",
        part.id,
        part.name,
        part.nodes.len()
    );
    Ok((part.nodes.len(), surfaces))
}

struct GeometrySet<'a> {
    name: &'a str,
    set_type: i64,
    index_type: i64,
    identifier: i64,
}

fn write_geometry_set<T: StorageMut>(
    target: &mut T,
    sets: &str,
    index: usize,
    header: &GeometrySet<'_>,
    data: Dataset,
) -> Result<()> {
    let path = join_path(sets, &index.to_string());
    target.create_group(&path)?;
    target.set_attribute(&path, MYSETNAME, header.name.into())?;
    target.set_attribute(&path, MYSETTYPE, header.set_type.into())?;
    target.set_attribute(&path, MYSETINDEXTYPE, header.index_type.into())?;
    target.set_attribute(&path, MYIDENTIFIER, header.identifier.into())?;
    target.write_dataset(&join_path(&path, MYGEOMETRYSETDATA), data)?;
    Ok(())
}

fn write_variables<T: StorageMut>(
    target: &mut T,
    mapper: &ResultMapper<'_, '_>,
    parts: usize,
    config: &ConverterConfig,
) -> Result<()> {
    for state in mapper.states() {
        let path = layout::state_path(state.index);
        write_state_header(target, &path, &state)?;
        for part in 0..parts {
            target.create_group(&join_path(&path, &part.to_string()))?;
        }
        for record in mapper.records(state.index) {
            write_variable(target, &path, &state, record, config)?;
        }
    }
    Ok(())
}

fn write_state_header<T: StorageMut>(target: &mut T, path: &str, state: &StateRecord) -> Result<()> {
    target.create_group(path)?;
    target.set_attribute(path, "MYSTATENAME", state.analysis.state_name().into())?;
    target.set_attribute(path, "MYSTEPINDEX", (state.index as i64).into())?;
    target.set_attribute(path, "MYTOTALTIME", state.value.into())?;
    target.set_attribute(path, "MYSTEPTIME", state.value.into())?;
    target.set_attribute(path, "MYINCREMENT", (-1i64).into())?;
    target.set_attribute(path, "MYANALYSISTYPE", state.analysis.permas_name().into())?;
    if let Some(diameter) = state.nodal_diameter {
        target.set_attribute(path, "MYNODALDIAMETER", diameter.into())?;
    }
    Ok(())
}

fn write_variable<T: StorageMut>(
    target: &mut T,
    state_path: &str,
    state: &StateRecord,
    record: VariableRecord<'_>,
    config: &ConverterConfig,
) -> Result<()> {
    if record.components == 0 {
        return Ok(());
    }
    let path = join_path(&join_path(state_path, &record.part.to_string()), record.name);
    target.create_group(&path)?;
    let location = match record.location {
        pvmap_model::FieldLocation::Node => LOCATION_NODE,
        pvmap_model::FieldLocation::Element => LOCATION_ELEMENT,
    };
    let attributes: [(&str, AttrValue); 10] = [
        ("MYDIMENSION", (record.components as i64).into()),
        ("MYLOCATION", location.into()),
        ("MYENTITY", (state.entity as i64).into()),
        (MYIDENTIFIER, record.identifier.into()),
        ("MYTIMEVALUE", state.value.into()),
        ("MYINCREMENTVALUE", (state.index as i64).into()),
        ("MYUNIT", record.unit.into()),
        (MYCOORDINATESYSTEM, config.result_coordinate_system.into()),
        ("MYMULTIPLICITY", 1i64.into()),
        ("MYVARIABLEDESCRIPTION", record.name.into()),
    ];
    for (name, value) in attributes {
        target.set_attribute(&path, name, value)?;
    }

    let rows = record.values.len() / record.components;
    // Row selections are owned and move in; whole-part views are copied once.
    let data = match record.values {
        FieldValues::F32(v) => DataBuffer::Float32(v.into_owned()),
        FieldValues::F64(v) => DataBuffer::Float64(v.into_owned()),
    };
    target.write_dataset(
        &join_path(&path, MYVALUES),
        Dataset::matrix(rows, record.components, data),
    )?;
    if let Some(ids) = record.geometry_ids {
        target.write_dataset(
            &join_path(&path, MYGEOMETRYIDS),
            Dataset::vector(DataBuffer::Int32(ids.to_vec())),
        )?;
    }
    Ok(())
}
