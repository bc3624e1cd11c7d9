use log::{debug, info};
use pvmap_asc::{Block, Deck};
use pvmap_model::{
    CoordinateSystem, CsysKind, Element, ElementKind, ElementProperty, ElementSet, EntityRegistry,
    Material, ModelSummary, Node, NodeSet, RegistryError, Surface, SurfaceSet,
};

use crate::error::{ConvertError, Result};
use crate::report::{Condition, ConversionReport, EntityKind};

/// A row that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub line: usize,
    pub message: String,
}

/// Element row before its type and node references are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub id: i32,
    pub line: usize,
    pub nodes: Vec<i32>,
}

#[derive(Debug)]
pub struct DecodedModel {
    pub registry: EntityRegistry,
    pub nodal_diameter: Option<i32>,
    pub summary: ModelSummary,
}

/// Parses and decodes model text. A block whose header does not parse is
/// reported and skipped with its rows.
pub fn decode_model(lines: &[String], report: &mut ConversionReport) -> Result<DecodedModel> {
    let deck = Deck::parse_lenient(lines);
    for err in &deck.skipped {
        report.record(Condition::SkippedBlock {
            line: err.line,
            message: err.message.clone(),
        });
    }
    decode_deck(&deck, report)
}

/// Builds the registry from a parsed deck. Rows that fail to decode are
/// reported and skipped; only missing nodes or elements abort.
pub fn decode_deck(deck: &Deck, report: &mut ConversionReport) -> Result<DecodedModel> {
    let summary = ModelSummary::from_deck(deck);
    let mut registry = EntityRegistry::new();
    let mut element_blocks: Vec<(&Block, ElementKind)> = Vec::new();
    let mut current_material: Option<usize> = None;

    for block in &deck.blocks {
        match block.keyword.as_str() {
            "COOR" => decode_coor(block, &mut registry, report),
            "ELEMENT" => match block.param("TYPE") {
                Some(code) => match ElementKind::from_permas_code(code) {
                    Some(kind) => element_blocks.push((block, kind)),
                    None => report_unsupported(block, code, report),
                },
                None => malformed(block, block.line_start, "missing TYPE", report),
            },
            "ESET" | "NSET" => decode_set(block, &mut registry, report),
            _ if block.is("SURFACE", Some("ELEMENTS")) => decode_surface(block, &mut registry, report),
            "SFSET" => decode_sfset(block, &mut registry, report),
            "MATERIAL" => current_material = begin_material(block, &mut registry, report),
            "ELASTIC" | "DENSITY" => match current_material {
                Some(index) => decode_material_data(block, &mut registry.materials[index], report),
                None => malformed(block, block.line_start, "outside of $MATERIAL", report),
            },
            _ if block.is("END", Some("MATERIAL")) => current_material = None,
            "ELPROP" => decode_elprop(block, &mut registry),
            "RSYS" => {
                for record in rsys_records(block) {
                    match record {
                        Ok(system) => registry.coordinate_systems.push(system),
                        Err(e) => malformed(block, e.line, &e.message, report),
                    }
                }
            }
            _ => {}
        }
    }

    if registry.node_count() == 0 {
        return Err(ConvertError::MissingBlock("no $COOR node data".to_string()));
    }

    for (block, kind) in element_blocks {
        decode_elements(block, kind, &mut registry, report);
    }
    if registry.element_count() == 0 {
        return Err(ConvertError::MissingBlock(
            "no supported $ELEMENT data".to_string(),
        ));
    }

    check_node_systems(&mut registry, report);

    let nodal_diameter = nodal_diameter(deck);
    info!(
        "decoded {} nodes, {} elements, {} element sets, {} materials",
        registry.node_count(),
        registry.element_count(),
        registry.element_sets.len(),
        registry.materials.len()
    );
    Ok(DecodedModel {
        registry,
        nodal_diameter,
        summary,
    })
}

/// `MNODDIA` of a `$PARAMETER` block, if any.
pub fn nodal_diameter(deck: &Deck) -> Option<i32> {
    deck.blocks_named("PARAMETER")
        .flat_map(|b| b.rows.iter())
        .find(|row| row.first().is_some_and(|t| t.eq_ignore_ascii_case("MNODDIA")))
        .and_then(|row| row.tokens.last())
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.round() as i32)
}

pub fn coor_records(block: &Block) -> impl Iterator<Item = std::result::Result<Node, RecordError>> + '_ {
    let system = block
        .param("RSYS")
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|&s| s != 0);
    block.rows.iter().map(move |row| {
        if row.tokens.len() < 4 {
            return Err(RecordError {
                line: row.line,
                message: "expected node id and three coordinates".to_string(),
            });
        }
        let id = parse_id(&row.tokens[0], row.line)?;
        let mut coords = [0.0; 3];
        for (c, token) in coords.iter_mut().zip(&row.tokens[1..4]) {
            *c = parse_real(token, row.line)?;
        }
        let mut node = Node::new(id, coords);
        node.coord_system = system;
        Ok(node)
    })
}

pub fn element_records(
    block: &Block,
) -> impl Iterator<Item = std::result::Result<ElementRecord, RecordError>> + '_ {
    block.rows.iter().map(|row| {
        let ids = row
            .tokens
            .iter()
            .map(|t| parse_id(t, row.line))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let Some((&id, nodes)) = ids.split_first() else {
            return Err(RecordError {
                line: row.line,
                message: "empty element row".to_string(),
            });
        };
        Ok(ElementRecord {
            id,
            line: row.line,
            nodes: nodes.to_vec(),
        })
    })
}

pub fn id_records(block: &Block) -> impl Iterator<Item = std::result::Result<i32, RecordError>> + '_ {
    block
        .rows
        .iter()
        .flat_map(|row| row.tokens.iter().map(move |t| parse_id(t, row.line)))
}

/// `(element, face)` pairs of a `$SURFACE ELEMENTS` block.
pub fn surface_records(
    block: &Block,
) -> impl Iterator<Item = std::result::Result<(i32, i32), RecordError>> + '_ {
    block.rows.iter().flat_map(|row| {
        let odd = row.tokens.len() % 2 != 0;
        let pairs = row.tokens.chunks(2).map(move |pair| {
            if odd {
                return Err(RecordError {
                    line: row.line,
                    message: "expected element/face pairs".to_string(),
                });
            }
            Ok((parse_id(&pair[0], row.line)?, parse_id(&pair[1], row.line)?))
        });
        // One error per malformed row is enough.
        pairs.take(if odd { 1 } else { usize::MAX })
    })
}

/// `$RSYS` rows: id, optional type word, origin and two axis vectors.
/// Systems without a type are taken as cylindrical.
pub fn rsys_records(
    block: &Block,
) -> impl Iterator<Item = std::result::Result<CoordinateSystem, RecordError>> + '_ {
    let header_kind = block.param("TYPE").and_then(CsysKind::from_keyword);
    block.rows.iter().map(move |row| {
        let Some((first, rest)) = row.tokens.split_first() else {
            return Err(RecordError {
                line: row.line,
                message: "empty coordinate system row".to_string(),
            });
        };
        let id = parse_id(first, row.line)?;
        let mut kind = header_kind;
        let mut numbers = Vec::with_capacity(9);
        for token in rest {
            if let Ok(v) = token.parse::<f64>() {
                numbers.push(v);
            } else if let Some(k) = CsysKind::from_keyword(token) {
                kind = Some(k);
            }
        }
        if numbers.len() < 9 {
            return Err(RecordError {
                line: row.line,
                message: format!(
                    "coordinate system {id} needs origin and two axes, found {} values",
                    numbers.len()
                ),
            });
        }
        Ok(CoordinateSystem {
            id,
            kind: kind.unwrap_or(CsysKind::Cylindrical),
            origin: [numbers[0], numbers[1], numbers[2]],
            axis1: [numbers[3], numbers[4], numbers[5]],
            axis2: [numbers[6], numbers[7], numbers[8]],
        })
    })
}

fn decode_coor(block: &Block, registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let mut count = 0usize;
    for record in coor_records(block) {
        match record {
            Ok(node) => {
                let id = node.id;
                match registry.insert_node(node) {
                    Ok(_) => count += 1,
                    Err(_) => report.record(Condition::DuplicateDefinition {
                        entity: EntityKind::Node,
                        id,
                    }),
                }
            }
            Err(e) => malformed(block, e.line, &e.message, report),
        }
    }
    debug!("$COOR at line {}: {count} nodes", block.line_start);
}

fn report_unsupported(block: &Block, code: &str, report: &mut ConversionReport) {
    for row in &block.rows {
        match row.first().map(|t| parse_id(t, row.line)) {
            Some(Ok(element)) => report.record(Condition::UnsupportedElementType {
                element,
                code: code.to_ascii_uppercase(),
            }),
            Some(Err(e)) => malformed(block, e.line, &e.message, report),
            None => {}
        }
    }
}

fn decode_elements(
    block: &Block,
    kind: ElementKind,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) {
    for record in element_records(block) {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                malformed(block, e.line, &e.message, report);
                continue;
            }
        };
        if let Some(&node) = record.nodes.iter().find(|&&n| registry.node_slot(n).is_none()) {
            report.record(Condition::UnknownNodeReference {
                element: record.id,
                node,
            });
            continue;
        }
        match registry.insert_element(Element::new(record.id, kind, record.nodes)) {
            Ok(_) => {}
            Err(RegistryError::DuplicateElement(id)) => {
                report.record(Condition::DuplicateDefinition {
                    entity: EntityKind::Element,
                    id,
                })
            }
            Err(e) => malformed(block, record.line, &e.to_string(), report),
        }
    }
}

fn decode_set(block: &Block, registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let Some(name) = block.name() else {
        malformed(block, block.line_start, "set without NAME", report);
        return;
    };
    let mut ids = Vec::new();
    for record in id_records(block) {
        match record {
            Ok(id) => ids.push(id),
            Err(e) => malformed(block, e.line, &e.message, report),
        }
    }

    // Repeated blocks of one set extend it.
    if block.keyword == "ESET" {
        match registry.element_sets.iter_mut().find(|s| s.name == name) {
            Some(set) => set.elements.extend(ids),
            None => registry.element_sets.push(ElementSet {
                name: name.to_string(),
                elements: ids,
            }),
        }
    } else {
        match registry.node_sets.iter_mut().find(|s| s.name == name) {
            Some(set) => set.nodes.extend(ids),
            None => registry.node_sets.push(NodeSet {
                name: name.to_string(),
                nodes: ids,
            }),
        }
    }
}

fn decode_surface(block: &Block, registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let Some(id) = block.param("SURFID").and_then(|v| v.parse::<i32>().ok()) else {
        malformed(block, block.line_start, "surface without numeric SURFID", report);
        return;
    };
    let sfset = block.param("SFSET").unwrap_or("SURFACE").to_string();
    let mut faces = Vec::new();
    for record in surface_records(block) {
        match record {
            Ok(face) => faces.push(face),
            Err(e) => malformed(block, e.line, &e.message, report),
        }
    }
    match registry
        .surfaces
        .iter_mut()
        .find(|s| s.id == id && s.sfset == sfset)
    {
        Some(surface) => surface.faces.extend(faces),
        None => registry.surfaces.push(Surface { id, sfset, faces }),
    }
}

fn decode_sfset(block: &Block, registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let Some(name) = block.name() else {
        malformed(block, block.line_start, "surface set without NAME", report);
        return;
    };
    let mut surfaces = Vec::new();
    for record in id_records(block) {
        match record {
            Ok(id) => surfaces.push(id),
            Err(e) => malformed(block, e.line, &e.message, report),
        }
    }
    match registry.surface_sets.iter_mut().find(|s| s.name == name) {
        Some(set) => set.surfaces.extend(surfaces),
        None => registry.surface_sets.push(SurfaceSet {
            name: name.to_string(),
            surfaces,
        }),
    }
}

fn begin_material(
    block: &Block,
    registry: &mut EntityRegistry,
    report: &mut ConversionReport,
) -> Option<usize> {
    let Some(name) = block.name() else {
        malformed(block, block.line_start, "material without NAME", report);
        return None;
    };
    if let Some(existing) = registry.material_index(name) {
        return Some(existing);
    }
    let mut material = Material::new(name);
    if let Some(model) = block.param("TYPE") {
        material.model = model.to_ascii_uppercase();
    }
    registry.materials.push(material);
    Some(registry.materials.len() - 1)
}

fn decode_material_data(block: &Block, material: &mut Material, report: &mut ConversionReport) {
    let tabulated = block.has_flag("TEMPERATURE")
        || block.param("TEMPERATURE").is_some()
        || block
            .param("INPUT")
            .is_some_and(|v| v.eq_ignore_ascii_case("TABLE"))
        || block.rows.len() > 1;
    if tabulated {
        material.temperature_dependent = true;
        return;
    }
    let Some(row) = block.rows.first() else {
        malformed(block, block.line_start, "no data row", report);
        return;
    };
    let values = match row
        .tokens
        .iter()
        .map(|t| parse_real(t, row.line))
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        Ok(values) => values,
        Err(e) => {
            malformed(block, e.line, &e.message, report);
            return;
        }
    };
    if block.keyword == "ELASTIC" {
        material.elastic = values;
    } else {
        material.density = values.first().copied();
    }
}

fn decode_elprop(block: &Block, registry: &mut EntityRegistry) {
    for row in &block.rows {
        if let (Some(eset), Some(material)) = (row.first(), row.value_of("MATERIAL")) {
            registry.properties.push(ElementProperty {
                eset: eset.to_string(),
                material: material.to_string(),
            });
        }
    }
}

fn check_node_systems(registry: &mut EntityRegistry, report: &mut ConversionReport) {
    let known: Vec<i32> = registry.coordinate_systems.iter().map(|c| c.id).collect();
    let (nodes, _, _) = registry.arenas_mut();
    for node in nodes.iter_mut() {
        if let Some(system) = node.coord_system
            && !known.contains(&system)
        {
            report.record(Condition::UnknownCoordinateSystem {
                node: node.id,
                system,
            });
            node.coord_system = None;
        }
    }
}

fn malformed(block: &Block, line: usize, message: &str, report: &mut ConversionReport) {
    report.record(Condition::MalformedRecord {
        block: block.keyword.clone(),
        line,
        message: message.to_string(),
    });
}

fn parse_id(token: &str, line: usize) -> std::result::Result<i32, RecordError> {
    token.parse::<i32>().map_err(|_| RecordError {
        line,
        message: format!("invalid id '{token}'"),
    })
}

fn parse_real(token: &str, line: usize) -> std::result::Result<f64, RecordError> {
    token.parse::<f64>().map_err(|_| RecordError {
        line,
        message: format!("invalid number '{token}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: &str = r#"
$ENTER COMPONENT NAME = KOMP
   $STRUCTURE
      $COOR
          1  0.0 0.0 0.0
          2  1.0 0.0 0.0
          3  1.0 1.0 0.0
          4  0.0 1.0 0.0
          5  0.0 0.0 1.0
          6  1.0 0.0 1.0
          7  1.0 1.0 1.0
          8  0.0 1.0 1.0
!
      $ELEMENT TYPE = HEXE8
          1  1 2 3 4 5 6 7 8
      $ELEMENT TYPE = PENTA6
          2  1 2 3 5 6 7
      $ESET NAME = BLOCK
          1
      $NSET NAME = BOTTOM
          1 2 3 4
      $SURFACE ELEMENTS SURFID = 4 SFSET = TOP
          1 2
      $SFSET NAME = TOP
          4
      $ELPROP
          BLOCK MATERIAL = STEEL
      $RSYS
          1 CARTESIAN 0 0 0
          & 1 0 0  0 1 0
   $END STRUCTURE
   $SITUATION NAME = SIT1
   $END SITUATION
$EXIT COMPONENT
$ENTER MATERIAL
   $MATERIAL NAME = STEEL TYPE = ISO
      $ELASTIC GENERAL INPUT = DATA
          210000.0 0.3
      $DENSITY GENERAL INPUT = DATA
          7.85E-9
   $END MATERIAL
$EXIT MATERIAL
$FIN
"#;

    fn decode(src: &str) -> (DecodedModel, ConversionReport) {
        let deck = Deck::parse_str(src).expect("deck");
        let mut report = ConversionReport::new();
        let model = decode_deck(&deck, &mut report).expect("decode");
        (model, report)
    }

    #[test]
    fn decodes_structure_and_material_blocks() {
        let (model, report) = decode(CUBE);
        let reg = &model.registry;
        assert_eq!(reg.node_count(), 8);
        assert_eq!(reg.element_count(), 1);
        assert_eq!(reg.element(1).map(|e| e.kind), Some(ElementKind::Hexe8));
        assert_eq!(reg.element_sets[0].elements, vec![1]);
        assert_eq!(reg.node_sets[0].nodes, vec![1, 2, 3, 4]);
        assert_eq!(reg.surfaces[0].faces, vec![(1, 2)]);
        assert_eq!(reg.surface_sets[0].surfaces, vec![4]);
        assert_eq!(reg.properties[0].material, "STEEL");
        assert_eq!(reg.coordinate_systems[0].kind, CsysKind::Cartesian);
        assert_eq!(reg.coordinate_systems[0].axis2, [0.0, 1.0, 0.0]);

        let steel = &reg.materials[0];
        assert_eq!(steel.elastic, vec![210000.0, 0.3]);
        assert_eq!(steel.density, Some(7.85e-9));
        assert!(!steel.temperature_dependent);

        assert_eq!(report.count("UnsupportedElementType"), 1);
        assert_eq!(report.conditions.len(), 1);
        assert_eq!(model.summary.element_types.get("PENTA6"), Some(&1));
    }

    #[test]
    fn connectivity_matches_type_after_decode() {
        let src = CUBE.replace("1  1 2 3 4 5 6 7 8", "1  1 2 3 4 5 6 7 8\n          9  1 2 3");
        let (model, report) = decode(&src);
        for element in model.registry.elements() {
            assert_eq!(element.nodes.len(), element.kind.num_nodes());
        }
        assert_eq!(report.count("MalformedRecord"), 1);
    }

    #[test]
    fn elements_with_unknown_nodes_are_dropped() {
        let src = CUBE.replace("1  1 2 3 4 5 6 7 8", "1  1 2 3 4 5 6 7 8\n          3  1 2 3 4 5 6 7 99");
        let (model, report) = decode(&src);
        assert_eq!(model.registry.element_count(), 1);
        let missing: Vec<_> = report.of_kind("UnknownNodeReference").collect();
        assert_eq!(
            missing,
            vec![&Condition::UnknownNodeReference {
                element: 3,
                node: 99
            }]
        );
    }

    #[test]
    fn temperature_tables_are_flagged() {
        let src = CUBE.replace(
            "$ELASTIC GENERAL INPUT = DATA\n          210000.0 0.3",
            "$ELASTIC GENERAL INPUT = DATA TEMPERATURE\n          210000.0 0.3 20.0\n          200000.0 0.3 200.0",
        );
        let (model, _) = decode(&src);
        assert!(model.registry.materials[0].temperature_dependent);
        assert!(model.registry.materials[0].elastic.is_empty());
    }

    #[test]
    fn missing_nodes_or_elements_are_fatal() {
        let mut report = ConversionReport::new();
        let deck = Deck::parse_str("$ELEMENT TYPE = HEXE8\n 1 1 2 3 4 5 6 7 8\n").expect("deck");
        let err = decode_deck(&deck, &mut report).expect_err("no nodes");
        assert!(matches!(err, ConvertError::MissingBlock(_)));

        let deck = Deck::parse_str("$COOR\n 1 0 0 0\n$ELEMENT TYPE = QUAD4\n 1 1 1 1 1\n")
            .expect("deck");
        let err = decode_deck(&deck, &mut report).expect_err("no supported elements");
        assert!(matches!(err, ConvertError::MissingBlock(_)));
    }

    #[test]
    fn unknown_rsys_reference_is_reported() {
        let src = CUBE.replace("      $COOR\n", "      $COOR RSYS = 7\n");
        let (model, report) = decode(&src);
        assert_eq!(report.count("UnknownCoordinateSystem"), 8);
        assert!(model.registry.nodes().iter().all(|n| n.coord_system.is_none()));
    }

    #[test]
    fn nodal_diameter_is_read_from_parameters() {
        let deck = Deck::parse_str("$PARAMETER\n      MNODDIA 3.0\n      OTHER 1\n").expect("deck");
        assert_eq!(nodal_diameter(&deck), Some(3));
        let deck = Deck::parse_str("$PARAMETER\n OTHER 1\n").expect("deck");
        assert_eq!(nodal_diameter(&deck), None);
    }

    #[test]
    fn rsys_without_type_defaults_to_cylindrical() {
        let deck = Deck::parse_str("$RSYS\n 5 0 0 0 0 0 1 1 0 0\n 6 1 2\n").expect("deck");
        let records: Vec<_> = rsys_records(&deck.blocks[0]).collect();
        assert_eq!(
            records[0].as_ref().map(|c| c.kind),
            Ok(CsysKind::Cylindrical)
        );
        assert!(records[1].is_err());
    }

    #[test]
    fn unparsable_header_skips_only_its_block() {
        let src = CUBE.replace(
            "$ENTER MATERIAL\n",
            "$DUMMY NOTE =\n 1 2 3\n$ENTER MATERIAL\n",
        );
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        let mut report = ConversionReport::new();
        let model = decode_model(&lines, &mut report).expect("decode");
        assert_eq!(model.registry.node_count(), 8);
        assert_eq!(model.registry.materials.len(), 1);
        let skipped: Vec<&Condition> = report.of_kind("SkippedBlock").collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(
            skipped[0],
            Condition::SkippedBlock { message, .. } if message.contains("NOTE")
        ));
    }
}
