//! PERMAS model -> VMAP -> PERMAS ASCII keeps the model.

mod common;

use approx::assert_relative_eq;
use common::*;
use pvmap_asc::Deck;
use pvmap_convert::decoder::{DecodedModel, decode_deck, decode_model, model_lines, locate_situation};
use pvmap_convert::{
    ConversionOptions, ConversionReport, ConverterConfig, ForwardJob, RunState, convert_forward,
    convert_inverse, forward_in_memory, inverse_output_path, inverse_to_text,
};
use pvmap_model::EntityRegistry;
use pvmap_store::TreeFile;

fn decode_source(source: &TreeFile) -> EntityRegistry {
    let mut report = ConversionReport::new();
    let situation = locate_situation(source, &mut report).expect("situation");
    let lines = model_lines(source, &situation).expect("model lines");
    let DecodedModel { registry, .. } = decode_model(lines, &mut report).expect("decode source");
    registry
}

fn round_trip(model: &str) -> (EntityRegistry, EntityRegistry, String) {
    let source = permas_file(model);
    let mut vmap = TreeFile::new();
    forward_in_memory(
        &source,
        None,
        &mut vmap,
        &ConverterConfig::default(),
        &ConversionOptions::default(),
    )
    .expect("forward");
    let (text, _) = inverse_to_text(&vmap, &ConverterConfig::default()).expect("inverse");

    let deck = Deck::parse_str(&text).expect("emitted text parses");
    let mut report = ConversionReport::new();
    let DecodedModel { registry, .. } = decode_deck(&deck, &mut report).expect("decode emitted");
    (decode_source(&source), registry, text)
}

#[test]
fn nodes_and_connectivity_survive() {
    let (before, after, _) = round_trip(MIXED);
    assert_eq!(before.node_count(), after.node_count());
    for node in before.nodes() {
        let back = after.node(node.id).expect("node kept");
        for axis in 0..3 {
            assert_relative_eq!(node.coords[axis], back.coords[axis], max_relative = 1e-9);
        }
    }
    for element in before.elements() {
        let back = after.element(element.id).expect("element kept");
        assert_eq!(back.kind, element.kind);
        assert_eq!(back.nodes, element.nodes, "element {}", element.id);
    }
}

#[test]
fn sets_and_surfaces_survive() {
    let (before, after, _) = round_trip(MIXED);
    for set in &before.element_sets {
        let back = after.element_set(&set.name).expect("element set kept");
        assert_eq!(back.elements, set.elements);
    }
    for set in &before.node_sets {
        let back = after
            .node_sets
            .iter()
            .find(|s| s.name == set.name)
            .expect("node set kept");
        assert_eq!(back.nodes, set.nodes);
    }
    assert_eq!(after.surfaces.len(), 1);
    assert_eq!(after.surfaces[0].id, 3);
    assert_eq!(after.surfaces[0].sfset, "LOAD");
    assert_eq!(after.surfaces[0].faces, vec![(2, 1)]);
}

#[test]
fn materials_and_properties_survive() {
    let (_, after, text) = round_trip(CUBE);
    assert_eq!(after.materials.len(), 1);
    let steel = &after.materials[0];
    assert_eq!(steel.name, "STEEL");
    assert_eq!(steel.elastic.len(), 2);
    assert_relative_eq!(steel.elastic[0], 210000.0, max_relative = 1e-9);
    assert_relative_eq!(steel.elastic[1], 0.3, max_relative = 1e-9);
    assert_relative_eq!(steel.density.unwrap_or_default(), 7.85e-9, max_relative = 1e-9);
    assert_eq!(after.properties.len(), 1);
    assert_eq!(after.properties[0].eset, "BLOCK");
    assert!(text.contains("$ELPROP"));
}

#[test]
fn files_round_trip_through_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = dir.path().join("bracket.hdf");
    permas_file(MIXED).save(&model).expect("write source");

    let job = ForwardJob::new(&model, None);
    convert_forward(&job, &ConverterConfig::default(), &ConversionOptions::default())
        .expect("forward");
    assert_eq!(job.output, dir.path().join("bracket_toVMAP.hdf"));

    let output = inverse_output_path(&job.output);
    convert_inverse(&job.output, &output, &ConverterConfig::default()).expect("inverse");
    let text = std::fs::read_to_string(&output).expect("read text");
    assert!(Deck::parse_str(&text).is_ok());
    assert!(text.ends_with("$FIN\n"));
}

#[test]
fn node_set_spanning_parts_writes_nothing() {
    let model = MIXED.replace(
        "      $NSET NAME = APEX\n          14",
        "      $NSET NAME = APEX\n          1 14",
    );
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("split.hdf");
    permas_file(&model).save(&path).expect("write source");

    let job = ForwardJob::new(&path, None);
    let err = convert_forward(&job, &ConverterConfig::default(), &ConversionOptions::default())
        .expect_err("set spans two parts");
    assert_eq!(err.stage, RunState::Associating);
    assert!(err.to_string().contains("APEX"), "{err}");
    assert!(!job.output.exists());
}
