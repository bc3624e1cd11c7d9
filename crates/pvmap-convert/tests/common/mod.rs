//! PERMAS-HDF trees built in memory for the integration tests.

#![allow(dead_code)]

use pvmap_store::{AttrValue, DataBuffer, Dataset, Storage, StorageMut, TreeFile};

pub const SITUATION: &str = "/KOMP/SIT1";

/// One HEXE8 block with a material and a base node set.
pub const CUBE: &str = r#"
$ENTER COMPONENT NAME = KOMP DOFTYPE = DISP
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
      $ESET NAME = BLOCK
          1
      $NSET NAME = BASE
          1 2 3 4
      $ELPROP
          BLOCK MATERIAL = STEEL
   $END STRUCTURE
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

/// Two HEXE8 blocks sharing nodes 5 to 8, one element set each.
pub const STACKED: &str = r#"
$ENTER COMPONENT NAME = KOMP DOFTYPE = DISP
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
          9  0.0 0.0 2.0
          10 1.0 0.0 2.0
          11 1.0 1.0 2.0
          12 0.0 1.0 2.0
      $ELEMENT TYPE = HEXE8
          1  1 2 3 4 5 6 7 8
          2  5 6 7 8 9 10 11 12
      $ESET NAME = LOWER
          1
      $ESET NAME = UPPER
          2
   $END STRUCTURE
$EXIT COMPONENT
$FIN
"#;

/// A hexahedron and a quadratic tetrahedron in separate parts, with node
/// and surface sets.
pub const MIXED: &str = r#"
$ENTER COMPONENT NAME = KOMP DOFTYPE = DISP
   $STRUCTURE
      $COOR
          1  0.0    0.0   0.0
          2  2.5    0.0   0.0
          3  2.5    1.25  0.0
          4  0.0    1.25  0.0
          5  0.0    0.0  -1.5
          6  2.5    0.0  -1.5
          7  2.5    1.25 -1.5
          8  0.0    1.25 -1.5
          11 10.0   0.0   0.0
          12 12.0   0.0   0.0
          13 10.0   2.0   0.0
          14 10.0   0.0   2.0
          15 11.0   0.0   0.0
          16 11.0   1.0   0.0
          17 10.0   1.0   0.0
          18 10.0   0.0   1.0
          19 11.0   0.0   1.0
          20 10.0   1.0   1.0
      $ELEMENT TYPE = HEXE8
          1  1 2 3 4 5 6 7 8
      $ELEMENT TYPE = TET10
          2  11 15 12 16 13 17 18 19 20 14
      $ESET NAME = BRICK
          1
      $ESET NAME = TIP
          2
      $NSET NAME = FIXED
          1 2 3 4
      $NSET NAME = APEX
          14
      $SURFACE ELEMENTS SURFID = 3 SFSET = LOAD
          2 1
      $ELPROP
          BRICK MATERIAL = STEEL
          TIP MATERIAL = STEEL
   $END STRUCTURE
$EXIT COMPONENT
$ENTER MATERIAL
   $MATERIAL NAME = STEEL TYPE = ISO
      $ELASTIC GENERAL INPUT = DATA
          210000.0 0.3
   $END MATERIAL
$EXIT MATERIAL
$FIN
"#;

pub fn permas_file(model: &str) -> TreeFile {
    let mut tree = TreeFile::new();
    tree.write_dataset("/.File Header", text(&["PERMAS-HDF"]))
        .expect("header");
    let lines: Vec<&str> = model.lines().collect();
    tree.write_dataset(&format!("{SITUATION}/.Model"), text(&lines))
        .expect("model");
    tree
}

pub fn text(lines: &[&str]) -> Dataset {
    Dataset::vector(DataBuffer::Text(lines.iter().map(|l| l.to_string()).collect()))
}

pub fn set_analysis(tree: &mut TreeFile, analysis: &str) {
    tree.write_dataset(&format!("{SITUATION}/.Analysis"), text(&[analysis]))
        .expect("analysis");
}

/// Adds a result group whose column `c` holds `ids.len() * components`
/// values equal to `c + 1` plus the row index.
pub fn add_variable(tree: &mut TreeFile, name: &str, steps: &[f64], ids: &[i32], components: usize) {
    let group = format!("{SITUATION}/{name}");
    tree.write_dataset(
        &format!("{group}/.ColDes"),
        Dataset::vector(DataBuffer::Float64(steps.to_vec())),
    )
    .expect("coldes");
    tree.write_dataset(
        &format!("{group}/.RowDes"),
        Dataset::vector(DataBuffer::Int32(ids.to_vec())),
    )
    .expect("rowdes");
    for column in 0..steps.len() {
        let values: Vec<f32> = (0..ids.len())
            .flat_map(|row| std::iter::repeat_n((column + 1) as f32 + row as f32, components))
            .collect();
        tree.write_dataset(
            &format!("{group}/Column{}", column + 1),
            Dataset::matrix(ids.len(), components, DataBuffer::Float32(values)),
        )
        .expect("column");
    }
}

pub fn attr(tree: &TreeFile, path: &str, name: &str) -> AttrValue {
    tree.attribute(path, name)
        .expect("group")
        .cloned()
        .unwrap_or_else(|| panic!("{path} has no attribute {name}"))
}

pub fn ints(tree: &TreeFile, path: &str) -> Vec<i64> {
    tree.dataset(path)
        .expect("dataset")
        .data
        .to_i64()
        .expect("integer dataset")
}
