//! Block-level overview of a parsed PERMAS deck.

use std::collections::BTreeMap;

use pvmap_asc::{Block, Deck};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ModelSummary {
    pub total_blocks: usize,
    pub total_rows: usize,
    pub keyword_counts: BTreeMap<String, usize>,
    /// Element rows per `TYPE`, supported or not.
    pub element_types: BTreeMap<String, usize>,
    pub node_rows: usize,
    pub element_rows: usize,
    pub material_defs: usize,
    pub element_sets: usize,
    pub node_sets: usize,
    pub surface_sets: usize,
    pub has_rsys: bool,
    pub has_elprop: bool,
}

impl ModelSummary {
    pub fn from_deck(deck: &Deck) -> Self {
        let mut summary = ModelSummary::default();

        for block in &deck.blocks {
            *summary
                .keyword_counts
                .entry(block.keyword.clone())
                .or_insert(0) += 1;

            match block.keyword.as_str() {
                "COOR" => summary.node_rows += block.rows.len(),
                "ELEMENT" => {
                    summary.element_rows += block.rows.len();
                    *summary
                        .element_types
                        .entry(element_type(block))
                        .or_insert(0) += block.rows.len();
                }
                "MATERIAL" => summary.material_defs += 1,
                "ESET" => summary.element_sets += 1,
                "NSET" => summary.node_sets += 1,
                "SFSET" => summary.surface_sets += 1,
                "RSYS" => summary.has_rsys = true,
                "ELPROP" => summary.has_elprop = true,
                _ => {}
            }
        }

        summary.total_blocks = deck.blocks.len();
        summary.total_rows = deck.blocks.iter().map(|b| b.rows.len()).sum();
        summary
    }
}

fn element_type(block: &Block) -> String {
    block
        .param("TYPE")
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "?".to_string())
}
