//! Input/Output for abundance matrices, annotations, gene-set catalogues and results

mod csv;

pub use self::csv::{
    read_abundance_matrix, read_annotation, read_feature_mapping, read_gene_list, read_gene_sets,
    write_enrichment_table, write_json, write_matrix,
};
