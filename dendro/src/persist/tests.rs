use std::path::PathBuf;

use common::test_utils::test_output_path;

use super::*;
use crate::config::Config;
use crate::node::NodeId;

fn two_peaks() -> Dendrogram {
    let grid = Grid::from_2d(5, 1, vec![9.0, 5.0, 2.0, 6.0, 8.0]).unwrap();
    Dendrogram::compute(grid, &Config::default()).unwrap()
}

fn extension(format: FileFormat) -> &'static str {
    match format {
        FileFormat::Yaml => "yaml",
        FileFormat::Json => "json",
        FileFormat::Bin => "bin",
    }
}

/// Writes a hand-edited file next to the other test outputs.
fn write_file(name: &str, file: &DendrogramFile) -> anyhow::Result<PathBuf> {
    let path = test_output_path(name);
    std::fs::write(&path, common::serialize(file, FileFormat::Json)?)?;
    Ok(path)
}

fn id(raw: u32) -> NodeId {
    NodeId::new(raw)
}

// ============================================================================
// Datasets
// ============================================================================

#[test]
fn test_min_max_range_skips_nan() {
    assert_eq!(min_max_range(&[3.0f32, f32::NAN, -1.0, 2.0]), [-1.0, 3.0]);
    assert_eq!(min_max_range(&[f32::NAN, 4.0]), [4.0, 4.0]);
}

#[test]
fn test_min_max_range_empty_or_all_nan() {
    assert_eq!(min_max_range::<f32>(&[]), [0.0, 0.0]);
    assert_eq!(min_max_range(&[f32::NAN]), [0.0, 0.0]);
    assert_eq!(min_max_range::<u32>(&[]), [0, 0]);
}

#[test]
fn test_file_carries_image_attributes() {
    let file = two_peaks().to_file(true);

    assert_eq!(file.n_dim, 2);
    assert_eq!(file.newick, "((1:4.000,2:2.000)3:0.000);");
    assert_eq!(file.index_map.shape, vec![1, 5]);
    assert_eq!(file.index_map.attrs.class, "IMAGE");
    assert_eq!(file.index_map.attrs.image_version, "1.2");
    assert_eq!(file.index_map.attrs.min_max_range, [1, 3]);
    assert_eq!(file.item_type_map.attrs.min_max_range, [1, 2]);

    let data = file.data.expect("raw data requested");
    assert_eq!(data.attrs.min_max_range, [2.0, 9.0]);
    assert_eq!(data.values, vec![9.0, 5.0, 2.0, 6.0, 8.0]);
}

#[test]
fn test_file_without_raw_data() {
    let file = two_peaks().to_file(false);
    assert!(file.data.is_none());
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_save_load_all_formats() -> anyhow::Result<()> {
    let original = two_peaks();

    for format in FileFormat::all_formats_for_testing() {
        let path = test_output_path(&format!("persist_two_peaks.{}", extension(format)));
        original.save(&path, true)?;
        let loaded = Dendrogram::load(&path)?;

        assert_eq!(loaded.to_newick(), original.to_newick(), "{format:?}");
        assert_eq!(loaded.trunk(), original.trunk());
        assert_eq!(loaded.index_map(), original.index_map());
        assert_eq!(loaded.item_type_map(), original.item_type_map());
        assert_eq!(loaded.data(), original.data());
        assert_eq!(loaded.children(id(3)), &[id(1), id(2)]);
        assert_eq!(loaded.parent(id(1)), Some(id(3)));
        assert_eq!(loaded.pixel_count(id(3)), 5);
    }
    Ok(())
}

#[test]
fn test_save_load_cube() -> anyhow::Result<()> {
    let mut values = vec![0.0f32; 2 * 3 * 4];
    values[0] = 5.0;
    values[1] = 4.0;
    values[23] = 6.0;
    values[22] = 3.0;
    let grid = Grid::from_3d(4, 3, 2, values)?;
    let original = Dendrogram::compute(grid, &Config::default().with_minimum_flux(1.0))?;
    assert_eq!(original.trunk().len(), 2);

    let path = test_output_path("persist_cube.dendro");
    original.save(&path, true)?;
    let loaded = Dendrogram::load(&path)?;

    assert_eq!(loaded.n_dim(), 3);
    assert_eq!(loaded.shape(), vec![2, 3, 4]);
    assert_eq!(loaded.to_newick(), original.to_newick());
    assert_eq!(loaded.index_map(), original.index_map());
    Ok(())
}

#[test]
fn test_load_requires_raw_data() -> anyhow::Result<()> {
    let path = test_output_path("persist_no_data.yaml");
    two_peaks().save(&path, false)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::MissingDataset("data"))));
    Ok(())
}

#[test]
fn test_load_with_external_grid() -> anyhow::Result<()> {
    let original = two_peaks();
    let path = test_output_path("persist_external_grid.json");
    original.save(&path, false)?;

    let grid = original.grid().clone();
    let loaded = Dendrogram::load_with_grid(&path, grid)?;
    assert_eq!(loaded.to_newick(), original.to_newick());
    assert_eq!(loaded.store().flux_range(id(1)), original.store().flux_range(id(1)));

    let wrong = Grid::from_2d(5, 2, vec![0.0; 10])?;
    let err = Dendrogram::load_with_grid(&path, wrong).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::ShapeMismatch { dataset: "data", .. })
    ));
    Ok(())
}

#[test]
fn test_unsupported_extension() {
    let err = two_peaks()
        .save(test_output_path("persist_tree.hdf5"), true)
        .unwrap_err();
    assert!(matches!(err, Error::FileFormat(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = Dendrogram::load(test_output_path("persist_does_not_exist.bin")).unwrap_err();
    match err {
        Error::Io { path, .. } => assert!(path.ends_with("persist_does_not_exist.bin")),
        other => panic!("expected I/O error, got {other:?}"),
    }
}

// ============================================================================
// Corrupted files
// ============================================================================

#[test]
fn test_owner_missing_from_tree_text() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.newick = "(1:4.000,2:2.000);".to_string();
    let path = write_file("persist_unknown_owner.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::UnknownOwner(owner)) if owner == id(3)));
    Ok(())
}

#[test]
fn test_label_without_voxels() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.newick = "((1:4.000,2:2.000)3:0.000,9:1.000);".to_string();
    let path = write_file("persist_empty_node.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::EmptyNode(node)) if node == id(9)));
    Ok(())
}

#[test]
fn test_kind_disagrees_with_tree_text() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.newick = "(1:4.000,2:2.000,3:0.000);".to_string();
    let path = write_file("persist_kind_mismatch.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::KindMismatch {
            index: 2,
            expected: "leaf",
            found: "branch",
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_invalid_rank() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.n_dim = 4;
    let path = write_file("persist_invalid_rank.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::InvalidRank(4))));
    Ok(())
}

#[test]
fn test_invalid_item_type() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.item_type_map.values[0] = 7;
    let path = write_file("persist_invalid_item_type.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::InvalidItemType { index: 0, value: 7 })
    ));
    Ok(())
}

#[test]
fn test_inconsistent_maps() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.item_type_map.values[4] = 0;
    let path = write_file("persist_inconsistent_maps.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::InconsistentMaps {
            index: 4,
            owner: 2,
            item_type: 0
        })
    ));
    Ok(())
}

#[test]
fn test_truncated_dataset() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.index_map.values.pop();
    let path = write_file("persist_truncated.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::LengthMismatch {
            dataset: "index_map",
            actual: 4,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_shape_with_overflowing_voxel_count() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    let shape = vec![1 << 21, 1 << 21, 1 << 22];
    file.n_dim = 3;
    file.index_map = Dataset::new(shape.clone(), Vec::new());
    file.item_type_map = Dataset::new(shape.clone(), Vec::new());
    file.data = Some(Dataset::new(shape, Vec::new()));
    let path = write_file("persist_overflowing_shape.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(
        matches!(
            err,
            Error::Format(FormatError::LengthMismatch {
                dataset: "data",
                actual: 0,
                ..
            })
        ),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn test_malformed_tree_text() -> anyhow::Result<()> {
    let mut file = two_peaks().to_file(true);
    file.newick = "((1:4.000,2:2.000)3:0.000;".to_string();
    let path = write_file("persist_bad_newick.json", &file)?;

    let err = Dendrogram::load(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Parse(crate::error::ParseError::UnbalancedParentheses { position: 0 })
    ));
    Ok(())
}
