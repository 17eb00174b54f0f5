mod common;

use common::*;
use reference_alignment::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Layout {
    _dir: TempDir,
    search: PathBuf,
    input: PathBuf,
    labels: PathBuf,
    output: PathBuf,
}

fn layout(store: &ArchiveStore) -> Layout {
    let dir = TempDir::new().unwrap();
    let search = dir.path().join("references");
    let source = search.join("embryo_a").join("stack.vol");
    let distractor = search.join("embryo_b.vol");

    store.write(&source, "/reference", &reference_volume(3)).unwrap();
    store.write(&source, "/training", &indexed_volume(3, 128, 128)).unwrap();
    store.write(&source, "/mask", &indexed_volume(3, 64, 64)).unwrap();
    store.write(&distractor, "/reference", &distractor_volume(3)).unwrap();
    store.write(&distractor, "/training", &indexed_volume(3, 128, 128)).unwrap();

    let input = dir.path().join("input.vol");
    store.write(&input, "/reference", &cropped_input(3)).unwrap();
    let labels = dir.path().join("labels.vol");
    store.write(&labels, "/labels", &indexed_volume(3, 80, 88)).unwrap();

    Layout {
        search,
        input,
        labels,
        output: dir.path().join("out"),
        _dir: dir,
    }
}

fn request(layout: &Layout, input: &Path) -> CropRequest {
    CropRequest {
        input: InputSource::Archive {
            path: input.to_path_buf(),
            dataset: "/reference".into(),
        },
        search_folder: layout.search.clone(),
        label_file: Some(layout.labels.clone()),
        output_folder: layout.output.clone(),
    }
}

#[test]
fn test_crop_finder_writes_cropped_training_set() {
    let store = ArchiveStore::new();
    let layout = layout(&store);
    let finder = CropFinder::from_config(Arc::new(ArchiveStore::new()), &Config::default()).unwrap();

    let report = finder.run(&request(&layout, &layout.input)).unwrap().unwrap();
    assert_eq!(report.reference.path.file_name().unwrap(), "stack.vol");
    assert_eq!((report.alignment.dx, report.alignment.dy), CROP_OFFSET);
    assert_eq!(report.output, layout.output.join("stack.vol"));

    let written = store.list_datasets(&report.output).unwrap();
    assert_eq!(written, vec!["/training/labels", "/training/reference"]);

    let training = store.open(&report.output, "/training/reference").unwrap();
    assert_eq!(training.shape(), &[3, 80, 88]);
    let interval = &report.intervals["/training"];
    assert_eq!(interval.min, vec![0, 9, 6]);
    assert_eq!(interval.max, vec![2, 88, 93]);
    let first = training.slice(0, 0).unwrap();
    assert_eq!(first[[0, 0]], (9 * 1000 + 6) as f32);
    assert_eq!(training.slice(2, 0).unwrap()[[79, 87]], (2_000_000 + 88 * 1000 + 93) as f32);

    let labels = store.open(&report.output, "/training/labels").unwrap();
    assert_eq!(labels, indexed_volume(3, 80, 88));
}

#[test]
fn test_no_match_writes_nothing() {
    let store = ArchiveStore::new();
    let layout = layout(&store);
    let unrelated = layout.output.with_file_name("unrelated.vol");
    store.write(&unrelated, "/reference", &stack(&speckle(88, 80, 23), 3)).unwrap();

    let finder = CropFinder::from_config(Arc::new(ArchiveStore::new()), &Config::default()).unwrap();
    let result = finder.run(&request(&layout, &unrelated)).unwrap();
    assert!(result.is_none());
    assert!(!layout.output.exists());
}

#[test]
fn test_filter_restricts_candidates() {
    let store = ArchiveStore::new();
    let layout = layout(&store);
    let mut config = Config::default();
    config.search.filter = "embryo_b".into();

    let finder = CropFinder::from_config(Arc::new(ArchiveStore::new()), &config).unwrap();
    assert!(finder.run(&request(&layout, &layout.input)).unwrap().is_none());
}

#[test]
fn test_image_stack_input() {
    let store = ArchiveStore::new();
    let layout = layout(&store);
    let stack_dir = layout.output.with_file_name("slices");
    std::fs::create_dir_all(&stack_dir).unwrap();
    let input = cropped_input(3);
    for z in 0..3 {
        let plane = input.slice(z, 0).unwrap();
        let image = image::GrayImage::from_fn(88, 80, |x, y| {
            image::Luma([plane[[y as usize, x as usize]] as u8])
        });
        image.save(stack_dir.join(format!("z{z:02}.png"))).unwrap();
    }

    let finder = CropFinder::from_config(Arc::new(ArchiveStore::new()), &Config::default()).unwrap();
    let mut request = request(&layout, &layout.input);
    request.input = InputSource::ImageStack(stack_dir);
    let report = finder.run(&request).unwrap().unwrap();
    assert_eq!((report.alignment.dx, report.alignment.dy), CROP_OFFSET);
}

#[test]
fn test_corrupt_training_dataset_fails_before_writing() {
    let store = ArchiveStore::new();
    let layout = layout(&store);
    let source = layout.search.join("embryo_a").join("stack.vol");

    let mut training = serde_json::to_value(indexed_volume(3, 128, 128)).unwrap();
    training["axes"] = serde_json::json!(["Z", "Y", "X", "Channel"]);
    let archive = serde_json::json!({
        "datasets": {
            "/reference": serde_json::to_value(reference_volume(3)).unwrap(),
            "/training": training,
        }
    });
    let file = std::fs::File::create(&source).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
    serde_json::to_writer(&mut encoder, &archive).unwrap();
    encoder.finish().unwrap();

    let finder = CropFinder::from_config(Arc::new(ArchiveStore::new()), &Config::default()).unwrap();
    assert!(finder.run(&request(&layout, &layout.input)).is_err());
    assert!(!layout.output.exists());
}
