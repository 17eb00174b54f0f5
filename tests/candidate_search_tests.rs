mod common;

use common::*;
use reference_alignment::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(store: &ArchiveStore, path: &Path, dataset: &str, volume: &Volume) {
    store.write(path, dataset, volume).unwrap();
}

#[test]
fn test_search_picks_source_reference_from_archives() {
    let dir = TempDir::new().unwrap();
    let store = ArchiveStore::new();
    let source = dir.path().join("source.vol");
    let distractor = dir.path().join("distractor.vol");
    write(&store, &distractor, "/reference", &distractor_volume(3));
    write(&store, &source, "/reference", &reference_volume(3));

    let candidates = vec![
        CandidateRef::new(&distractor, "/reference"),
        CandidateRef::new(dir.path().join("missing.vol"), "/reference"),
        CandidateRef::new(&source, "/reference"),
    ];
    let mut config = Config::default();
    config.search.workers = 2;
    let search = CandidateSearch::from_config(Arc::new(store), &config).unwrap();
    let report = search.search(&cropped_input(3), &candidates);

    let (winner, alignment) = report.winner.clone().unwrap();
    assert_eq!(winner.path, source);
    assert_eq!((alignment.dx, alignment.dy), CROP_OFFSET);
    assert_eq!(alignment.support_count, 3);

    assert_eq!(report.results.len(), 3);
    assert!(matches!(
        report.results[1].outcome,
        Err(CandidateError::Open { .. })
    ));
    assert!(report.finished_at >= report.started_at);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 3);
    assert!(json["results"][1]["error"].is_string());
}

#[test]
fn test_strict_search_skips_deeper_references() {
    let store = Arc::new(MemoryStore::new());
    store.insert("deep.vol", "/reference", reference_volume(4));
    store.insert("match.vol", "/reference", reference_volume(2));
    let candidates = vec![
        CandidateRef::new("deep.vol", "/reference"),
        CandidateRef::new("match.vol", "/reference"),
    ];

    let aligner = VolumeAligner::from_config(&Config::default()).unwrap();
    let search = CandidateSearch::new(store, aligner, 2, 0, true).unwrap();
    let report = search.search(&cropped_input(2), &candidates);

    assert_eq!(report.results[0].alignment(), Some(&Alignment::none()));
    let (winner, alignment) = report.winner.unwrap();
    assert_eq!(winner.path.to_str(), Some("match.vol"));
    assert_eq!(alignment.support_count, 2);
}

#[test]
fn test_all_failures_yield_no_winner() {
    let store = Arc::new(MemoryStore::new());
    let aligner = VolumeAligner::from_config(&Config::default()).unwrap();
    let search = CandidateSearch::new(store, aligner, 4, 0, false).unwrap();
    let candidates = vec![
        CandidateRef::new("a.vol", "/reference"),
        CandidateRef::new("b.vol", "/reference"),
    ];

    let report = search.search(&cropped_input(1), &candidates);
    assert!(report.winner.is_none());
    assert_eq!(report.failures(), 2);
    assert!(search.find_best(&cropped_input(1), &[]).is_none());
}

#[test]
fn test_zero_workers_fails_at_construction() {
    let mut config = Config::default();
    config.search.workers = 0;
    let result = CandidateSearch::from_config(Arc::new(MemoryStore::new()), &config);
    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Invalid(_))
    ));
}
