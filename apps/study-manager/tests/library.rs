//! Media library and file import tests on a temporary directory.

mod common;

use common::TestContext;
use immersion_core::types::TextKind;
use immersion_study_lib::db::{LexiconRepository, LibraryRepository, TextRepository};
use immersion_study_lib::services::{ingest, library};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\n猫が魚を食べた。\n\n2\n00:00:03,000 --> 00:00:04,500\n犬が行く。\n";

const VTT: &str = "WEBVTT\n\n00:01.000 --> 00:02.000\n日本\n";

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Test scanning matches subtitles to videos and ingests them.
#[test]
fn test_scan_folder() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("Show/[Group] Show - 01 [1080p].mkv"), "");
    write(&root.join("Show/Show - 01.srt"), SRT);
    write(&root.join("Movies/film.mp4"), "");
    write(&root.join("Movies/film.vtt"), VTT);
    write(&root.join("Movies/film.ass"), "[Script Info]");
    write(&root.join("Movies/orphan.srt"), SRT);
    write(&root.join("notes.txt"), "猫");

    let summary = library::scan_folder(&ctx.repo, &ctx.tokenizer, root, false).unwrap();
    assert_eq!(summary.videos, 2);
    assert_eq!(summary.subtitles_indexed, 2);
    assert_eq!(summary.subtitles_skipped, 1);
    assert_eq!(summary.unmatched_subtitles.len(), 1);
    assert!(summary.unmatched_subtitles[0].ends_with("orphan.srt"));

    let texts = ctx.repo.list_texts(Some(TextKind::VideoSubtitle)).unwrap();
    assert_eq!(texts.len(), 2);
    let show = texts
        .iter()
        .find(|t| t.source.ends_with("Show - 01.srt"))
        .unwrap();
    let sentences = ctx.repo.sentences_for_text(show.id).unwrap();
    assert_eq!(sentences.len(), 2);
    assert_eq!(sentences[1].start_time, Some(3.0));
    assert_eq!(sentences[1].end_time, Some(4.5));
    assert!(ctx.repo.find_dictionary_form("日本").unwrap().is_some());

    let again = library::scan_folder(&ctx.repo, &ctx.tokenizer, root, false).unwrap();
    assert_eq!(again.subtitles_indexed, 0);
    assert_eq!(again.subtitles_skipped, 3);
    assert_eq!(ctx.repo.list_media().unwrap().len(), 2);
    assert_eq!(ctx.repo.find_dictionary_form("魚").unwrap().unwrap().frequency, 1);

    let tree = library::library_tree(&ctx.repo, root).unwrap();
    assert_eq!(tree.file_count(), 2);
    assert_eq!(tree.find(Path::new("Movies")).unwrap().files.len(), 1);

    let shows = library::library_shows(&ctx.repo).unwrap();
    let titles: Vec<(String, Option<u32>)> = shows
        .into_iter()
        .map(|s| (s.title, s.episodes[0].episode))
        .collect();
    assert_eq!(
        titles,
        vec![("film".to_string(), None), ("show".to_string(), Some(1))]
    );
}

/// Test a subtitle that is not UTF-8 is skipped and the scan carries on.
#[test]
fn test_scan_folder_skips_unreadable_subtitle() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.mkv"), "");
    fs::write(
        root.join("a.srt"),
        b"1\n00:00:01,000 --> 00:00:02,000\n\x94\x4c\x82\xaa\n",
    )
    .unwrap();
    write(&root.join("b.mkv"), "");
    write(&root.join("b.srt"), SRT);

    let summary = library::scan_folder(&ctx.repo, &ctx.tokenizer, root, false).unwrap();
    assert_eq!(summary.videos, 2);
    assert_eq!(summary.subtitles_indexed, 1);
    assert_eq!(summary.subtitles_skipped, 1);

    let texts = ctx.repo.list_texts(Some(TextKind::VideoSubtitle)).unwrap();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].source.ends_with("b.srt"));
    assert!(!ctx
        .repo
        .subtitle_exists(&root.join("a.srt").to_string_lossy())
        .unwrap());
}

/// Test removing a scanned folder clears its media and texts.
#[test]
fn test_remove_scanned_folder() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("ep01.mkv"), "");
    write(&root.join("ep01.srt"), SRT);

    library::scan_folder(&ctx.repo, &ctx.tokenizer, root, false).unwrap();
    assert_eq!(ctx.repo.list_source_folders().unwrap().len(), 1);

    assert!(ctx.repo.remove_path(&root.to_string_lossy()).unwrap());
    assert!(ctx.repo.list_texts(None).unwrap().is_empty());
    assert!(ctx.repo.list_media().unwrap().is_empty());
    assert!(ctx.repo.find_dictionary_form("猫").unwrap().is_none());
}

/// Test media deleted from disk is pruned from the library.
#[test]
fn test_prune_missing_media() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("ep01.mkv"), "");
    write(&root.join("ep01.srt"), SRT);
    write(&root.join("ep02.mkv"), "");

    library::scan_folder(&ctx.repo, &ctx.tokenizer, root, false).unwrap();
    fs::remove_file(root.join("ep01.mkv")).unwrap();

    let removed = library::prune_missing_media(&ctx.repo).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(removed[0].ends_with("ep01.mkv"));
    assert_eq!(ctx.repo.list_media().unwrap().len(), 1);
    assert!(ctx.repo.list_texts(Some(TextKind::VideoSubtitle)).unwrap().is_empty());
}

/// Test importing an unchanged file twice is skipped.
#[test]
fn test_ingest_text_file_skips_unchanged() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.txt");
    write(&path, "猫が魚を食べた\n\n犬が行く\n");

    let first = ingest::ingest_text_file(&ctx.repo, &ctx.tokenizer, &path, TextKind::TextImport, false)
        .unwrap()
        .unwrap();
    assert_eq!(first.sentences, 2);

    let second =
        ingest::ingest_text_file(&ctx.repo, &ctx.tokenizer, &path, TextKind::TextImport, false)
            .unwrap();
    assert_eq!(second, None);
    assert_eq!(ctx.repo.find_dictionary_form("猫").unwrap().unwrap().frequency, 1);

    write(&path, "犬\n");
    let third = ingest::ingest_text_file(&ctx.repo, &ctx.tokenizer, &path, TextKind::TextImport, false)
        .unwrap()
        .unwrap();
    assert_eq!(third.text_id, first.text_id);
    assert_eq!(ctx.repo.sentences_for_text(first.text_id).unwrap().len(), 1);
    assert!(ctx.repo.find_dictionary_form("猫").unwrap().is_none());

    let text = ctx.repo.get_text(first.text_id).unwrap().unwrap();
    assert_eq!(text.content_hash, Some(ingest::hash_content("犬\n")));
}

/// Test a missing file is an io error.
#[test]
fn test_ingest_missing_file() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    let result = ingest::ingest_text_file(
        &ctx.repo,
        &ctx.tokenizer,
        &dir.path().join("missing.txt"),
        TextKind::TextImport,
        false,
    );
    assert!(matches!(
        result,
        Err(immersion_study_lib::services::ServiceError::Io(_))
    ));
}
