//! Media library indexing.

use super::{ingest, Result};
use crate::db::{CoverageRepository, LexiconRepository, LibraryRepository, TextRepository};
use immersion_core::library::{group_shows, normalize_stem, Folder, MediaKind, Show};
use immersion_core::subtitle::{self, SubtitleFormat};
use immersion_core::tokenizer::Tokenizer;
use immersion_core::types::TextKind;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Language recorded for subtitles found on disk.
const UNKNOWN_LANGUAGE: &str = "unknown";

/// Result of scanning a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub videos: usize,
    pub subtitles_indexed: usize,
    pub subtitles_skipped: usize,
    pub unmatched_subtitles: Vec<String>,
}

/// Index every video under `folder` and ingest the subtitles matching them.
///
/// A subtitle matches a video with the same file stem, or failing that the
/// same normalized stem. Subtitles already indexed, in an unsupported format
/// or not readable as UTF-8 are skipped.
pub fn scan_folder<R, T>(
    repo: &R,
    tokenizer: &T,
    folder: &Path,
    parse_kanji: bool,
) -> Result<ScanSummary>
where
    R: LibraryRepository + TextRepository + LexiconRepository + CoverageRepository,
    T: Tokenizer + ?Sized,
{
    repo.add_source_folder(&folder.to_string_lossy())?;

    let mut videos: Vec<PathBuf> = Vec::new();
    let mut subtitles: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match MediaKind::from_path(path) {
            Some(MediaKind::Video) => videos.push(path.to_path_buf()),
            Some(MediaKind::Subtitle) => subtitles.push(path.to_path_buf()),
            None => {}
        }
    }
    videos.sort();
    subtitles.sort();
    tracing::info!(
        folder = %folder.display(),
        videos = videos.len(),
        subtitles = subtitles.len(),
        "scanned folder"
    );

    let mut exact: HashMap<String, i64> = HashMap::new();
    let mut normalized: HashMap<String, i64> = HashMap::new();
    for video in &videos {
        let media_id = repo.add_media(&video.to_string_lossy(), MediaKind::Video)?;
        let stem = file_stem(video);
        normalized.insert(normalize_stem(&stem), media_id);
        exact.insert(stem, media_id);
    }

    let mut summary = ScanSummary {
        videos: videos.len(),
        ..Default::default()
    };

    for sub in &subtitles {
        let sub_path = sub.to_string_lossy().to_string();
        let stem = file_stem(sub);
        let Some(&media_id) = exact
            .get(&stem)
            .or_else(|| normalized.get(&normalize_stem(&stem)))
        else {
            tracing::debug!(subtitle = %sub_path, "no matching video");
            summary.unmatched_subtitles.push(sub_path);
            continue;
        };

        if repo.subtitle_exists(&sub_path)? {
            summary.subtitles_skipped += 1;
            continue;
        }
        let Some(format) = SubtitleFormat::from_path(sub) else {
            tracing::warn!(subtitle = %sub_path, "unsupported subtitle format");
            summary.subtitles_skipped += 1;
            continue;
        };

        let content = match fs::read_to_string(sub) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(subtitle = %sub_path, error = %e, "could not read subtitle");
                summary.subtitles_skipped += 1;
                continue;
            }
        };
        let cues = subtitle::parse(&content);
        repo.add_subtitle(media_id, &sub_path, UNKNOWN_LANGUAGE, format.as_str())?;
        let ingested = ingest::ingest_text(
            repo,
            tokenizer,
            &sub_path,
            TextKind::VideoSubtitle,
            &cues,
            parse_kanji,
        )?;
        tracing::debug!(subtitle = %sub_path, sentences = ingested.sentences, "indexed subtitle");
        summary.subtitles_indexed += 1;
    }

    tracing::info!(
        folder = %folder.display(),
        indexed = summary.subtitles_indexed,
        skipped = summary.subtitles_skipped,
        unmatched = summary.unmatched_subtitles.len(),
        "done scanning folder"
    );
    Ok(summary)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Drop indexed media whose file no longer exists.
///
/// Returns the removed paths.
pub fn prune_missing_media<R: LibraryRepository>(repo: &R) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for media in repo.list_media()? {
        if Path::new(&media.path).exists() {
            continue;
        }
        if repo.remove_path(&media.path)? {
            removed.push(media.path);
        }
    }
    Ok(removed)
}

/// Indexed media under `base` as a folder tree.
pub fn library_tree<R: LibraryRepository>(repo: &R, base: &Path) -> Result<Folder> {
    Ok(Folder::build(base, &repo.list_media()?))
}

/// Indexed media grouped into shows by parsed file name.
pub fn library_shows<R: LibraryRepository>(repo: &R) -> Result<Vec<Show>> {
    Ok(group_shows(&repo.list_media()?))
}
