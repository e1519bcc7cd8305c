//! Media library helpers: typed folder trees and file-name matching.

use crate::types::MediaFile;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::LazyLock;

pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "avi"];
pub const SUBTITLE_EXTENSIONS: [&str; 3] = ["srt", "vtt", "ass"];

static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("valid bracket pattern"));
static QUALITY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(480p|720p|1080p|2160p|WEBRip|WEB[- ]DL|HDTV|Blu[- ]?Ray|x264|x265)\b")
        .expect("valid quality pattern")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static PAREN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\([^)]*(?:\d{3,4}p|(?:19|20)\d{2}|x\d{3}|blu[- ]?ray)[^)]*\)")
        .expect("valid paren tag pattern")
});
static EMPTY_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)").expect("valid empty paren pattern"));
static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid paren group pattern"));

/// Season/episode layouts, tried in order.
static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // S01E01, S1.E1
        r"(?i)^(?P<title>.*?)[\s._-]*s(?P<season>\d{1,2})[\s._-]*e(?P<episode>\d{1,3})\b",
        // S1 Ep01, S2 episode 5
        r"(?i)^(?P<title>.*?)[\s._-]*s(?P<season>\d{1,2})[\s._-]*(?:ep|episode)[\s.]*(?P<episode>\d{1,3})\b",
        // 3x07
        r"(?i)^(?P<title>.*?)[\s._-]*(?P<season>\d{1,2})x(?P<episode>\d{1,3})\b",
        // Season 2 Episode 10
        r"(?i)^(?P<title>.*?)[\s._-]*season\s*(?P<season>\d{1,2})\s*(?:episode|ep)\s*(?P<episode>\d{1,3})\b",
        // trailing episode number only
        r"(?i)^(?P<title>.*?)[\s._-]+(?P<episode>\d{1,2})\b$",
        // Ep 5
        r"(?i)^(?P<title>.*?)[\s._-]*(?:episode|ep)\s*(?P<episode>\d{1,3})\b",
        // 101 is S1E01, 1001 is S10E01
        r"(?i)^(?P<title>.*?)[\s._-]*(?P<season>\d{1,2})(?P<episode>\d{2})\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid episode pattern"))
    .collect()
});

/// Kind of a library file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Subtitle,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Subtitle)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Subtitle => "subtitle",
        }
    }
}

/// Normalize a file stem for fuzzy video/subtitle matching.
///
/// Drops bracketed release tags, quality markers and parenthesised tag
/// groups such as `(1080p)` or `(2022)`, turns `.`, `_` and `-` into spaces,
/// collapses whitespace and lowercases.
pub fn normalize_stem(stem: &str) -> String {
    let without_tags = BRACKET_TAG.replace_all(stem, "");
    let without_quality = QUALITY_TAG.replace_all(&without_tags, "");
    let spaced: String = without_quality
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    let without_parens = PAREN_TAG.replace_all(&spaced, "");
    let without_empty = EMPTY_PAREN.replace_all(&without_parens, "");
    WHITESPACE
        .replace_all(&without_empty, " ")
        .trim()
        .to_lowercase()
}

/// Split a file stem into `(title, season, episode)`.
///
/// The title is normalized and loses any remaining parenthesised group.
/// Season and episode are `None` when the name does not carry them; a bare
/// episode number does not imply a season.
pub fn parse_show_episode(stem: &str) -> (String, Option<u32>, Option<u32>) {
    let normalized = normalize_stem(stem);
    let without_groups = PAREN_GROUP.replace_all(&normalized, "");
    let name = WHITESPACE.replace_all(&without_groups, " ").trim().to_string();

    for pattern in EPISODE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&name) {
            let number = |group: &str| caps.name(group).and_then(|m| m.as_str().parse().ok());
            let title = caps
                .name("title")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            return (title, number("season"), number("episode"));
        }
    }
    (name, None, None)
}

/// One media file placed in its show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub media: MediaFile,
}

/// Media files sharing a parsed title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub title: String,
    pub episodes: Vec<Episode>,
}

/// Group media files into shows by parsed title, ordered by title, then
/// season and episode.
pub fn group_shows(media: &[MediaFile]) -> Vec<Show> {
    let mut shows: BTreeMap<String, Vec<Episode>> = BTreeMap::new();
    for file in media {
        let stem = Path::new(&file.path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (title, season, episode) = parse_show_episode(&stem);
        shows.entry(title).or_default().push(Episode {
            season,
            episode,
            media: file.clone(),
        });
    }
    shows
        .into_iter()
        .map(|(title, mut episodes)| {
            episodes.sort_by(|a, b| {
                (a.season, a.episode, &a.media.path).cmp(&(b.season, b.episode, &b.media.path))
            });
            Show { title, episodes }
        })
        .collect()
}

/// A folder of the media library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub folders: BTreeMap<String, Folder>,
    pub files: Vec<MediaFile>,
}

impl Folder {
    /// Build the tree of `media` files located under `base`.
    ///
    /// Files outside `base` are skipped.
    pub fn build(base: &Path, media: &[MediaFile]) -> Self {
        let mut root = Self::default();
        for file in media {
            let Ok(relative) = Path::new(&file.path).strip_prefix(base) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect();
            let Some((_, dirs)) = parts.split_last() else {
                continue;
            };
            let mut current = &mut root;
            for dir in dirs {
                current = current.folders.entry(dir.clone()).or_default();
            }
            current.files.push(file.clone());
        }
        root
    }

    /// Number of files in this folder and every subfolder.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.folders.values().map(Folder::file_count).sum::<usize>()
    }

    /// Walk down a relative path of folder names.
    pub fn find(&self, relative: &Path) -> Option<&Folder> {
        relative.components().try_fold(self, |folder, component| match component {
            Component::Normal(name) => folder.folders.get(name.to_string_lossy().as_ref()),
            Component::CurDir => Some(folder),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn media(id: i64, path: &str) -> MediaFile {
        MediaFile {
            media_id: id,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_build_nests_by_directory() {
        let files = vec![
            media(1, "/anime/Show/S1/ep01.mkv"),
            media(2, "/anime/Show/S1/ep02.mkv"),
            media(3, "/anime/Movie.mp4"),
            media(4, "/elsewhere/other.mp4"),
        ];
        let tree = Folder::build(Path::new("/anime"), &files);

        assert_eq!(tree.files, vec![media(3, "/anime/Movie.mp4")]);
        assert_eq!(tree.file_count(), 3);
        let season = tree.find(Path::new("Show/S1")).unwrap();
        assert_eq!(season.files.len(), 2);
        assert!(tree.find(Path::new("Missing")).is_none());
    }

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.MKV")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("b.srt")), Some(MediaKind::Subtitle));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_normalize_stem() {
        assert_eq!(
            normalize_stem("[SubsPlease] Kaijuu_8-gou.01 (1080p) [E7479F2F]"),
            "kaijuu 8 gou 01"
        );
        assert_eq!(normalize_stem("Show.S01E02.WEBRip.x264"), "show s01e02");
        assert_eq!(normalize_stem("Movie (2019) ()"), "movie");
        assert_eq!(normalize_stem("Movie (Director's Cut)"), "movie (director's cut)");
    }

    #[test]
    fn test_parse_show_episode_bare_episode_number() {
        assert_eq!(
            parse_show_episode("[SubsPlease] Kaijuu 8-gou - 01 (480p) [E7479F2F]"),
            ("kaijuu 8 gou".to_string(), None, Some(1))
        );
    }

    #[test]
    fn test_parse_show_episode_season_and_episode() {
        assert_eq!(
            parse_show_episode("[Judas] Digimon Adventure - S01E01"),
            ("digimon adventure".to_string(), Some(1), Some(1))
        );
        assert_eq!(
            parse_show_episode("Show Name Season 2 Episode 10"),
            ("show name".to_string(), Some(2), Some(10))
        );
        assert_eq!(
            parse_show_episode("Show 3x07"),
            ("show".to_string(), Some(3), Some(7))
        );
    }

    #[test]
    fn test_group_shows() {
        let files = vec![
            media(1, "/anime/[Group] Show - 02 [1080p].mkv"),
            media(2, "/anime/[Group] Show - 01 [1080p].mkv"),
            media(3, "/movies/Totoro (1988).mp4"),
        ];
        let shows = group_shows(&files);

        let titles: Vec<&str> = shows.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["show", "totoro"]);
        let order: Vec<i64> = shows[0].episodes.iter().map(|e| e.media.media_id).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(shows[0].episodes[0].episode, Some(1));
        assert_eq!(shows[1].episodes[0].episode, None);
    }

    #[test]
    fn test_parse_show_episode_movie() {
        assert_eq!(
            parse_show_episode("[Coalgirls]_My_Neighbor_Totoro_(1280x692_Blu-ray_FLAC)_[949BDC65]"),
            ("my neighbor totoro".to_string(), None, None)
        );
    }
}
