//! Season/episode numbers and neighbour URLs derived from episode page URLs.
//!
//! Streaming sites encode position in the path (`/staffel-2/episode-5`) or the
//! query (`?season=2&ep=5`). These helpers read and rewrite those markers.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Fallback series name when nothing usable is in the URL.
pub const UNKNOWN_SERIES: &str = "Unknown Series";

#[allow(clippy::expect_used)]
fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("URL pattern regex is valid")) // Static pattern, safe to panic
        .collect()
}

static SEASON_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)/staffel-(\d+)/",
        r"(?i)/season-(\d+)/",
        r"(?i)/s(\d+)/",
        r"(?i)season=(\d+)",
        r"(?i)staffel=(\d+)",
    ])
});

static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)/episode-(\d+)",
        r"(?i)/ep-(\d+)",
        r"(?i)/e(\d+)",
        r"(?i)episode=(\d+)",
        r"(?i)ep=(\d+)",
    ])
});

/// Rewritable episode markers, anchored on a path or query separator; group 1
/// keeps the original spelling of the prefix.
static EPISODE_REWRITE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)(/episode-)\d+",
        r"(?i)(/ep-)\d+",
        r"(?i)([?&]episode=)\d+",
        r"(?i)([?&]ep=)\d+",
    ])
});

fn first_number(patterns: &[Regex], url: &str) -> Option<u32> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Season number encoded in `url`, if any.
#[must_use]
pub fn season_from_url(url: &str) -> Option<u32> {
    first_number(&SEASON_PATTERNS, url)
}

/// Episode number encoded in `url`, if any.
#[must_use]
pub fn episode_from_url(url: &str) -> Option<u32> {
    first_number(&EPISODE_PATTERNS, url)
}

/// Rewrites the first episode marker in `current_url` to `episode`.
///
/// Returns `None` when the URL carries no rewritable marker or the rewrite
/// would not change it.
#[must_use]
pub fn next_episode_url(current_url: &str, episode: u32) -> Option<String> {
    let pattern = EPISODE_REWRITE_PATTERNS
        .iter()
        .find(|pattern| pattern.is_match(current_url))?;

    let rewritten = pattern
        .replacen(current_url, 1, |captures: &regex::Captures<'_>| {
            format!("{}{episode}", &captures[1])
        })
        .into_owned();

    (rewritten != current_url).then_some(rewritten)
}

/// Human-readable series name guessed from a series or episode URL.
///
/// Takes the first path segment that follows a `stream`/`serie` segment and
/// is not itself one; falls back to the host name without `www.` and TLD.
#[must_use]
pub fn series_name_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return UNKNOWN_SERIES.to_string();
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let slug = segments
        .windows(2)
        .find(|pair| is_series_marker(pair[0]) && !is_series_marker(pair[1]))
        .map(|pair| pair[1]);

    if let Some(slug) = slug {
        let decoded = urlencoding::decode(slug).map_or_else(|_| slug.to_string(), |s| s.into_owned());
        let name = title_case(&decoded.replace(['-', '_'], " "));
        if !name.is_empty() {
            return name;
        }
    }

    parsed
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host))
        .map(|host| host.rsplit_once('.').map_or(host, |(name, _tld)| name))
        .filter(|name| !name.is_empty())
        .map_or_else(|| UNKNOWN_SERIES.to_string(), str::to_string)
}

fn is_series_marker(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase();
    segment.contains("stream") || segment.contains("serie")
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_from_path_segments() {
        assert_eq!(season_from_url("https://s.to/serie/stream/show/staffel-3/episode-1"), Some(3));
        assert_eq!(season_from_url("https://h/show/Season-12/episode-1"), Some(12));
        assert_eq!(season_from_url("https://h/show/s2/e4"), Some(2));
    }

    #[test]
    fn test_season_from_query() {
        assert_eq!(season_from_url("https://h/watch?season=4&episode=2"), Some(4));
        assert_eq!(season_from_url("https://h/watch?STAFFEL=5"), Some(5));
    }

    #[test]
    fn test_season_missing_yields_none() {
        assert_eq!(season_from_url("https://h/show/episode-3"), None);
    }

    #[test]
    fn test_episode_from_url_variants() {
        assert_eq!(episode_from_url("https://h/show/staffel-1/episode-7"), Some(7));
        assert_eq!(episode_from_url("https://h/show/ep-8"), Some(8));
        assert_eq!(episode_from_url("https://h/show/s1/e9"), Some(9));
        assert_eq!(episode_from_url("https://h/watch?episode=10"), Some(10));
        assert_eq!(episode_from_url("https://h/watch?ep=11"), Some(11));
        assert_eq!(episode_from_url("https://h/show/"), None);
    }

    #[test]
    fn test_next_episode_url_rewrites_path_marker() {
        assert_eq!(
            next_episode_url("https://s.to/serie/stream/show/staffel-1/episode-3", 4).as_deref(),
            Some("https://s.to/serie/stream/show/staffel-1/episode-4")
        );
    }

    #[test]
    fn test_next_episode_url_keeps_prefix_case() {
        assert_eq!(
            next_episode_url("https://h/show/Episode-9", 10).as_deref(),
            Some("https://h/show/Episode-10")
        );
    }

    #[test]
    fn test_next_episode_url_rewrites_query_marker() {
        assert_eq!(
            next_episode_url("https://h/watch?season=1&ep=2", 3).as_deref(),
            Some("https://h/watch?season=1&ep=3")
        );
    }

    #[test]
    fn test_next_episode_url_rewrites_first_marker_only() {
        assert_eq!(
            next_episode_url("https://h/show/episode-2/mirror/episode-2", 3).as_deref(),
            Some("https://h/show/episode-3/mirror/episode-2")
        );
    }

    #[test]
    fn test_next_episode_url_ignores_markers_inside_words() {
        assert_eq!(
            next_episode_url("https://h/deep-6/episode-2", 3).as_deref(),
            Some("https://h/deep-6/episode-3")
        );
        assert_eq!(next_episode_url("https://h/watch?step=3", 4), None);
        assert_eq!(
            next_episode_url("https://h/watch?step=3&ep=1", 2).as_deref(),
            Some("https://h/watch?step=3&ep=2")
        );
    }

    #[test]
    fn test_next_episode_url_without_marker_is_none() {
        assert_eq!(next_episode_url("https://h/show/s1/e2", 3), None);
        assert_eq!(next_episode_url("https://h/show", 2), None);
    }

    #[test]
    fn test_next_episode_url_unchanged_is_none() {
        assert_eq!(next_episode_url("https://h/show/episode-2", 2), None);
    }

    #[test]
    fn test_series_name_after_stream_segment() {
        assert_eq!(
            series_name_from_url("https://s.to/serie/stream/the-walking_dead/staffel-1/episode-1"),
            "The Walking Dead"
        );
    }

    #[test]
    fn test_series_name_decodes_percent_encoding() {
        assert_eq!(
            series_name_from_url("https://h/serie/one%20piece/staffel-1"),
            "One Piece"
        );
    }

    #[test]
    fn test_series_name_falls_back_to_host() {
        assert_eq!(series_name_from_url("https://www.aniworld.to/anime/x"), "aniworld");
    }

    #[test]
    fn test_series_name_unparseable_url() {
        assert_eq!(series_name_from_url("not a url"), UNKNOWN_SERIES);
    }
}
