use lazy_regex::regex_captures;

/// Label returned by [`extract_quality`] when the file name has no quality cues
pub(crate) const UNKNOWN_QUALITY: &str = "Unknown";

/// Number of distinct file names remembered by [`PatternMatcher`]
const CACHE_CAPACITY: u64 = 128;

/// Finds the episode number in the file name. The rules are tried from the
/// most specific to the least specific one, and the first match wins.
pub(crate) fn extract_episode(filename: &str) -> Option<String> {
    let episode = None
        // S01E02, S01EP02
        .or_else(|| regex_captures!(r"S(\d+)(?:E|EP)(\d+)", filename).map(|(_, _, ep)| ep))
        // S01 E02, S01 - EP02
        .or_else(|| {
            regex_captures!(r"S(\d+)\s*(?:E|EP|-\s*EP)(\d+)", filename).map(|(_, _, ep)| ep)
        })
        // [EP07], (E07), EP07
        .or_else(|| {
            regex_captures!(r"(?:[(\[<{]?\s*(?:E|EP)\s*(\d+)\s*[)\]>}]?)", filename)
                .map(|(_, ep)| ep)
        })
        // - 07 -
        .or_else(|| regex_captures!(r"(?:\s*-\s*(\d+)\s*)", filename).map(|(_, ep)| ep))
        // s01 whatever 07
        .or_else(|| regex_captures!(r"S(\d+)[^\d]*(\d+)"i, filename).map(|(_, _, ep)| ep))
        // Any number at all
        .or_else(|| regex_captures!(r"(\d+)", filename).map(|(_, ep)| ep))?;

    Some(episode.to_owned())
}

/// Finds the quality label in the file name. Never fails, the absence of
/// any quality cues is reported as [`UNKNOWN_QUALITY`].
pub(crate) fn extract_quality(filename: &str) -> String {
    let quality = None
        .or_else(|| {
            regex_captures!(r"\b(?:.*?(\d{3,4}[^\dp]*p).*?|.*?(\d{3,4}p))\b"i, filename)
                .map(|(_, loose, strict)| if loose.is_empty() { strict } else { loose })
        })
        .or_else(|| regex_captures!(r"[(\[<{]?\s*4k\s*[)\]>}]?"i, filename).map(|_| "4k"))
        .or_else(|| regex_captures!(r"[(\[<{]?\s*2k\s*[)\]>}]?"i, filename).map(|_| "2k"))
        .or_else(|| {
            regex_captures!(r"[(\[<{]?\s*HdRip\s*[)\]>}]?|\bHdRip\b"i, filename)
                .map(|_| "HdRip")
        })
        .or_else(|| regex_captures!(r"[(\[<{]?\s*4kX264\s*[)\]>}]?"i, filename).map(|_| "4kX264"))
        .or_else(|| regex_captures!(r"[(\[<{]?\s*4kx265\s*[)\]>}]?"i, filename).map(|_| "4kx265"))
        .unwrap_or(UNKNOWN_QUALITY);

    quality.to_owned()
}

/// Memoizing front for [`extract_episode`] and [`extract_quality`].
/// Both functions are pure, so the results are keyed only by the file name.
#[derive(Clone)]
pub(crate) struct PatternMatcher {
    episodes: moka::sync::Cache<String, Option<String>>,
    qualities: moka::sync::Cache<String, String>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            episodes: moka::sync::Cache::new(CACHE_CAPACITY),
            qualities: moka::sync::Cache::new(CACHE_CAPACITY),
        }
    }
}

impl PatternMatcher {
    pub(crate) fn episode(&self, filename: &str) -> Option<String> {
        self.episodes
            .get_with_by_ref(filename, || extract_episode(filename))
    }

    pub(crate) fn quality(&self, filename: &str) -> String {
        self.qualities
            .get_with_by_ref(filename, || extract_quality(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::{expect, Expect};

    #[track_caller]
    fn assert_episode(filename: &str, expected: Expect) {
        expected.assert_eq(&format!("{:?}", extract_episode(filename)));
    }

    #[track_caller]
    fn assert_quality(filename: &str, expected: Expect) {
        expected.assert_eq(&extract_quality(filename));
    }

    #[test]
    fn episode_season_marker() {
        use assert_episode as test;
        test("Show S01E07 720p.mkv", expect![[r#"Some("07")"#]]);
        test("Show S01EP07.mkv", expect![[r#"Some("07")"#]]);
        test("[Group] S2E113 (1080p).mp4", expect![[r#"Some("113")"#]]);
        test("Show S01 E07.mkv", expect![[r#"Some("07")"#]]);
        test(
            "Naruto Shippuden S01 - EP07 - 1080p [Dual Audio].mkv",
            expect![[r#"Some("07")"#]],
        );
    }

    #[test]
    fn episode_marker_without_season() {
        use assert_episode as test;
        test("One Piece [EP1071] 1080p.mkv", expect![[r#"Some("1071")"#]]);
        test("One Piece (E12).mkv", expect![[r#"Some("12")"#]]);
        test("Bleach EP 05.mkv", expect![[r#"Some("05")"#]]);
    }

    #[test]
    fn episode_hyphen_delimited() {
        use assert_episode as test;
        test("[SubsPlease] Frieren - 07 (1080p).mkv", expect![[r#"Some("07")"#]]);
    }

    #[test]
    fn episode_loose_season_split() {
        use assert_episode as test;
        test("show.s02.part.9.mkv", expect![[r#"Some("9")"#]]);
    }

    #[test]
    fn episode_fallback() {
        use assert_episode as test;
        test("Movie 2023.mkv", expect![[r#"Some("2023")"#]]);
        test("no digits here.mkv", expect!["None"]);
        test("", expect!["None"]);
    }

    #[test]
    fn quality_resolution() {
        use assert_quality as test;
        test("Show S01E07 1080p.mkv", expect!["1080p"]);
        test("Show S01E07 [720p].mkv", expect!["720p"]);
        test("Show.S01E07.480P.WEB.mkv", expect!["480P"]);
        test("Show S01E07 2160 p.mkv", expect!["2160 p"]);
    }

    #[test]
    fn quality_literals() {
        use assert_quality as test;
        test("Show S01E07 [4k].mkv", expect!["4k"]);
        test("Show S01E07 (2K).mkv", expect!["2k"]);
        test("Show S01E07 {HDRip}.mkv", expect!["HdRip"]);
        test("Show S01E07 HdRip.mkv", expect!["HdRip"]);
    }

    #[test]
    fn quality_earlier_rules_shadow_later_ones() {
        use assert_quality as test;
        test("Show S01E07 4kX264.mkv", expect!["4k"]);
        test("Show S01E07 4kx265.mkv", expect!["4k"]);
    }

    #[test]
    fn quality_unknown() {
        use assert_quality as test;
        test("Show S01E07.mkv", expect!["Unknown"]);
        test("", expect!["Unknown"]);
    }

    #[test]
    fn memoized_results_match_direct_calls() {
        let matcher = PatternMatcher::default();
        let names = [
            "Naruto Shippuden S01 - EP07 - 1080p [Dual Audio].mkv",
            "no digits here.mkv",
            "Show S01E07 [4k].mkv",
        ];

        for _ in 0..2 {
            for name in names {
                assert_eq!(matcher.episode(name), extract_episode(name));
                assert_eq!(matcher.quality(name), extract_quality(name));
            }
        }
    }
}
