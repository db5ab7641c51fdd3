use super::{PatternMatcher, UNKNOWN_QUALITY};
use std::path::Path;

/// Spellings of the episode placeholder. The braced one goes first, so that
/// `{episode}` isn't consumed partially by the bare spelling.
const EPISODE_PLACEHOLDERS: &[&str] = &["{episode}", "episode", "Episode", "EPISODE"];

/// Spellings of the quality placeholder, in the same order as the episode ones.
const QUALITY_PLACEHOLDERS: &[&str] = &["{quality}", "quality", "Quality", "QUALITY"];

/// Substitutes the episode and quality into the template. Returns the base
/// name without the extension.
///
/// Each episode placeholder spelling is replaced at most once. Every
/// occurrence of a quality placeholder spelling is replaced, or removed if
/// the quality is [`UNKNOWN_QUALITY`]. The quality is computed lazily, only
/// if the template mentions it.
///
/// Nothing is substituted if there is no episode, even the quality.
pub(crate) fn render(
    template: &str,
    episode: Option<&str>,
    quality: impl FnOnce() -> String,
) -> String {
    let Some(episode) = episode else {
        return template.to_owned();
    };

    let mut output = template.to_owned();

    for &placeholder in EPISODE_PLACEHOLDERS {
        output = output.replacen(placeholder, episode, 1);
    }

    let mut quality = Some(quality);
    let mut resolved: Option<String> = None;

    for &placeholder in QUALITY_PLACEHOLDERS {
        if !output.contains(placeholder) {
            continue;
        }

        let value: &str = resolved.get_or_insert_with(|| match quality.take() {
            Some(quality) => quality(),
            None => UNKNOWN_QUALITY.to_owned(),
        });

        let value = if value == UNKNOWN_QUALITY { "" } else { value };

        output = output.replace(placeholder, value);
    }

    output
}

/// Extension of the file name including the leading dot, or an empty string
pub(crate) fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Produces the final file name for the uploaded file: the rendered template
/// followed by the original extension.
pub(crate) fn rendered_name(matcher: &PatternMatcher, template: &str, filename: &str) -> String {
    let episode = matcher.episode(filename);
    let base = render(template, episode.as_deref(), || matcher.quality(filename));
    format!("{base}{}", extension(filename))
}
