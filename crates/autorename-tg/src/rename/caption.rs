use crate::util::display::{human_duration, human_size};
use std::time::Duration;
use teloxide::utils::markdown;

/// Characters reserved by MarkdownV2 that have to be escaped in plain text
const RESERVED: &str = r"_*[]()~`>#+-=|{}.!\";

/// Caption of the uploaded file in the MarkdownV2 markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Caption {
    /// Keeps the formatting the user put into the template
    pub(crate) markup: String,

    /// Whole caption escaped as plain text. Used when the chat rejects
    /// the user's markup.
    pub(crate) plain: String,
}

/// Formats the caption of the uploaded file.
///
/// The user's template supports `{filename}`, `{filesize}` and `{duration}`
/// placeholders. Without a template the caption is the file name in bold.
pub(crate) fn compose_caption(
    template: Option<&str>,
    filename: &str,
    size: u64,
    duration: Option<Duration>,
) -> Caption {
    let Some(template) = template else {
        let caption = markdown::bold(&markdown::escape(filename));
        return Caption {
            markup: caption.clone(),
            plain: caption,
        };
    };

    let values = [
        ("{filename}", filename.to_owned()),
        ("{filesize}", human_size(size)),
        ("{duration}", human_duration(duration.unwrap_or_default())),
    ];

    let plain = values
        .iter()
        .fold(template.to_owned(), |caption, (placeholder, value)| {
            caption.replace(placeholder, value)
        });

    Caption {
        markup: fill_markup(template, &values),
        plain: markdown::escape(&plain),
    }
}

/// Substitutes the escaped values into the template, that is itself only
/// partially escaped, see [`escape_keeping_formatting`]
fn fill_markup(template: &str, values: &[(&str, String)]) -> String {
    let mut markup = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, *placeholder, value))
            })
            .min_by_key(|(at, ..)| *at);

        let Some((at, placeholder, value)) = next else {
            markup.push_str(&escape_keeping_formatting(rest));
            return markup;
        };

        markup.push_str(&escape_keeping_formatting(&rest[..at]));
        markup.push_str(&markdown::escape(value));
        rest = &rest[at + placeholder.len()..];
    }
}

/// Bold, italic, underline, strikethrough, code and spoiler markers are kept.
/// Explicit escapes written by the user are kept too. Everything else that
/// is reserved by the markup is escaped, so links aren't supported.
fn escape_keeping_formatting(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) => {
                    escaped.push('\\');
                    escaped.push(next);
                }
                None => escaped.push_str(r"\\"),
            },
            '|' if chars.peek() == Some(&'|') => {
                chars.next();
                escaped.push_str("||");
            }
            '*' | '_' | '~' | '`' => escaped.push(ch),
            _ if RESERVED.contains(ch) => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }

    escaped
}
