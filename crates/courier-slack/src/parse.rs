/// Identity and content scraped out of a thread's root message text.
///
/// The bridge posts messages into the channel as free-form text that embeds
/// two recoverable pieces: a `(TGID [<id>]` marker carrying the sender's
/// external identity, and the original message text after the final `[`.
/// A missing marker yields `tg_id: None`; the caller has to tolerate the
/// correlation query matching nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoot {
    pub tg_id: Option<String>,
    pub core_text: String,
}

const TGID_MARKER: &str = "(TGID [";

/// Scrape identity and core text from a thread root.
///
/// Grammar: the identity is the non-empty run between `(TGID [` and the next
/// `]`. The core text is everything after the last `[`, with any remaining
/// `[` `]` and backtick characters removed and surrounding whitespace
/// trimmed.
pub fn parse_thread_root(text: &str) -> ParsedRoot {
    let tg_id = text.find(TGID_MARKER).and_then(|start| {
        let rest = &text[start + TGID_MARKER.len()..];
        rest.find(']')
            .map(|end| rest[..end].to_string())
            .filter(|id| !id.is_empty())
    });

    let tail = text.rsplit('[').next().unwrap_or(text);
    let core_text: String = tail
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '`'))
        .collect::<String>()
        .trim()
        .to_string();

    ParsedRoot { tg_id, core_text }
}
