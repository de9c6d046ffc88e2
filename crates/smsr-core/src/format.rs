//! Message formatting.
//!
//! Turns a notification into the text operators receive. Output uses
//! Telegram Markdown: one-time codes are wrapped in backticks so a tap copies
//! them.

use crate::notification::{Content, NotificationEntry};

/// Shortest digit run treated as a one-time code.
pub const CODE_MIN_DIGITS: usize = 4;
/// Longest digit run treated as a one-time code.
pub const CODE_MAX_DIGITS: usize = 8;
/// Number of trailing caller digits shown in call summaries.
pub const CALLER_TAIL_DIGITS: usize = 6;

/// Wrap every maximal run of 4 to 8 ASCII digits in backticks.
///
/// A run is bounded by non-digits or the ends of the string. Runs outside
/// the length range are copied untouched, and no part of a longer run is
/// ever matched.
pub fn highlight_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut run_start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_ascii_digit() {
            run_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = run_start.take() {
            push_run(&mut out, &text[start..i]);
        }
        out.push(ch);
    }
    if let Some(start) = run_start {
        push_run(&mut out, &text[start..]);
    }

    out
}

fn push_run(out: &mut String, run: &str) {
    // ASCII digits only, so byte length is the digit count.
    if (CODE_MIN_DIGITS..=CODE_MAX_DIGITS).contains(&run.len()) {
        out.push('`');
        out.push_str(run);
        out.push('`');
    } else {
        out.push_str(run);
    }
}

/// Last `n` ASCII digits of `phone` after dropping everything else.
/// Returns all digits when there are fewer than `n`.
pub fn last_digits(phone: &str, n: usize) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let skip = digits.len().saturating_sub(n);
    digits[skip..].iter().collect()
}

pub fn render_content(content: &Content) -> String {
    match content {
        Content::Sms(text) => highlight_codes(text),
        Content::Call { from, to } => format!(
            "📞 {} (`{}`), {}",
            from,
            last_digits(from, CALLER_TAIL_DIGITS),
            to
        ),
    }
}

/// Render an entry. Entries without content render as the empty string.
pub fn format_entry(entry: &NotificationEntry) -> String {
    entry
        .content()
        .map(|content| render_content(&content))
        .unwrap_or_default()
}

/// Render a legacy `<kind>\n<content>` message.
pub fn format_legacy(kind: &str, content: &str) -> String {
    format!("*{}*\n{}", kind, content)
}
