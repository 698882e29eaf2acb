//! Terminal rendering for streamed answers.
//!
//! Two pure text transforms (markdown-link rewriting and best-effort
//! highlighting of retrieval-query JSON), plus [`LiveFrame`] which redraws
//! the accumulated answer in place as deltas arrive.

use std::io::{self, Stdout, Write};
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Start of an OSC 8 hyperlink: `ESC ] 8 ; ; URL ESC \`.
const OSC8_OPEN: &str = "\x1b]8;;";
/// Terminator for OSC 8 sequences.
const OSC8_ST: &str = "\x1b\\";

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^\)]+)\)").expect("link pattern is valid"))
}

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:,\s*)?\{[^}]*"(?:input_value|search_query|search_mode|search_[^"]+|query)"[^}]*\}"#)
            .expect("field pattern is valid")
    })
}

/// Rewrites markdown inline links `[text](url)` as OSC 8 terminal hyperlinks.
///
/// Handles any number of links per string and leaves everything outside the
/// matched spans untouched. Idempotent: the output syntax no longer matches
/// the input pattern.
pub fn make_links_clickable(markdown_text: &str) -> String {
    link_regex()
        .replace_all(markdown_text, |caps: &Captures| {
            let text = &caps[1];
            let url = &caps[2];
            format!("{OSC8_OPEN}{url}{OSC8_ST}{text}{OSC8_OPEN}{OSC8_ST}")
        })
        .into_owned()
}

/// Wraps JSON object literals that carry retrieval-query fields
/// (`query`, `search_*`, `input_value`, `search_mode`) in fenced ```json
/// blocks so they stand out in the rendered answer.
///
/// Matching is a single-line, non-greedy pattern with no brace balancing;
/// nested objects are not handled. This is best-effort highlighting, not
/// JSON extraction. Objects already sitting inside a fence are left alone,
/// which makes the transform idempotent.
pub fn highlight_search_fields(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in field_regex().find_iter(text) {
        out.push_str(&text[last..found.start()]);
        let object = found.as_str().trim_start_matches([',', ' ']);
        let offset = found.start() + (found.as_str().len() - object.len());
        if text[..offset].ends_with("```json\n") {
            out.push_str(found.as_str());
        } else {
            out.push_str("```json\n");
            out.push_str(object);
            out.push_str("\n```\n\n");
        }
        last = found.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Full rendering pipeline for one accumulated-text frame: highlight the
/// retrieval-query objects, then make links clickable.
pub fn render_frame(accumulated_text: &str) -> String {
    make_links_clickable(&highlight_search_fields(accumulated_text))
}

/// In-place redraw of the streamed answer.
///
/// Each `update` replaces the previously drawn frame using cursor-up plus
/// erase-below, so transforms that rewrite earlier text still display
/// correctly. Without ANSI support there is no way to redraw, so the frame
/// is held back and printed once by `finish`.
pub struct LiveFrame {
    stdout: Stdout,
    use_color: bool,
    drawn_lines: usize,
    pending: String,
}

impl LiveFrame {
    /// Creates a live frame. `use_color` controls whether ANSI redraw is used.
    pub fn new(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            drawn_lines: 0,
            pending: String::new(),
        }
    }

    /// Replaces the displayed frame with `frame`.
    pub fn update(&mut self, frame: &str) {
        if !self.use_color {
            self.pending = frame.to_string();
            return;
        }
        if self.drawn_lines > 0 {
            print!("\x1b[{}F\x1b[J", self.drawn_lines);
        }
        println!("{frame}");
        self.drawn_lines = frame.split('\n').count();
        let _ = self.stdout.flush();
    }

    /// Finishes the frame, emitting the held-back text in no-color mode.
    pub fn finish(&mut self) {
        if !self.use_color && !self.pending.is_empty() {
            println!("{}", self.pending);
            self.pending.clear();
        }
        let _ = self.stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_link_rewritten() {
        let out = make_links_clickable("see [docs](http://example.com) for more");
        assert_eq!(
            out,
            "see \x1b]8;;http://example.com\x1b\\docs\x1b]8;;\x1b\\ for more"
        );
    }

    #[test]
    fn adjacent_links_pair_with_their_own_urls() {
        let out = make_links_clickable("[a](http://x)[b](http://y)");
        assert_eq!(
            out,
            "\x1b]8;;http://x\x1b\\a\x1b]8;;\x1b\\\x1b]8;;http://y\x1b\\b\x1b]8;;\x1b\\"
        );
    }

    #[test]
    fn link_transform_is_idempotent() {
        let once = make_links_clickable("pre [a](http://x) post");
        let twice = make_links_clickable(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn text_without_links_untouched() {
        let text = "no links here, just [brackets] and (parens)";
        assert_eq!(make_links_clickable(text), text);
    }

    #[test]
    fn query_object_fenced() {
        let text = r#"Searching with {"query": "rust streams", "limit": 5} now"#;
        let out = highlight_search_fields(text);
        assert!(out.contains("```json\n{\"query\": \"rust streams\", \"limit\": 5}\n```\n\n"));
        assert!(out.starts_with("Searching with "));
    }

    #[test]
    fn leading_comma_stripped_from_fenced_object() {
        let text = r#"{"other": 1}, {"search_mode": "hybrid"}"#;
        let out = highlight_search_fields(text);
        assert!(out.contains("```json\n{\"search_mode\": \"hybrid\"}\n```\n\n"));
        assert!(!out.contains("```json\n, "));
    }

    #[test]
    fn unrelated_objects_untouched() {
        let text = r#"config is {"limit": 5, "mode": "fast"}"#;
        assert_eq!(highlight_search_fields(text), text);
    }

    #[test]
    fn highlight_is_idempotent() {
        let text = r#"running {"input_value": "what is rust?"} against the flow"#;
        let once = highlight_search_fields(text);
        let twice = highlight_search_fields(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn frame_pipeline_applies_both_transforms() {
        let text = r#"{"query": "x"} and [link](http://x)"#;
        let out = render_frame(text);
        assert!(out.contains("```json"));
        assert!(out.contains("\x1b]8;;http://x\x1b\\"));
    }
}
