//! REPL command recognition.
//!
//! The chat loop has no slash-command system; the only in-band commands are
//! the exit words, checked before anything is sent to the backend.

/// Returns true if `line` is one of the exit words (`exit`, `quit`, `q`),
/// ignoring surrounding whitespace and case.
pub fn is_exit_command(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "exit" | "quit" | "q"
    )
}
