//! Book ID extraction for answers.
//!
//! The default prompt asks the model to end each answer with an
//! `ID: <Book ID>` line. UIs use [`extract_ids`] to pick those IDs out of an
//! answer and [`companion_files`] to find the matching `<ID>.pdf` files.
//! Only the label line is trusted; four-digit numbers elsewhere in the
//! answer (years, page numbers) are ignored.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static ID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:\d+[.)]\s*)?(?:\*\*)?ID(?:\*\*)?\s*:\s*(?:\*\*)?\s*(\d{4})\b")
        .expect("ID line pattern is a valid regex")
});

/// Book IDs named on `ID:` lines, in order of appearance, deduplicated.
pub fn extract_ids(answer: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for caps in ID_LINE.captures_iter(answer) {
        let id = &caps[1];
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// The `<ID>.pdf` files in `dir` that exist, in the order of `ids`.
pub fn companion_files(dir: &Path, ids: &[String]) -> Vec<PathBuf> {
    ids.iter()
        .map(|id| dir.join(format!("{id}.pdf")))
        .filter(|path| path.is_file())
        .collect()
}
