//! JSON directory loader.
//!
//! Reads every regular file directly inside the data directory. Each file
//! must hold a top-level JSON array; every element becomes one
//! [`Document`] whose text is the element re-serialized as compact JSON,
//! with object keys in the order the file lists them.
//! Sub-directories are skipped and files are read in name order, so the
//! same directory always yields the same document sequence.
//!
//! There is no extension filter: a stray non-JSON file fails the whole load
//! rather than being silently ignored.

use std::path::Path;

use docqa_core::models::Document;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::LoadError;

/// Load all documents from `dir`.
///
/// # Errors
///
/// - [`LoadError::Io`] if the directory or one of its files is unreadable.
/// - [`LoadError::Parse`] if a file is not UTF-8 JSON or its top-level
///   value is not an array.
pub fn load(dir: &Path) -> Result<Vec<Document>, LoadError> {
    let meta = std::fs::metadata(dir).map_err(|e| LoadError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(LoadError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| LoadError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let before = documents.len();
        load_file(entry.path(), &mut documents)?;
        debug!(
            file = %entry.path().display(),
            documents = documents.len() - before,
            "loaded data file"
        );
    }

    Ok(documents)
}

fn load_file(path: &Path, out: &mut Vec<Document>) -> Result<(), LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let content = String::from_utf8(bytes).map_err(|e| parse_err(format!("not UTF-8: {}", e)))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(parse_err(format!(
                "expected a top-level JSON array, found {}",
                json_kind(&other)
            )))
        }
    };

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    for (i, item) in items.iter().enumerate() {
        let text = serde_json::to_string(item).map_err(|e| parse_err(e.to_string()))?;
        out.push(Document::new(source.clone(), i, text));
    }
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
