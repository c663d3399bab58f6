//! Result export
//!
//! Writes a finished [`ComputationResult`] as pretty JSON. Diagnostic fields
//! (keys starting with `_`) are stripped at every nesting level.

use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::ComputationResult;

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-]").expect("valid file name pattern"));
static UNDERSCORE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("valid underscore pattern"));

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Name safe for use in a file name: umlauts transliterated, remaining
/// accents stripped via canonical decomposition, spaces to underscores,
/// only `[A-Za-z0-9_-]` kept, runs of underscores collapsed.
pub fn safe_filename(name: &str) -> String {
    let mut transliterated = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'ä' => transliterated.push_str("ae"),
            'ö' => transliterated.push_str("oe"),
            'ü' => transliterated.push_str("ue"),
            'ß' => transliterated.push_str("ss"),
            'Ä' => transliterated.push_str("Ae"),
            'Ö' => transliterated.push_str("Oe"),
            'Ü' => transliterated.push_str("Ue"),
            other => transliterated.push(other),
        }
    }

    let folded: String = transliterated
        .nfd()
        .filter(|&c| !is_combining_mark(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    let kept = DISALLOWED_CHARS.replace_all(&folded, "");
    UNDERSCORE_RUNS.replace_all(&kept, "_").trim_matches('_').to_string()
}

/// Recursively drop object keys starting with `_`.
pub fn strip_diagnostics(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k, strip_diagnostics(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_diagnostics).collect()),
        other => other,
    }
}

/// `<safe name>_<DDMMYYYY>` stem shared by exports and rendered documents.
pub fn artifact_stem(name: &str, birth_date: &str) -> String {
    format!("{}_{}", safe_filename(name), birth_date.replace('.', ""))
}

/// Write `<safe name>_<DDMMYYYY>_result.json` into `dir`.
pub fn export_result(result: &ComputationResult, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = artifact_stem(&result.person.name, &result.person.birth_date);
    let path = dir.join(format!("{stem}_result.json"));

    let clean = strip_diagnostics(serde_json::to_value(result)?);
    let body = serde_json::to_string_pretty(&clean)?;
    std::fs::write(&path, body).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "Result exported");
    Ok(path)
}
