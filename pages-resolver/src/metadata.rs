//! Site metadata file (`pages_yaml`) and the generated base-URL descriptor.
//!
//! Only allow-listed metadata keys are honoured; everything else in the file
//! belongs to the site generator and is ignored here.

use std::path::Path;

use serde_yaml::Value;

use crate::error::ResolveError;

/// Metadata keys this crate reads. All other keys are skipped.
pub const KNOWN_KEYS: &[&str] = &["baseurl"];

/// Recognised fields of the pages metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagesMetadata {
    /// `Some("")` when the file says `baseurl: null` (or leaves it blank).
    pub baseurl: Option<String>,
}

/// Parse the metadata document. `path` is used for error context only.
///
/// An empty document yields the default. The document must otherwise be a
/// mapping, and `baseurl` must be a string or null.
pub fn parse_metadata(contents: &str, path: &Path) -> Result<PagesMetadata, ResolveError> {
    let value: Value = serde_yaml::from_str(contents).map_err(|e| ResolveError::MetadataParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mapping = match value {
        Value::Null => return Ok(PagesMetadata::default()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(ResolveError::MetadataShape {
                path: path.to_path_buf(),
                message: format!("expected a mapping, found {}", kind(&other)),
            })
        }
    };

    let mut metadata = PagesMetadata::default();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            tracing::debug!(path = %path.display(), "ignoring non-string metadata key");
            continue;
        };
        match key {
            "baseurl" => {
                metadata.baseurl = Some(match value {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => {
                        return Err(ResolveError::MetadataShape {
                            path: path.to_path_buf(),
                            message: format!("`baseurl` must be a string, found {}", kind(&other)),
                        })
                    }
                });
            }
            unknown => {
                tracing::debug!(key = unknown, path = %path.display(), "ignoring metadata key");
            }
        }
    }
    Ok(metadata)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Base URL from the first `baseurl:<value>` line of a descriptor, trimmed.
///
/// Lines without a value after the colon are skipped, matching how the
/// generator itself treats them.
pub fn parse_descriptor(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.strip_prefix("baseurl:"))
        .find(|rest| !rest.is_empty())
        .map(|rest| rest.trim().to_string())
}

/// Descriptor text carrying `baseurl`.
pub fn render_descriptor(baseurl: &str) -> String {
    format!("baseurl: {baseurl}\n")
}
