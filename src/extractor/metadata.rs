//! Platform metadata lookup via the extractor's `-j` output.

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

use super::args::build_metadata_args;
use super::runner::run_collecting;

/// Fields copied from the extractor's record into the API response, with
/// their outgoing names.
const METADATA_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("channel", "channel"),
    ("uploader", "uploader"),
    ("duration", "duration"),
    ("thumbnail", "thumbnail"),
    ("upload_date", "uploadDate"),
    ("view_count", "viewCount"),
    ("webpage_url", "webpageUrl"),
];

/// Trim one extractor record down to the fields the client needs.
fn trim_record(record: &Value) -> Value {
    let mut out = Map::new();
    for (source, target) in METADATA_FIELDS {
        if let Some(value) = record.get(*source) {
            if !value.is_null() {
                out.insert((*target).to_string(), value.clone());
            }
        }
    }
    Value::Object(out)
}

/// Fetch metadata for a URL.
///
/// A single record comes back as one object; playlist URLs produce one
/// record per entry and come back as `{entries, count}`.
pub async fn fetch_metadata(bin: &str, url: &str) -> Result<Value> {
    let args = build_metadata_args(url);
    let output = run_collecting(bin, &args)
        .await
        .context("metadata probe failed")?;

    let records: Vec<Value> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .map(|record| trim_record(&record))
        .collect();

    match records.len() {
        0 => bail!("extractor returned no metadata"),
        1 => Ok(records.into_iter().next().unwrap()),
        n => Ok(json!({ "entries": records, "count": n })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_to_known_fields_with_wire_names() {
        let record = json!({
            "id": "abc",
            "title": "A Video",
            "channel": "A Channel",
            "upload_date": "20240101",
            "view_count": 100,
            "formats": [{"huge": "blob"}],
            "description": "dropped",
        });
        let trimmed = trim_record(&record);
        assert_eq!(trimmed["id"], "abc");
        assert_eq!(trimmed["uploadDate"], "20240101");
        assert_eq!(trimmed["viewCount"], 100);
        assert!(trimmed.get("formats").is_none());
        assert!(trimmed.get("description").is_none());
    }

    #[test]
    fn null_fields_are_omitted() {
        let record = json!({ "id": "abc", "thumbnail": null });
        let trimmed = trim_record(&record);
        assert!(trimmed.get("thumbnail").is_none());
    }
}
