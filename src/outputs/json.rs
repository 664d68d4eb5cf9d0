//! JSON output for pipeline results.
//!
//! Each run is written to its own file, grouped by the slugified domain and
//! named after the UTC time it was written:
//! ```text
//! json_output_dir/
//! └── www-example-com/
//!     └── 2025-05-06T08-15-02Z.json
//! ```

use crate::models::PipelineResult;
use crate::utils::slugify;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// File name for a result written at `at`.
pub fn result_file_name(at: DateTime<Utc>) -> String {
    format!("{}.json", at.format("%Y-%m-%dT%H-%M-%SZ"))
}

/// Write a [`PipelineResult`] under `json_output_dir`.
///
/// # Returns
///
/// The path of the written file, or an error if directory creation or file
/// writing fails.
///
/// # Output Path
///
/// The file is written to: `{json_output_dir}/{domain-slug}/{timestamp}.json`
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, domain = %result.domain))]
pub async fn write_result(
    result: &PipelineResult,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(result)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(slugify(&result.domain));
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(result_file_name(Utc::now()));
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = result.total_articles, "Wrote JSON result file");

    Ok(path)
}
