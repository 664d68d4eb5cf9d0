//! Persisted forms of a pipeline run.
//!
//! # Submodules
//!
//! - [`json`]: Writes a `PipelineResult` as pretty-printed JSON
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── www-example-com/
//!     ├── 2025-05-06T08-15-02Z.json
//!     └── 2025-05-06T17-40-11Z.json
//! ```

pub mod json;
