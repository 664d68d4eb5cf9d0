//! # News Harvest
//!
//! Turns a listing page (a news index, a blog front page) into a list of
//! de-duplicated articles with short summaries.
//!
//! ## Architecture
//!
//! One run of [`pipeline::Pipeline::run`] goes through:
//! 1. **Retrieval**: [`fetch::RetrievalChain`] tries the scraping API, direct
//!    HTTP and two headless browsers in order until one returns HTML
//! 2. **Extraction**: [`extract::ArticleExtractor`] finds article blocks with
//!    heuristic selectors and assembles their text
//! 3. **Pagination**: [`paginate::PaginationWalker`] follows "next" links for
//!    up to five pages
//! 4. **Fallback**: when nothing was found, [`fallback::AiFallbackExtractor`]
//!    asks a language model to read the first page
//! 5. **Summaries**: [`summarize::AiSummarizer`] attaches a short `resume`
//!
//! Every stage absorbs its own failures; a run always ends in a
//! [`models::PipelineResult`].

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod paginate;
pub mod pipeline;
pub mod rate;
pub mod summarize;
pub mod utils;

pub use config::{PipelineConfig, RunConfig};
pub use models::{Article, PipelineResult, StrategyKind};
pub use pipeline::Pipeline;
