// src/analyze/mod.rs
//! Scoring and selection: keyword score, sample copy, cross-feed ranking.

pub mod rank;
pub mod scoring;
pub mod summary;

pub use crate::analyze::rank::rank;
pub use crate::analyze::scoring::{score_article, Score, MULTI_MATCH_BONUS, TITLE_MATCH_BONUS};
pub use crate::analyze::summary::compose_sample_copy;
