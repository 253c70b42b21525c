//! lrc-fetcher library: lyric lookup, ranking, romanization and the worker
//! pool that ties them together. The binary is a thin CLI over these modules.

pub mod error;
pub mod logging;
pub mod lrc;
pub mod lrclib;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod romanize;
pub mod safety;
pub mod scoring;
pub mod script;
pub mod tags;
