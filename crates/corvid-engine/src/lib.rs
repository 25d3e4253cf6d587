//! Search and evaluation for corvid.

pub mod eval;
pub mod search;
pub mod time;

pub use eval::evaluate;
pub use search::limits::{LimitsError, SearchLimits};
pub use search::pool::ThreadPool;
pub use search::{
    DRAW_SCORE, INF, IterationReport, MATE_SCORE, MAX_DEPTH, PvLine, SearchResult, is_mate_score,
    mate_distance, mate_in, mated_in,
};
pub use time::compute_limits;
