//! Search parameters.

use std::time::Duration;

/// How the utility function is evaluated on a cut.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum UtilityEvaluation {
    /// Multiply the cut by the utility diagram and take its maximum.
    #[default]
    Direct,
    /// Intersect the cut with precomputed "utility at least v" sets, best value first.
    Decomposed,
}

/// Configuration options for a search session.
///
/// Use `SearchParams::default()` for standard settings and override fields as needed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sym_search::config::SearchParams;
///
/// let params = SearchParams {
///     time_limit: Some(Duration::from_secs(60)),
///     num_plans: 3,
///     ..SearchParams::default()
/// };
/// assert_eq!(params.utility_epsilon, 0.001);
/// ```
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Node budget of a single image/preimage before the operand is split.
    pub max_image_nodes: usize,
    /// Node budget of a merged transition relation.
    pub max_tr_nodes: usize,
    /// Wall-clock budget, checked between steps.
    pub time_limit: Option<Duration>,
    /// Budget on the nodes held by the manager, checked between steps.
    pub max_alive_nodes: Option<usize>,
    /// Number of distinct plans to extract.
    pub num_plans: usize,
    pub utility_evaluation: UtilityEvaluation,
    /// Tolerance for comparing utilities.
    pub utility_epsilon: f64,
    /// Initial unique table size, as a power of two.
    pub storage_bits: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_image_nodes: 100_000,
            max_tr_nodes: 100_000,
            time_limit: None,
            max_alive_nodes: None,
            num_plans: 1,
            utility_evaluation: UtilityEvaluation::default(),
            utility_epsilon: 0.001,
            storage_bits: 16,
        }
    }
}
