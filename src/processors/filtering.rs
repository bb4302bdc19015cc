//! Individual filtering by number of qualifying trials.

use super::catalog::Individual;

/// Number of trials that count towards the minimum.
///
/// # Arguments
///
/// * `individual` - Cataloged subject
/// * `require_complete` - Count only complete trials when set, all trials otherwise
pub fn qualifying_trial_count(individual: &Individual, require_complete: bool) -> usize {
    if require_complete {
        individual.trials.iter().filter(|t| t.is_complete()).count()
    } else {
        individual.trials.len()
    }
}

/// Whether `individual` has at least `min_num_trials` qualifying trials.
pub fn meets_trial_requirement(
    individual: &Individual,
    min_num_trials: usize,
    require_complete: bool,
) -> bool {
    qualifying_trial_count(individual, require_complete) >= min_num_trials
}
