use crate::config::QuotaFormula;

/// The number of votes that guarantees a seat.
///
/// `total_active_weight` is the weight of all the ballots that are not
/// exhausted, including the weight already kept by elected candidates. The
/// result is not rounded.
pub fn quota(total_active_weight: f64, seats: u32, formula: QuotaFormula) -> f64 {
    match formula {
        QuotaFormula::Droop => total_active_weight / (seats as f64 + 1.0),
        QuotaFormula::Hare => total_active_weight / seats as f64,
    }
}

// A candidate without any vote never reaches the quota, even when all the
// ballots are exhausted and the quota dropped to zero.
pub(crate) fn reaches_quota(tally: f64, quota: f64, tolerance: f64) -> bool {
    tally > 0.0 && tally >= quota - tolerance
}
