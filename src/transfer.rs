use log::debug;

use std::collections::BTreeMap;

use crate::config::CandidateStatus;
use crate::{CandidateId, CheckedBallot};

/// Counting state of a ballot. One record per checked ballot, at the same index.
#[derive(PartialEq, Debug, Clone, Copy)]
pub(crate) struct BallotRecord {
    /// Index of the current preference in the ballot ranks.
    pub(crate) position: usize,
    pub(crate) weight: f64,
    pub(crate) exhausted: bool,
}

impl BallotRecord {
    pub(crate) fn new(ballot: &CheckedBallot) -> BallotRecord {
        BallotRecord {
            position: 0,
            weight: ballot.weight,
            exhausted: ballot.ranks.is_empty(),
        }
    }

    /// The candidate this ballot currently counts for.
    pub(crate) fn current(&self, ballot: &CheckedBallot) -> Option<CandidateId> {
        if self.exhausted {
            None
        } else {
            ballot.ranks.get(self.position).copied()
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default)]
pub(crate) struct TransferOutcome {
    /// Weight received by each candidate, in candidate order.
    pub(crate) moved: Vec<(CandidateId, f64)>,
    pub(crate) exhausted: f64,
}

/// Moves the ballots sitting on a decided candidate to their next remaining
/// preference.
///
/// The weight of each moved ballot is multiplied by `fraction` first: the
/// surplus share for an elected candidate, 1.0 for an eliminated one. The
/// decided candidate must already be marked as such in `status`. Ballots with
/// no remaining preference are exhausted.
pub(crate) fn transfer(
    decided: CandidateId,
    fraction: f64,
    ballots: &[CheckedBallot],
    records: &mut [BallotRecord],
    status: &[CandidateStatus],
) -> TransferOutcome {
    debug_assert_ne!(status[decided.idx()], CandidateStatus::Remaining);
    let mut moved: BTreeMap<CandidateId, f64> = BTreeMap::new();
    let mut exhausted = 0.0;

    for (ballot, record) in ballots.iter().zip(records.iter_mut()) {
        if record.current(ballot) != Some(decided) {
            continue;
        }
        record.weight *= fraction;
        let next = ballot
            .ranks
            .iter()
            .enumerate()
            .skip(record.position + 1)
            .find(|(_, cid)| status[cid.idx()] == CandidateStatus::Remaining);
        match next {
            Some((position, cid)) => {
                record.position = position;
                *moved.entry(*cid).or_insert(0.0) += record.weight;
            }
            None => {
                record.exhausted = true;
                exhausted += record.weight;
            }
        }
    }

    debug!(
        "transfer: from {:?} with fraction {}: moved {:?}, exhausted {}",
        decided, fraction, moved, exhausted
    );
    TransferOutcome {
        moved: moved.into_iter().collect(),
        exhausted,
    }
}
