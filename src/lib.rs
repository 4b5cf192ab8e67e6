mod config;
use log::{debug, info};
use snafu::prelude::*;

use std::collections::{HashMap, HashSet};

pub mod builder;
pub mod manual;
pub mod quota;
mod transfer;

pub use crate::config::*;
use crate::quota::reaches_quota;
use crate::transfer::{transfer, BallotRecord, TransferOutcome};

// **** Private structures ****

// Position of the candidate in the declared list of candidates. It is also the
// order used to break ties.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub(crate) struct CandidateId(pub(crate) u32);

impl CandidateId {
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

// Invariant: the ranks are distinct and the weight is positive.
#[derive(PartialEq, Debug, Clone)]
pub(crate) struct CheckedBallot {
    pub(crate) ranks: Vec<CandidateId>,
    pub(crate) weight: f64,
}

#[derive(Debug, Default)]
struct Decisions {
    elected: Vec<CandidateId>,
    eliminated: Vec<CandidateId>,
    transfers: Vec<(CandidateId, f64, TransferOutcome)>,
}

/// Runs a single transferable vote count.
///
/// Arguments:
/// * `candidates` the registered candidates. Their order is used to break ties.
/// * `ballots` the ballots. They are not modified.
/// * `seats` the number of candidates to elect
/// * `rules` the rules that govern this count
pub fn single_transferable_vote(
    candidates: &[Candidate],
    ballots: &[Ballot],
    seats: u32,
    rules: &StvRules,
) -> Result<ElectionResult, VotingErrors> {
    info!(
        "Processing {:?} ballots, {:?} candidates, {:?} seats, rules: {:?}",
        ballots.len(),
        candidates.len(),
        seats,
        rules
    );
    let checked_ballots = checks(candidates, ballots, seats, rules).context(InvalidInputSnafu)?;
    for (idx, c) in candidates.iter().enumerate() {
        info!("Candidate: {}: {}", idx + 1, c.name());
    }

    let mut count = Count::new(candidates, &checked_ballots, seats, rules);
    count.run();
    Ok(count.into_result())
}

// The mutable state of one count. Nothing in here is shared with the caller.
struct Count<'a> {
    candidates: &'a [Candidate],
    ballots: &'a [CheckedBallot],
    rules: &'a StvRules,
    seats: u32,
    records: Vec<BallotRecord>,
    status: Vec<CandidateStatus>,
    // The tally of a candidate, fixed when it is decided.
    frozen: Vec<f64>,
    // Decided candidates, in the order of the decisions.
    decided: Vec<CandidateId>,
    winners: Vec<CandidateId>,
    total_weight: f64,
    exhausted: f64,
    rounds: Vec<Round>,
}

impl<'a> Count<'a> {
    fn new(
        candidates: &'a [Candidate],
        ballots: &'a [CheckedBallot],
        seats: u32,
        rules: &'a StvRules,
    ) -> Count<'a> {
        let records: Vec<BallotRecord> = ballots.iter().map(BallotRecord::new).collect();
        let total_weight: f64 = ballots.iter().map(|b| b.weight).sum();
        let exhausted: f64 = records
            .iter()
            .filter(|r| r.exhausted)
            .map(|r| r.weight)
            .sum();
        Count {
            candidates,
            ballots,
            rules,
            seats,
            records,
            status: vec![CandidateStatus::Remaining; candidates.len()],
            frozen: vec![0.0; candidates.len()],
            decided: Vec::new(),
            winners: Vec::new(),
            total_weight,
            exhausted,
            rounds: Vec::new(),
        }
    }

    fn run(&mut self) {
        let tolerance = self.rules.quota_tie_tolerance;
        let initial_quota = self.current_quota();
        info!("Round 0 (quota: {:.4})", initial_quota);
        let initial = self.initial_round(initial_quota);
        self.rounds.push(initial);

        loop {
            if self.winners.len() == self.seats as usize {
                info!("All {} seats are filled", self.seats);
                break;
            }
            let round_id = self.rounds.len() as u32;
            let tally = self.tally();
            let quota = self.current_quota();
            let remaining = self.remaining();
            let unfilled = self.seats as usize - self.winners.len();
            info!(
                "Round {} (quota: {:.4}, remaining: {}, unfilled seats: {})",
                round_id,
                quota,
                remaining.len(),
                unfilled
            );
            debug!("run: round {} tally: {:?}", round_id, tally);

            let mut decisions = Decisions::default();

            // As many candidates left as seats: they all win, quota or not.
            if remaining.len() == unfilled {
                for cid in order_by_tally(&remaining, &tally, tolerance) {
                    info!("{:>12.4} {} -> elected", tally[cid.idx()], self.name(cid));
                    self.elect(cid, tally[cid.idx()]);
                    decisions.elected.push(cid);
                }
                let round = self.snapshot(round_id, quota, decisions);
                self.rounds.push(round);
                break;
            }

            let elected = self.find_elected(&remaining, &tally, quota, unfilled);
            if !elected.is_empty() {
                // All of them are marked first so that no surplus moves to a
                // candidate elected in the same round.
                for &cid in elected.iter() {
                    info!("{:>12.4} {} -> elected", tally[cid.idx()], self.name(cid));
                    self.elect(cid, quota);
                }
                for &cid in elected.iter() {
                    let votes = tally[cid.idx()];
                    let surplus = votes - quota;
                    if surplus > 0.0 {
                        let fraction = surplus / votes;
                        let outcome = self.transfer(cid, fraction);
                        decisions.transfers.push((cid, fraction, outcome));
                    }
                }
                decisions.elected = elected;
            } else {
                match self.find_eliminated(&remaining, &tally, round_id) {
                    Some(cid) => {
                        info!("{:>12.4} {} -> eliminated", tally[cid.idx()], self.name(cid));
                        self.status[cid.idx()] = CandidateStatus::Eliminated;
                        self.frozen[cid.idx()] = 0.0;
                        self.decided.push(cid);
                        let outcome = self.transfer(cid, 1.0);
                        decisions.transfers.push((cid, 1.0, outcome));
                        decisions.eliminated.push(cid);
                    }
                    None => {
                        // Not reachable: more candidates remain than seats.
                        debug!("run: no candidate to eliminate in round {}", round_id);
                        break;
                    }
                }
            }

            let round = self.snapshot(round_id, quota, decisions);
            self.rounds.push(round);
            assert!(
                self.remaining().len() < remaining.len(),
                "The number of remaining candidates did not decrease in round {}",
                round_id
            );
        }
    }

    fn into_result(self) -> ElectionResult {
        let winners = self
            .winners
            .iter()
            .map(|cid| self.candidates[cid.idx()].clone())
            .collect();
        ElectionResult::new(self.rounds, winners)
    }

    fn name(&self, cid: CandidateId) -> &str {
        self.candidates[cid.idx()].name()
    }

    fn current_quota(&self) -> f64 {
        quota::quota(
            self.total_weight - self.exhausted,
            self.seats,
            self.rules.quota_formula,
        )
    }

    /// Remaining candidates, in candidate order.
    fn remaining(&self) -> Vec<CandidateId> {
        self.status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == CandidateStatus::Remaining)
            .map(|(idx, _)| CandidateId(idx as u32))
            .collect()
    }

    /// The current votes for every candidate, indexed by candidate.
    fn tally(&self) -> Vec<f64> {
        let mut tally = self.frozen.clone();
        for (idx, s) in self.status.iter().enumerate() {
            if *s == CandidateStatus::Remaining {
                tally[idx] = 0.0;
            }
        }
        for (ballot, record) in self.ballots.iter().zip(self.records.iter()) {
            if let Some(cid) = record.current(ballot) {
                if self.status[cid.idx()] == CandidateStatus::Remaining {
                    tally[cid.idx()] += record.weight;
                }
            }
        }
        tally
    }

    fn elect(&mut self, cid: CandidateId, frozen: f64) {
        self.status[cid.idx()] = CandidateStatus::Elected;
        self.frozen[cid.idx()] = frozen;
        self.decided.push(cid);
        self.winners.push(cid);
    }

    fn transfer(&mut self, cid: CandidateId, fraction: f64) -> TransferOutcome {
        let outcome = transfer(cid, fraction, self.ballots, &mut self.records, &self.status);
        self.exhausted += outcome.exhausted;
        outcome
    }

    fn find_elected(
        &self,
        remaining: &[CandidateId],
        tally: &[f64],
        quota: f64,
        unfilled: usize,
    ) -> Vec<CandidateId> {
        let tolerance = self.rules.quota_tie_tolerance;
        let reached: Vec<CandidateId> = remaining
            .iter()
            .filter(|cid| reaches_quota(tally[cid.idx()], quota, tolerance))
            .cloned()
            .collect();
        let mut res = match self.rules.election_order {
            ElectionOrder::DescendingTally => order_by_tally(&reached, tally, tolerance),
            ElectionOrder::CandidateOrder => reached,
        };
        if res.len() > unfilled {
            debug!(
                "find_elected: {} candidates reached the quota for {} seats, keeping {:?}",
                res.len(),
                unfilled,
                &res[..unfilled]
            );
            res.truncate(unfilled);
        }
        res
    }

    fn find_eliminated(
        &self,
        remaining: &[CandidateId],
        tally: &[f64],
        round_id: u32,
    ) -> Option<CandidateId> {
        let tolerance = self.rules.quota_tie_tolerance;
        let lowest = remaining
            .iter()
            .map(|cid| tally[cid.idx()])
            .reduce(f64::min)?;
        let all_lowest: Vec<CandidateId> = remaining
            .iter()
            .filter(|cid| tally[cid.idx()] <= lowest + tolerance)
            .cloned()
            .collect();
        debug!("find_eliminated: all_lowest: {:?}", all_lowest);

        if all_lowest.len() == 1 {
            return all_lowest.first().copied();
        }
        match self.rules.elimination_tiebreak {
            TieBreakMode::UseCandidateOrder => all_lowest.last().copied(),
            TieBreakMode::ReverseCandidateOrder => all_lowest.first().copied(),
            TieBreakMode::Permutation(seed) => {
                let sorted =
                    candidate_permutation_crypto(&all_lowest, self.candidates, seed, round_id);
                debug!(
                    "find_eliminated: elimination queue using permutation tiebreak: {:?}",
                    sorted
                );
                sorted.first().copied()
            }
        }
    }

    // The first round lists the candidates by decreasing first preferences.
    fn initial_round(&self, quota: f64) -> Round {
        let tally = self.tally();
        let all: Vec<CandidateId> = (0..self.candidates.len())
            .map(|idx| CandidateId(idx as u32))
            .collect();
        let order = order_by_tally(&all, &tally, self.rules.quota_tie_tolerance);
        Round {
            round: 0,
            quota,
            candidate_results: self.candidate_results(&order, &tally),
            elected: Vec::new(),
            eliminated: Vec::new(),
            transfers: Vec::new(),
            exhausted: self.exhausted,
        }
    }

    // Decided candidates come first in the order of the decisions, then the
    // remaining ones in candidate order.
    fn snapshot(&self, round_id: u32, quota: f64, decisions: Decisions) -> Round {
        let tally = self.tally();
        let mut order = self.decided.clone();
        order.extend(self.remaining());
        let transfers = decisions
            .transfers
            .into_iter()
            .map(|(cid, fraction, outcome)| TransferStats {
                candidate: self.candidates[cid.idx()].clone(),
                fraction,
                transfers: outcome
                    .moved
                    .iter()
                    .map(|(to, w)| (self.candidates[to.idx()].clone(), *w))
                    .collect(),
                exhausted: outcome.exhausted,
            })
            .collect();
        Round {
            round: round_id,
            quota,
            candidate_results: self.candidate_results(&order, &tally),
            elected: self.to_candidates(&decisions.elected),
            eliminated: self.to_candidates(&decisions.eliminated),
            transfers,
            exhausted: self.exhausted,
        }
    }

    fn candidate_results(&self, order: &[CandidateId], tally: &[f64]) -> Vec<CandidateRoundResult> {
        order
            .iter()
            .map(|cid| CandidateRoundResult {
                candidate: self.candidates[cid.idx()].clone(),
                number_of_votes: tally[cid.idx()],
                status: self.status[cid.idx()],
            })
            .collect()
    }

    fn to_candidates(&self, cids: &[CandidateId]) -> Vec<Candidate> {
        cids.iter()
            .map(|cid| self.candidates[cid.idx()].clone())
            .collect()
    }
}

/// Orders the candidates by decreasing tally.
///
/// Tallies within `tolerance` of the highest one are tied, and tied
/// candidates keep their order in `cids`.
fn order_by_tally(cids: &[CandidateId], tally: &[f64], tolerance: f64) -> Vec<CandidateId> {
    let mut pool: Vec<CandidateId> = cids.to_vec();
    let mut res: Vec<CandidateId> = Vec::with_capacity(pool.len());
    while let Some(pos) = best_position(&pool, tally, tolerance) {
        res.push(pool.remove(pos));
    }
    res
}

fn best_position(pool: &[CandidateId], tally: &[f64], tolerance: f64) -> Option<usize> {
    let best = pool.iter().map(|cid| tally[cid.idx()]).reduce(f64::max)?;
    pool.iter()
        .position(|cid| tally[cid.idx()] >= best - tolerance)
}

/// Generates a permutation of the candidates that is hard to guess in advance
/// but reproducible for a given seed and round.
fn candidate_permutation_crypto(
    cids: &[CandidateId],
    candidates: &[Candidate],
    seed: u32,
    num_round: u32,
) -> Vec<CandidateId> {
    let mut data: Vec<(String, CandidateId)> = cids
        .iter()
        .map(|cid| {
            let key = format!("{:08}{:08}{}", seed, num_round, candidates[cid.idx()].name());
            (sha256::digest(key.as_str()), *cid)
        })
        .collect();
    // Same digest only for same names: fall back on the candidate order.
    data.sort();
    data.into_iter().map(|p| p.1).collect()
}

// Candidates are resolved to their position in the declared list.
fn checks(
    candidates: &[Candidate],
    ballots: &[Ballot],
    seats: u32,
    rules: &StvRules,
) -> Result<Vec<CheckedBallot>, InputProblem> {
    rules.validate()?;
    ensure!(seats > 0, NoSeatsSnafu);
    ensure!(
        seats as usize <= candidates.len(),
        TooManySeatsSnafu {
            seats,
            candidates: candidates.len()
        }
    );

    let mut ids: HashMap<&Candidate, CandidateId> = HashMap::new();
    for (idx, c) in candidates.iter().enumerate() {
        ensure!(
            ids.insert(c, CandidateId(idx as u32)).is_none(),
            DuplicateDeclarationSnafu { name: c.name() }
        );
    }

    let checked: Vec<CheckedBallot> = ballots
        .iter()
        .enumerate()
        .map(|(ballot, b)| -> Result<CheckedBallot, InputProblem> {
            ensure!(b.count() > 0, EmptyCountSnafu { ballot });
            let mut seen: HashSet<CandidateId> = HashSet::new();
            let mut ranks: Vec<CandidateId> = Vec::with_capacity(b.preferences().len());
            for c in b.preferences() {
                let cid = *ids
                    .get(c)
                    .context(UnknownCandidateSnafu { ballot, name: c.name() })?;
                ensure!(
                    seen.insert(cid),
                    RepeatedPreferenceSnafu { ballot, name: c.name() }
                );
                ranks.push(cid);
            }
            Ok(CheckedBallot {
                ranks,
                weight: b.count() as f64,
            })
        })
        .collect::<Result<_, _>>()?;
    debug!("checks: {} ballots validated", checked.len());
    Ok(checked)
}
