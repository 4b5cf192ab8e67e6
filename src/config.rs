// ********* Input data structures ***********

use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize, Serializer};
use snafu::prelude::*;

static NEXT_CANDIDATE_KEY: AtomicU64 = AtomicU64::new(0);

/// A candidate standing in an election.
///
/// The name is only a label: two candidates created with the same name are
/// different candidates. Cloning a candidate gives back the same candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    key: u64,
    name: String,
}

impl Candidate {
    pub fn new(name: &str) -> Candidate {
        Candidate {
            key: NEXT_CANDIDATE_KEY.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// Candidates only show up by name in the audit trail.
impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// The preferences of one voter, most preferred candidate first.
///
/// `count` is the number of identical ballots this value stands for.
#[derive(PartialEq, Debug, Clone)]
pub struct Ballot {
    preferences: Vec<Candidate>,
    count: u64,
}

impl Ballot {
    pub fn new(preferences: &[Candidate]) -> Ballot {
        Ballot::with_count(preferences, 1)
    }

    pub fn with_count(preferences: &[Candidate], count: u64) -> Ballot {
        Ballot {
            preferences: preferences.to_vec(),
            count,
        }
    }

    pub fn preferences(&self) -> &[Candidate] {
        &self.preferences
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
pub enum CandidateStatus {
    Remaining,
    Elected,
    Eliminated,
}

/// The standing of one candidate in one round.
///
/// For a decided candidate, `number_of_votes` is the value frozen when the
/// decision was made: the quota for an elected candidate, zero for an
/// eliminated one.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CandidateRoundResult {
    pub candidate: Candidate,
    #[serde(rename = "numberOfVotes")]
    pub number_of_votes: f64,
    pub status: CandidateStatus,
}

/// Where the votes of a decided candidate went.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TransferStats {
    pub candidate: Candidate,
    /// The share of each ballot weight that moved on.
    pub fraction: f64,
    pub transfers: Vec<(Candidate, f64)>,
    pub exhausted: f64,
}

/// Statistics for one round
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Round {
    pub round: u32,
    pub quota: f64,
    #[serde(rename = "candidateResults")]
    pub candidate_results: Vec<CandidateRoundResult>,
    pub elected: Vec<Candidate>,
    pub eliminated: Vec<Candidate>,
    pub transfers: Vec<TransferStats>,
    /// Total weight of the exhausted ballots so far.
    pub exhausted: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct ElectionResult {
    rounds: Vec<Round>,
    winners: Vec<Candidate>,
}

impl ElectionResult {
    pub(crate) fn new(rounds: Vec<Round>, winners: Vec<Candidate>) -> ElectionResult {
        ElectionResult { rounds, winners }
    }

    /// The elected candidates, in the order they were elected.
    pub fn winners(&self) -> &[Candidate] {
        &self.winners
    }

    /// The rounds of the count. The first one holds the first preferences.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }
}

// ******** Errors *********

/// Defects of the election input. Nothing is counted when one is found.
#[derive(PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InputProblem {
    #[snafu(display("the number of seats to fill must be positive"))]
    NoSeats,
    #[snafu(display("{seats} seats to fill but only {candidates} candidates"))]
    TooManySeats { seats: u32, candidates: usize },
    #[snafu(display("candidate {name} is declared more than once"))]
    DuplicateDeclaration { name: String },
    #[snafu(display("ballot #{ballot} ranks the undeclared candidate {name}"))]
    UnknownCandidate { ballot: usize, name: String },
    #[snafu(display("ballot #{ballot} ranks {name} more than once"))]
    RepeatedPreference { ballot: usize, name: String },
    #[snafu(display("ballot #{ballot} has a count of zero"))]
    EmptyCount { ballot: usize },
    #[snafu(display("the quota tolerance must be finite and not negative, got {tolerance}"))]
    InvalidTolerance { tolerance: f64 },
}

/// Errors that prevent the count from completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingErrors {
    #[snafu(display("invalid election input: {source}"))]
    InvalidInput { source: InputProblem },
    #[snafu(display("could not read the rules document"))]
    ParsingRules { source: serde_json::Error },
}

// ********* Configuration **********

/// How to pick the candidate to eliminate among the ones tied at the bottom.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TieBreakMode {
    /// The candidate declared last is eliminated.
    #[serde(rename = "useCandidateOrder")]
    UseCandidateOrder,
    /// The candidate declared first is eliminated.
    #[serde(rename = "reverseCandidateOrder")]
    ReverseCandidateOrder,
    /// The tied candidates are ordered by a cryptographic hash of the seed,
    /// the round and their names. The order is reproducible for a given seed
    /// but hard to guess in advance.
    #[serde(rename = "permutation")]
    Permutation(u32),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum QuotaFormula {
    /// total / (seats + 1), not rounded.
    #[serde(rename = "droop")]
    Droop,
    /// total / seats
    #[serde(rename = "hare")]
    Hare,
}

/// The order in which candidates reaching the quota in the same round are
/// elected.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ElectionOrder {
    /// Highest tally first, ties in candidate order.
    #[serde(rename = "descendingTally")]
    DescendingTally,
    #[serde(rename = "candidateOrder")]
    CandidateOrder,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StvRules {
    /// Slack used when comparing tallies with the quota and with each other.
    #[serde(rename = "quotaTieTolerance")]
    pub quota_tie_tolerance: f64,
    #[serde(rename = "eliminationTiebreak")]
    pub elimination_tiebreak: TieBreakMode,
    #[serde(rename = "quotaFormula")]
    pub quota_formula: QuotaFormula,
    #[serde(rename = "electionOrder")]
    pub election_order: ElectionOrder,
}

impl StvRules {
    pub const DEFAULT_RULES: StvRules = StvRules {
        quota_tie_tolerance: 1e-9,
        elimination_tiebreak: TieBreakMode::UseCandidateOrder,
        quota_formula: QuotaFormula::Droop,
        election_order: ElectionOrder::DescendingTally,
    };

    /// Reads the rules from a JSON document. Missing fields take their
    /// default value.
    pub fn from_json(document: &str) -> Result<StvRules, VotingErrors> {
        let rules: StvRules = serde_json::from_str(document).context(ParsingRulesSnafu)?;
        rules.validate().context(InvalidInputSnafu)?;
        Ok(rules)
    }

    pub(crate) fn validate(&self) -> Result<(), InputProblem> {
        let tolerance = self.quota_tie_tolerance;
        ensure!(
            tolerance.is_finite() && tolerance >= 0.0,
            InvalidToleranceSnafu { tolerance }
        );
        Ok(())
    }
}

impl Default for StvRules {
    fn default() -> Self {
        StvRules::DEFAULT_RULES
    }
}
