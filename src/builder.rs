use snafu::prelude::*;

pub use crate::config::*;

/// A builder for declaring candidates and adding ballots by name.
///
/// ```
/// pub use stv_count::builder::Builder;
/// pub use stv_count::StvRules;
/// # use stv_count::VotingErrors;
///
/// let mut builder = Builder::new(&StvRules::DEFAULT_RULES)?
///     .candidates(&["Anna", "Bob", "Clara"])?
///     .seats(2);
///
/// builder.add_vote_simple(&["Anna", "Bob"])?;
/// builder.add_vote(&["Bob"], 2)?;
/// builder.add_vote_simple(&["Clara", "Anna"])?;
///
/// let result = builder.run()?;
/// let winners: Vec<&str> = result.winners().iter().map(|c| c.name()).collect();
/// assert_eq!(winners, vec!["Bob", "Anna"]);
///
/// # Ok::<(), VotingErrors>(())
/// ```
pub struct Builder {
    _rules: StvRules,
    _seats: u32,
    _candidates: Vec<Candidate>,
    _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new(rules: &StvRules) -> Result<Builder, VotingErrors> {
        rules.validate().context(InvalidInputSnafu)?;
        Ok(Builder {
            _rules: rules.clone(),
            _seats: 1,
            _candidates: Vec::new(),
            _ballots: Vec::new(),
        })
    }

    /// Declares the candidates, in the order used to break ties.
    ///
    /// Names must be unique here since ballots refer to candidates by name.
    /// Replaces the candidates and ballots added so far.
    pub fn candidates<S: AsRef<str>>(self, names: &[S]) -> Result<Builder, VotingErrors> {
        let mut cands: Vec<Candidate> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if cands.iter().any(|c| c.name() == name) {
                return DuplicateDeclarationSnafu { name }
                    .fail()
                    .context(InvalidInputSnafu);
            }
            cands.push(Candidate::new(name));
        }
        Ok(Builder {
            _rules: self._rules,
            _seats: self._seats,
            _candidates: cands,
            _ballots: Vec::new(),
        })
    }

    /// The number of seats to fill. Defaults to 1.
    pub fn seats(self, seats: u32) -> Builder {
        Builder {
            _seats: seats,
            ..self
        }
    }

    pub fn candidate(&self, name: &str) -> Option<&Candidate> {
        self._candidates.iter().find(|c| c.name() == name)
    }

    /// Adds a single ballot.
    pub fn add_vote_simple<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), VotingErrors> {
        self.add_vote(names, 1)
    }

    /// Adds `count` identical ballots.
    ///
    /// names: the ranked choices, most preferred first. Every name must be a
    /// declared candidate.
    pub fn add_vote<S: AsRef<str>>(&mut self, names: &[S], count: u64) -> Result<(), VotingErrors> {
        let ballot = self._ballots.len();
        let mut prefs: Vec<Candidate> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let c = self
                .candidate(name)
                .context(UnknownCandidateSnafu { ballot, name })
                .context(InvalidInputSnafu)?;
            prefs.push(c.clone());
        }
        self.add_ballot(Ballot::with_count(&prefs, count))
    }

    pub fn add_ballot(&mut self, ballot: Ballot) -> Result<(), VotingErrors> {
        self._ballots.push(ballot);
        Ok(())
    }

    pub fn run(&self) -> Result<ElectionResult, VotingErrors> {
        crate::single_transferable_vote(
            &self._candidates,
            &self._ballots,
            self._seats,
            &self._rules,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let res = Builder::new(&StvRules::DEFAULT_RULES)
            .unwrap()
            .candidates(&["Anna", "Anna"]);
        assert!(matches!(
            res,
            Err(VotingErrors::InvalidInput {
                source: InputProblem::DuplicateDeclaration { .. }
            })
        ));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut builder = Builder::new(&StvRules::DEFAULT_RULES)
            .unwrap()
            .candidates(&["Anna"])
            .unwrap();
        builder.add_vote_simple(&["Anna"]).unwrap();
        let res = builder.add_vote_simple(&["Anna", "Zoe"]);
        match res {
            Err(VotingErrors::InvalidInput {
                source: InputProblem::UnknownCandidate { ballot, name },
            }) => {
                assert_eq!(ballot, 1);
                assert_eq!(name, "Zoe");
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn seats_are_checked_when_running() {
        let builder = Builder::new(&StvRules::DEFAULT_RULES)
            .unwrap()
            .candidates(&["Anna"])
            .unwrap()
            .seats(2);
        assert!(matches!(
            builder.run(),
            Err(VotingErrors::InvalidInput {
                source: InputProblem::TooManySeats { .. }
            })
        ));
    }

    #[test]
    fn single_candidate_wins_without_votes() {
        let builder = Builder::new(&StvRules::DEFAULT_RULES)
            .unwrap()
            .candidates(&["Anna"])
            .unwrap();
        let res = builder.run().unwrap();
        assert_eq!(res.winners(), &[builder.candidate("Anna").unwrap().clone()]);
    }
}
