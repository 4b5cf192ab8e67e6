/*!

This is the long-form manual for `stv_count`.

## Counting rules

`stv_count` tabulates a single transferable vote (STV) election with
fractional surplus transfers (the Gregory method).

Every ballot starts with a weight equal to its count (1 for a plain ballot) and
counts for its first preference. The count then proceeds in rounds:

1. The votes of every remaining candidate are tallied.
2. The quota is computed from the weight of all the ballots that are not
   exhausted. With the default Droop formula, it is `total / (seats + 1)`,
   without any rounding.
3. If all the seats are filled, the count stops.
4. If there are as many remaining candidates as unfilled seats, they are all
   elected, highest tally first, even below the quota.
5. Otherwise every remaining candidate at or above the quota is elected
   (highest tally first, no more than the number of unfilled seats). The
   surplus of each of them (`tally - quota`) moves on: every ballot counting
   for that candidate keeps a share `surplus / tally` of its weight and moves
   to its next remaining preference. All the surpluses of a round are computed
   from the tallies at the start of that round.
6. If nobody reached the quota, the candidate with the fewest votes is
   eliminated and its ballots move on with their full weight.

A ballot with no remaining preference when it has to move on is exhausted: its
weight leaves the count and the quota of the following rounds shrinks
accordingly. A candidate elected by reaching the quota keeps exactly the quota;
a candidate elected in step 4 keeps its tally.

## Ties

Ties are never broken at random. Tallies closer to each other than
`quotaTieTolerance` are considered equal.

- When several candidates reach the quota with the same tally, the one declared
  first is elected first.
- When several candidates share the lowest tally, `eliminationTiebreak`
  decides:
  - `useCandidateOrder` (default): the candidate declared last is eliminated.
  - `reverseCandidateOrder`: the candidate declared first is eliminated.
  - `{"permutation": seed}`: the tied candidates are ordered with a SHA-256
    hash of the seed, the round number and their names, and the first one is
    eliminated. The outcome is the same every time for the same seed.

## Configuration

The rules can be written in JSON and read with
[`StvRules::from_json`](crate::StvRules::from_json). All fields are optional:

```json
{
  "quotaTieTolerance": 1e-9,
  "eliminationTiebreak": "useCandidateOrder",
  "quotaFormula": "droop",
  "electionOrder": "descendingTally"
}
```

- `quotaFormula`: `droop` (`total / (seats + 1)`) or `hare` (`total / seats`).
- `electionOrder`: the order of the candidates reaching the quota in the same
  round, `descendingTally` or `candidateOrder`.

## Audit trail

The first round of an [`ElectionResult`](crate::ElectionResult) holds the first
preferences, sorted by decreasing tally. The following rounds list the decided
candidates first, in the order of the decisions, then the remaining candidates
in the order they were declared. Each round also records the quota in effect,
the weight moved by each decided candidate and the weight exhausted so far, so
that at every round:

```text
remaining tallies + elected tallies + exhausted weight == total weight
```

All the result structures implement `serde::Serialize`.

 */
