//! Bracket construction: shuffled first round, winners-only later rounds.

use crate::error::{TournamentError, TournamentResult};
use crate::types::{round_is_complete, Matchup, Prompt, Round};
use rand::seq::SliceRandom;
use rand::Rng;

/// What follows a completed round
#[derive(Debug, Clone, PartialEq)]
pub enum NextRound {
    Round(Round),
    /// Only one real prompt advanced: it is the champion
    GameOver(Prompt),
}

/// Shuffle the prompts and pair them up in order; an odd one out gets a bye
pub fn build_first_round<R: Rng + ?Sized>(
    prompts: &[Prompt],
    rng: &mut R,
) -> TournamentResult<Round> {
    if prompts.len() < 2 {
        return Err(TournamentError::InsufficientPrompts {
            found: prompts.len(),
        });
    }

    let mut shuffled = prompts.to_vec();
    shuffled.shuffle(rng);

    let round = pair_up(shuffled, "");
    tracing::info!(
        "Built round 1 with {} matchups from {} prompts",
        round.len(),
        prompts.len()
    );
    Ok(round)
}

/// Build round `round_number` (0-based) from the winners of the previous round.
///
/// Only the bye placeholder is filtered out; a prompt that advanced through a
/// bye keeps its place like any other winner.
pub fn build_next_round(previous: &[Matchup], round_number: usize) -> TournamentResult<NextRound> {
    if !round_is_complete(previous) {
        return Err(TournamentError::InconsistentBracket(format!(
            "cannot build round {} before round {} is complete",
            round_number + 1,
            round_number
        )));
    }

    let winners: Vec<Prompt> = previous
        .iter()
        .filter_map(|m| m.winner.clone())
        .filter(|w| !w.is_bye())
        .collect();

    match winners.len() {
        0 => Err(TournamentError::InconsistentBracket(format!(
            "round {} produced no winners",
            round_number
        ))),
        1 => {
            let champion = winners.into_iter().next().ok_or_else(|| {
                TournamentError::InconsistentBracket("winner vanished".to_string())
            })?;
            tracing::info!("Only '{}' advanced, game over", champion.text);
            Ok(NextRound::GameOver(champion))
        }
        n => {
            let round = pair_up(winners, &format!("_R{}", round_number + 1));
            tracing::info!(
                "Built round {} with {} matchups from {} winners",
                round_number + 1,
                round.len(),
                n
            );
            Ok(NextRound::Round(round))
        }
    }
}

/// Pair consecutive entrants (2i, 2i+1), coding them A{i+1}/B{i+1} plus `suffix`
fn pair_up(entrants: Vec<Prompt>, suffix: &str) -> Round {
    let mut round = Vec::with_capacity(entrants.len().div_ceil(2));
    let mut iter = entrants.into_iter();
    let mut n = 1;

    while let Some(a) = iter.next() {
        let code_a = format!("A{}{}", n, suffix);
        match iter.next() {
            Some(b) => round.push(Matchup::pair(a, b, code_a, format!("B{}{}", n, suffix))),
            None => round.push(Matchup::bye(a, code_a)),
        }
        n += 1;
    }

    round
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BYE_CODE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn prompts(texts: &[&str]) -> Vec<Prompt> {
        texts.iter().map(|t| Prompt::new(*t)).collect()
    }

    #[test]
    fn test_first_round_requires_two_prompts() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = build_first_round(&prompts(&["Only"]), &mut rng);
        assert_eq!(result, Err(TournamentError::InsufficientPrompts { found: 1 }));

        let result = build_first_round(&[], &mut rng);
        assert_eq!(result, Err(TournamentError::InsufficientPrompts { found: 0 }));
    }

    #[test]
    fn test_first_round_sizes_and_coverage() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..=17 {
            let input = prompts(&vec!["p"; n]);
            let round = build_first_round(&input, &mut rng).unwrap();

            assert_eq!(round.len(), n.div_ceil(2), "matchups for n={}", n);

            let mut seen = HashSet::new();
            for m in &round {
                seen.insert(m.prompt_a.id.clone());
                if !m.is_bye() {
                    seen.insert(m.prompt_b.id.clone());
                }
            }
            let expected: HashSet<_> = input.iter().map(|p| p.id.clone()).collect();
            assert_eq!(seen, expected, "every prompt appears once for n={}", n);
        }
    }

    #[test]
    fn test_odd_count_gets_trailing_bye() {
        let mut rng = StdRng::seed_from_u64(3);
        let round = build_first_round(&prompts(&["A", "B", "C"]), &mut rng).unwrap();

        assert_eq!(round.len(), 2);
        assert!(!round[0].is_bye());
        assert_eq!(round[0].code_a, "A1");
        assert_eq!(round[0].code_b, "B1");

        let bye = &round[1];
        assert!(bye.is_bye());
        assert_eq!(bye.winner.as_ref(), Some(&bye.prompt_a));
        assert_eq!(bye.code_a, "A2");
        assert_eq!(bye.code_b, BYE_CODE);
    }

    #[test]
    fn test_next_round_requires_complete_previous() {
        let p = prompts(&["A", "B"]);
        let previous = vec![Matchup::pair(
            p[0].clone(),
            p[1].clone(),
            "A1".into(),
            "B1".into(),
        )];
        let result = build_next_round(&previous, 1);
        assert!(matches!(result, Err(TournamentError::InconsistentBracket(_))));
    }

    #[test]
    fn test_next_round_keeps_bye_winner_and_suffixes_codes() {
        let p = prompts(&["A", "B", "C"]);
        let mut first = Matchup::pair(p[0].clone(), p[1].clone(), "A1".into(), "B1".into());
        first.winner = Some(p[0].clone());
        let previous = vec![first, Matchup::bye(p[2].clone(), "A2".into())];

        let next = build_next_round(&previous, 1).unwrap();
        let NextRound::Round(round) = next else {
            panic!("Expected a new round");
        };

        assert_eq!(round.len(), 1);
        assert_eq!(round[0].prompt_a, p[0]);
        assert_eq!(round[0].prompt_b, p[2]);
        assert_eq!(round[0].code_a, "A1_R2");
        assert_eq!(round[0].code_b, "B1_R2");
        assert!(round[0].winner.is_none());
    }

    #[test]
    fn test_next_round_single_winner_is_game_over() {
        let p = prompts(&["A", "B"]);
        let mut last = Matchup::pair(p[0].clone(), p[1].clone(), "A1".into(), "B1".into());
        last.winner = Some(p[1].clone());

        let next = build_next_round(&[last], 1).unwrap();
        assert_eq!(next, NextRound::GameOver(p[1].clone()));
    }

    #[test]
    fn test_next_round_odd_winners_get_bye() {
        let p = prompts(&["A", "B", "C", "D", "E", "F"]);
        let previous: Vec<Matchup> = p
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let mut m = Matchup::pair(
                    pair[0].clone(),
                    pair[1].clone(),
                    format!("A{}", i + 1),
                    format!("B{}", i + 1),
                );
                m.winner = Some(pair[0].clone());
                m
            })
            .collect();

        let NextRound::Round(round) = build_next_round(&previous, 1).unwrap() else {
            panic!("Expected a new round");
        };
        assert_eq!(round.len(), 2);
        assert!(round[1].is_bye());
        assert_eq!(round[1].winner, Some(p[4].clone()));
    }
}
