//! Finalist promotion from batch-level win counts

use ratchet_compare::WinTally;
use serde::{Deserialize, Serialize};

/// Outcome of ranking a batch's survivors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Promotion {
    /// Branches tied at the top win count, ranking order
    pub winners: Vec<String>,
    /// Everyone else, ranking order
    pub losers: Vec<String>,
}

impl Promotion {
    /// Whether more than one branch tied at the top
    #[inline]
    #[must_use]
    pub fn is_tied(&self) -> bool {
        self.winners.len() > 1
    }
}

/// Split ranked survivors into winners and losers
///
/// Ties at the top are never broken automatically: every branch holding the
/// top win count is promoted, and the quality gate plus the operator decide
/// from there.
#[must_use]
pub fn promote_finalists(tally: &WinTally) -> Promotion {
    let top = tally.top();
    let mut promotion = Promotion::default();
    for (branch, _) in tally.ranking() {
        if top.contains(&branch) {
            promotion.winners.push(branch);
        } else {
            promotion.losers.push(branch);
        }
    }
    promotion
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratchet_compare::{ComparisonSpec, Contender};
    use ratchet_registry::MetricMap;

    fn summary(pairs: &[(&str, f64)]) -> MetricMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn single_top_promotes_one_winner() {
        let contenders = vec![
            Contender::new("a", summary(&[("loss", 0.38), ("accuracy", 0.92)])),
            Contender::new("b", summary(&[("loss", 0.40), ("accuracy", 0.90)])),
        ];
        let tally = WinTally::rank(&contenders, &ComparisonSpec::new());
        let promotion = promote_finalists(&tally);
        assert_eq!(promotion.winners, vec!["a".to_string()]);
        assert_eq!(promotion.losers, vec!["b".to_string()]);
        assert!(!promotion.is_tied());
    }

    #[test]
    fn top_ties_all_advance() {
        let contenders = vec![
            Contender::new("a", summary(&[("loss", 0.38), ("accuracy", 0.90)])),
            Contender::new("b", summary(&[("loss", 0.40), ("accuracy", 0.92)])),
            Contender::new("c", summary(&[("loss", 0.41), ("accuracy", 0.89)])),
        ];
        let tally = WinTally::rank(&contenders, &ComparisonSpec::new());
        let promotion = promote_finalists(&tally);
        assert_eq!(
            promotion.winners,
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(promotion.losers, vec!["c".to_string()]);
        assert!(promotion.is_tied());
    }

    #[test]
    fn empty_tally_promotes_nobody() {
        let tally = WinTally::rank(&[], &ComparisonSpec::new());
        let promotion = promote_finalists(&tally);
        assert!(promotion.winners.is_empty());
        assert!(promotion.losers.is_empty());
    }
}
