// Plurality vote over the labels of the nearest neighbours.
// Candidates are ordered nearest first; when several labels share the top count,
// the one whose best-ranked supporter is nearest wins.
pub fn plurality<'a, L: PartialEq + 'a>(
    candidates: impl IntoIterator<Item = &'a L>,
) -> Option<&'a L> {
    // (label, votes) in order of first appearance, which is also the order of best rank
    let mut tally: Vec<(&L, usize)> = Vec::new();
    for label in candidates {
        match tally.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, votes)) => *votes += 1,
            None => tally.push((label, 1)),
        }
    }

    // Keep the earliest entry among equal counts
    tally
        .into_iter()
        .fold(None, |best: Option<(&L, usize)>, (label, votes)| match best {
            Some((_, best_votes)) if best_votes >= votes => best,
            _ => Some((label, votes)),
        })
        .map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plurality() {
        let labels = ["b", "a", "a", "c", "b", "a"];
        assert_eq!(plurality(&labels), Some(&"a"));
    }

    #[test]
    fn test_plurality_tie_goes_to_nearest() {
        let labels = [2, 1, 1, 2, 3];
        assert_eq!(plurality(&labels), Some(&2));
        let labels = [3, 1, 2];
        assert_eq!(plurality(&labels), Some(&3));
    }

    #[test]
    fn test_plurality_empty() {
        let labels: [usize; 0] = [];
        assert_eq!(plurality(&labels), None);
    }
}
