use itertools::Itertools;

use super::IngestionRecord;

/// Keep the first record for each distinct text, preserving order
///
/// Texts are compared exactly, so whitespace or case variants are kept apart
/// while all empty texts collapse into one record.
#[inline]
pub fn dedup_by_text(records: Vec<IngestionRecord>) -> Vec<IngestionRecord> {
    records
        .into_iter()
        .unique_by(|record| record.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str) -> IngestionRecord {
        IngestionRecord {
            id: id.to_string(),
            title: String::new(),
            vector: vec![0.0],
            text: text.to_string(),
        }
    }

    fn ids(records: &[IngestionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn first_occurrence_wins() {
        let deduped = dedup_by_text(vec![
            record("a0", "alpha"),
            record("a1", "beta"),
            record("a2", "alpha"),
            record("a3", "gamma"),
            record("a4", "beta"),
        ]);

        assert_eq!(ids(&deduped), vec!["a0", "a1", "a3"]);
    }

    #[test]
    fn empty_texts_collapse_to_one() {
        let deduped = dedup_by_text(vec![
            record("a0", ""),
            record("a1", "x"),
            record("a2", ""),
        ]);

        assert_eq!(ids(&deduped), vec!["a0", "a1"]);
    }

    #[test]
    fn comparison_is_exact() {
        let deduped = dedup_by_text(vec![
            record("a0", "Hello"),
            record("a1", "hello"),
            record("a2", "hello "),
        ]);

        assert_eq!(deduped.len(), 3);
    }

    #[test]
    fn dedup_is_idempotent() {
        let once = dedup_by_text(vec![
            record("a0", "x"),
            record("a1", "y"),
            record("a2", "x"),
            record("a3", ""),
            record("a4", ""),
        ]);
        let twice = dedup_by_text(once.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn survivors_keep_relative_order() {
        let input: Vec<IngestionRecord> = (0..50)
            .map(|i| record(&format!("r{i}"), &format!("text {}", i % 7)))
            .collect();
        let deduped = dedup_by_text(input.clone());

        let positions: Vec<usize> = deduped
            .iter()
            .map(|kept| {
                input
                    .iter()
                    .position(|r| r.id == kept.id)
                    .expect("survivor should come from input")
            })
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(deduped.len(), 7);
    }

    #[test]
    fn empty_input() {
        assert!(dedup_by_text(Vec::new()).is_empty());
    }
}
