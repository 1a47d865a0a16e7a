//! Built-in enricher used when no external scoring service is wired up.
//!
//! Scores from structural signals in the note itself: length, links,
//! headings, and author-supplied tags. Deterministic and offline, so the
//! watch loop works out of the box.

use async_trait::async_trait;
use tend_core::{BodyDelta, Enricher, NoteRecord, ScoreOutcome};

pub struct HeuristicEnricher;

#[async_trait]
impl Enricher for HeuristicEnricher {
    async fn score(&self, record: &NoteRecord) -> anyhow::Result<ScoreOutcome> {
        let body = record.body.trim();
        let words = body.split_whitespace().count();

        let mut score: f64 = 0.0;
        if !body.is_empty() {
            score += 0.2;
        }
        if words >= 50 {
            score += 0.2;
        }
        if words >= 200 {
            score += 0.1;
        }
        if body.contains("[[") || body.contains("](") {
            score += 0.2;
        }
        if body.lines().any(|line| line.starts_with('#')) {
            score += 0.1;
        }
        if !record.tags.is_empty() {
            score += 0.2;
        }

        Ok(ScoreOutcome {
            quality_score: score.min(1.0),
            tags: Vec::new(),
        })
    }

    async fn enrich_body(&self, _record: &NoteRecord) -> anyhow::Result<BodyDelta> {
        Ok(BodyDelta::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tend_core::NoteId;

    fn note(body: &str, tags: Vec<String>) -> NoteRecord {
        let mut record = NoteRecord::new(NoteId::from("n1"), body);
        record.tags = tags;
        record
    }

    #[tokio::test]
    async fn empty_note_scores_zero() {
        let outcome = HeuristicEnricher.score(&note("", vec![])).await.unwrap();
        assert_eq!(outcome.quality_score, 0.0);
    }

    #[tokio::test]
    async fn structured_linked_note_outscores_a_bare_line() {
        let bare = HeuristicEnricher
            .score(&note("a single thought\n", vec![]))
            .await
            .unwrap();

        let rich_body = format!(
            "# Topic\n\nSee [[other-note]].\n\n{}",
            "word ".repeat(60)
        );
        let rich = HeuristicEnricher
            .score(&note(&rich_body, vec!["tagged".into()]))
            .await
            .unwrap();

        assert!(rich.quality_score > bare.quality_score);
        assert!(rich.quality_score <= 1.0);
    }
}
