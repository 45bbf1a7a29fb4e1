//! Report engine: the entry points the HTTP layer calls.
//!
//! Pipeline for an uncached read: persisted report if any, else load → score →
//! enrich (bounded) → compose → persist (best effort). The cache guarantees one
//! pipeline run per result id at a time; the persisted copy keeps reports
//! stable across restarts and cache evictions.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, ReportError};
use crate::personality::cache::ReportCache;
use crate::personality::catalog::Catalog;
use crate::personality::composer::{Composer, Report};
use crate::personality::demographics::Demographics;
use crate::personality::enrichment::EnrichmentClient;
use crate::personality::keywords::extract_keywords;
use crate::personality::matcher::{top_two, CoalitionMatch};
use crate::personality::questions::{AnswerRecord, QuestionBank};
use crate::personality::repository::ResultRepository;
use crate::personality::traits::score_traits;

pub struct ReportEngine {
    questions: Arc<QuestionBank>,
    catalog: Arc<Catalog>,
    repo: Arc<dyn ResultRepository>,
    enrichment: Arc<EnrichmentClient>,
    composer: Arc<Composer>,
    cache: ReportCache,
}

impl ReportEngine {
    pub fn new(
        questions: Arc<QuestionBank>,
        catalog: Arc<Catalog>,
        repo: Arc<dyn ResultRepository>,
        enrichment: EnrichmentClient,
    ) -> Self {
        Self {
            questions,
            composer: Arc::new(Composer::new(Arc::clone(&catalog))),
            catalog,
            repo,
            enrichment: Arc::new(enrichment),
            cache: ReportCache::new(),
        }
    }

    /// Bounds how many finished reports stay in memory.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ReportCache::with_capacity(capacity);
        self
    }

    pub fn questions(&self) -> &QuestionBank {
        &self.questions
    }

    /// Validates and stores a new set of answers, returning the result id.
    pub async fn submit_answers(&self, answers: Vec<AnswerRecord>) -> Result<Uuid, AppError> {
        if answers.is_empty() {
            return Err(AppError::Validation("at least one answer is required".to_string()));
        }
        let mut seen = HashSet::new();
        for answer in &answers {
            if self.questions.get(answer.question_id()).is_none() {
                return Err(AppError::Validation(format!(
                    "unknown question id '{}'",
                    answer.question_id()
                )));
            }
            if !seen.insert(answer.question_id()) {
                return Err(AppError::Validation(format!(
                    "question '{}' answered more than once",
                    answer.question_id()
                )));
            }
        }

        let id = self.repo.create_result(&answers).await?;
        info!("Stored {} answers as result {id}", answers.len());
        Ok(id)
    }

    /// Stores demographics and recomputes the top coalition with the same
    /// ranking the report uses. A changed top coalition invalidates the report.
    pub async fn submit_demographics(
        &self,
        id: Uuid,
        demographics: Demographics,
    ) -> Result<CoalitionMatch, AppError> {
        demographics.validate().map_err(AppError::Validation)?;

        let stored = self
            .repo
            .load_result(id)
            .await?
            .ok_or(ReportError::UnknownResult(id))?;
        if stored.answers.is_empty() {
            return Err(ReportError::AnswersMissing(id).into());
        }

        self.repo.save_demographics(id, &demographics).await?;

        let scores = score_traits(&stored.answers, &self.questions);
        let keywords = extract_keywords(&demographics.open_text());
        let [top, _] = top_two(&scores, &self.catalog, &keywords);

        if stored.top_coalition.as_deref() != Some(top.name.as_str()) {
            if let Some(previous) = &stored.top_coalition {
                info!("Top coalition for {id} changed from {previous} to {}", top.name);
            }
            self.repo.set_top_coalition(id, &top.name).await?;
            self.invalidate(id).await?;
        }
        Ok(top)
    }

    /// Returns the memoized report, computing it on first read.
    pub async fn get_report(&self, id: Uuid) -> Result<Arc<Report>, ReportError> {
        let repo = Arc::clone(&self.repo);
        let questions = Arc::clone(&self.questions);
        let enrichment = Arc::clone(&self.enrichment);
        let composer = Arc::clone(&self.composer);

        self.cache
            .get_or_compute(id, move || async move {
                match repo.load_report(id).await {
                    Ok(Some(report)) => {
                        info!("Loaded persisted report for {id}");
                        return Ok(report);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Ignoring unreadable persisted report for {id}: {e}"),
                }

                let stored = repo
                    .load_result(id)
                    .await
                    .map_err(|e| ReportError::Storage(e.to_string()))?
                    .ok_or(ReportError::UnknownResult(id))?;
                if stored.answers.is_empty() {
                    return Err(ReportError::AnswersMissing(id));
                }
                let demographics = stored
                    .demographics
                    .ok_or(ReportError::DemographicsMissing(id))?;

                let local = score_traits(&stored.answers, &questions);
                info!("Computing report for {id}, local scores {local:?}");
                let outcome = enrichment.enrich(&local, &demographics).await;
                let report = composer.compose(id, &local, &demographics, &outcome);

                match repo.store_report(id, stored.report_version, &report).await {
                    Ok(true) => {}
                    Ok(false) => info!("Report for {id} was invalidated while computing, not persisted"),
                    Err(e) => error!("Failed to persist report for {id}, returning it anyway: {e}"),
                }
                Ok(report)
            })
            .await
    }

    /// Clears the memoized report and its persisted copy.
    ///
    /// The persisted copy goes first so a read racing this call cannot reload
    /// the old report into the cache.
    pub async fn invalidate(&self, id: Uuid) -> Result<(), AppError> {
        let cleared = self.repo.clear_report(id).await;
        self.cache.invalidate(id);
        cleared?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::llm_client::testing::{Script, ScriptedGenerator};
    use crate::personality::composer::{Provenance, COURSE_COUNT, MIN_CAREERS};
    use crate::personality::repository::memory::MemoryResultRepository;

    const ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(20);

    struct Harness {
        engine: Arc<ReportEngine>,
        repo: Arc<MemoryResultRepository>,
        generator: Arc<ScriptedGenerator>,
    }

    fn engine_over(repo: &Arc<MemoryResultRepository>, generator: &Arc<ScriptedGenerator>) -> ReportEngine {
        let catalog = Arc::new(Catalog::builtin());
        let enrichment =
            EnrichmentClient::new(generator.clone(), Arc::clone(&catalog), ENRICHMENT_TIMEOUT);
        ReportEngine::new(
            Arc::new(QuestionBank::builtin()),
            catalog,
            repo.clone(),
            enrichment,
        )
    }

    fn harness(script: Script) -> Harness {
        let repo = Arc::new(MemoryResultRepository::new());
        let generator = Arc::new(ScriptedGenerator::new(script));
        Harness {
            engine: Arc::new(engine_over(&repo, &generator)),
            repo,
            generator,
        }
    }

    fn enrichment_reply() -> String {
        json!({
            "keywords": ["music", "painting"],
            "updated_scores": {"Openness": 4.7, "Agreeableness": 4.1},
            "top_coalitions": [
                {"name": "Dreamy Artist", "reason": "Paints and writes songs in free time."},
                {"name": "Innovative Explorer", "reason": "Keeps starting new projects."}
            ],
            "personality_comment": "You light up when you talk about art and you are always creating something new.",
            "career_recommendations": ["Illustrator", "Musician", "Art Director"],
            "course_recommendations": ["Illustration", "Music Production", "Art History", "Design Thinking", "Portfolio Building"]
        })
        .to_string()
    }

    fn neutral_answers() -> Vec<AnswerRecord> {
        QuestionBank::builtin()
            .personality()
            .map(|q| AnswerRecord::new(q.id.clone(), 3).unwrap())
            .collect()
    }

    fn demographics(interests: &str) -> Demographics {
        Demographics {
            full_name: "Robin Vale".to_string(),
            interests: interests.to_string(),
            goals: "Find work I actually enjoy".to_string(),
            ..Default::default()
        }
    }

    async fn submitted(h: &Harness, interests: &str) -> Uuid {
        let id = h.engine.submit_answers(neutral_answers()).await.unwrap();
        h.engine
            .submit_demographics(id, demographics(interests))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_report_is_idempotent() {
        let h = harness(Script::Reply(enrichment_reply()));
        let id = submitted(&h, "music and painting").await;

        let first = h.engine.get_report(id).await.unwrap();
        let second = h.engine.get_report(id).await.unwrap();

        assert_eq!(*first, *second);
        assert_eq!(h.generator.calls(), 1);
        assert_eq!(first.provenance, Provenance::Enriched);
        assert_eq!(h.repo.stored_report(id).as_ref(), Some(&*first));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_enrichment() {
        let h = harness(Script::Reply(enrichment_reply()));
        let id = submitted(&h, "music and painting").await;

        let first = h.engine.get_report(id).await.unwrap();
        assert_eq!(first.provenance, Provenance::Enriched);
        h.engine.invalidate(id).await.unwrap();
        assert!(h.repo.stored_report(id).is_none());

        h.generator.set_script(Script::Fail);
        let second = h.engine.get_report(id).await.unwrap();
        assert_eq!(second.provenance, Provenance::Fallback);
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_complete_fallback_report() {
        let h = harness(Script::Hang);
        let id = submitted(&h, "music and painting").await;

        let report = h.engine.get_report(id).await.unwrap();

        assert_eq!(report.provenance, Provenance::Fallback);
        assert!(report.career_recommendations.len() >= MIN_CAREERS);
        assert_eq!(report.course_recommendations.len(), COURSE_COUNT);
        assert_ne!(report.top_coalitions[0].name, report.top_coalitions[1].name);
        assert!(report.personality_comment.contains("Robin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_make_one_enrichment_call() {
        let h = harness(Script::DelayedReply(Duration::from_secs(3), enrichment_reply()));
        let id = submitted(&h, "music and painting").await;

        let readers: Vec<_> = (0..10)
            .map(|_| {
                let engine = Arc::clone(&h.engine);
                tokio::spawn(async move { engine.get_report(id).await })
            })
            .collect();
        for reader in readers {
            assert!(reader.await.unwrap().is_ok());
        }
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_read_still_fills_cache() {
        let h = harness(Script::DelayedReply(Duration::from_secs(3), enrichment_reply()));
        let id = submitted(&h, "music and painting").await;

        let engine = Arc::clone(&h.engine);
        let reader = tokio::spawn(async move { engine.get_report(id).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        reader.abort();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.repo.stored_report(id).is_some());

        h.engine.get_report(id).await.unwrap();
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_persisted_report_survives_restart() {
        let h = harness(Script::Reply(enrichment_reply()));
        let id = submitted(&h, "music and painting").await;
        let before = h.engine.get_report(id).await.unwrap();

        // fresh engine, empty cache, same storage
        let restarted = engine_over(&h.repo, &h.generator);
        let after = restarted.get_report(id).await.unwrap();

        assert_eq!(*before, *after);
        assert_eq!(before.generated_at, after.generated_at);
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_evicted_report_is_reloaded_not_recomputed() {
        let repo = Arc::new(MemoryResultRepository::new());
        let generator = Arc::new(ScriptedGenerator::new(Script::Reply(enrichment_reply())));
        let h = Harness {
            engine: Arc::new(engine_over(&repo, &generator).with_cache_capacity(1)),
            repo,
            generator,
        };
        let first = submitted(&h, "music and painting").await;
        let second = submitted(&h, "painting and music").await;

        let original = h.engine.get_report(first).await.unwrap();
        h.engine.get_report(second).await.unwrap();
        let reread = h.engine.get_report(first).await.unwrap();

        assert!(!Arc::ptr_eq(&original, &reread));
        assert_eq!(*original, *reread);
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_computation_is_not_persisted() {
        let h = harness(Script::DelayedReply(Duration::from_secs(3), enrichment_reply()));
        let id = submitted(&h, "music and painting").await;

        let engine = Arc::clone(&h.engine);
        let reader = tokio::spawn(async move { engine.get_report(id).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.engine.invalidate(id).await.unwrap();

        assert!(reader.await.unwrap().is_ok());
        assert!(h.repo.stored_report(id).is_none());

        h.engine.get_report(id).await.unwrap();
        assert!(h.repo.stored_report(id).is_some());
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_changed_top_coalition_triggers_recompute() {
        let h = harness(Script::Fail);
        let id = submitted(&h, "cars and engines").await;

        let before = h.engine.get_report(id).await.unwrap();
        assert_eq!(before.top_coalitions[0].name, "Practical Solver");

        let top = h
            .engine
            .submit_demographics(id, demographics("art, music, writing"))
            .await
            .unwrap();
        assert_eq!(top.name, "Dreamy Artist");

        let after = h.engine.get_report(id).await.unwrap();
        assert_eq!(after.top_coalitions[0].name, "Dreamy Artist");
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_top_coalition_keeps_cached_report() {
        let h = harness(Script::Fail);
        let id = submitted(&h, "cars and engines").await;
        let before = h.engine.get_report(id).await.unwrap();

        h.engine
            .submit_demographics(id, demographics("fixing bikes"))
            .await
            .unwrap();
        let after = h.engine.get_report(id).await.unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_inputs_are_distinct_errors() {
        let h = harness(Script::Fail);

        let unknown = Uuid::new_v4();
        assert_eq!(
            h.engine.get_report(unknown).await.unwrap_err(),
            ReportError::UnknownResult(unknown)
        );

        let id = h.engine.submit_answers(neutral_answers()).await.unwrap();
        assert_eq!(
            h.engine.get_report(id).await.unwrap_err(),
            ReportError::DemographicsMissing(id)
        );

        let empty = h.repo.create_result(&[]).await.unwrap();
        assert_eq!(
            h.engine.get_report(empty).await.unwrap_err(),
            ReportError::AnswersMissing(empty)
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_report() {
        let h = harness(Script::Reply(enrichment_reply()));
        let id = submitted(&h, "music and painting").await;
        h.repo.fail_report_writes(true);

        let report = h.engine.get_report(id).await.unwrap();
        assert_eq!(report.provenance, Provenance::Enriched);
        assert!(h.repo.stored_report(id).is_none());
    }

    #[tokio::test]
    async fn test_submit_answers_validation() {
        let h = harness(Script::Fail);
        assert!(matches!(
            h.engine.submit_answers(Vec::new()).await,
            Err(AppError::Validation(_))
        ));

        let unknown = vec![AnswerRecord::new("Q99", 3).unwrap()];
        assert!(matches!(
            h.engine.submit_answers(unknown).await,
            Err(AppError::Validation(_))
        ));

        let twice = vec![
            AnswerRecord::new("P1", 3).unwrap(),
            AnswerRecord::new("P1", 4).unwrap(),
        ];
        assert!(matches!(
            h.engine.submit_answers(twice).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_demographics_for_unknown_result() {
        let h = harness(Script::Fail);
        let result = h
            .engine
            .submit_demographics(Uuid::new_v4(), demographics("anything"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Report(ReportError::UnknownResult(_)))
        ));
    }
}
