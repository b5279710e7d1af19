use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use papercast_schema::Timestamp;
use papercast_store::PromptStore;
use rand::seq::{IteratorRandom, SliceRandom};

use crate::pdf::extract_text;
use crate::pipeline::PodcastPipeline;
use crate::router::LanguageModel;
use crate::templates::{render, EVALUATOR_PROMPT};

const JUDGE_INPUT: &str = "Which podcast is better? Answer 1 or 2.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    First,
    Second,
    Unclear,
}

/// A reply counts only when it mentions exactly one of the two digits.
pub fn parse_verdict(reply: &str) -> Verdict {
    match (reply.contains('1'), reply.contains('2')) {
        (true, false) => Verdict::First,
        (false, true) => Verdict::Second,
        _ => Verdict::Unclear,
    }
}

/// Asks a model which of two scripts better presents the source text.
pub struct PairwiseEvaluator {
    model: Arc<dyn LanguageModel>,
    model_id: String,
}

impl PairwiseEvaluator {
    pub fn new(model: Arc<dyn LanguageModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    pub async fn judge(&self, original_text: &str, podcast1: &str, podcast2: &str) -> Result<Verdict> {
        let system = render(
            EVALUATOR_PROMPT,
            &[
                ("original_text", original_text),
                ("podcast1", podcast1),
                ("podcast2", podcast2),
            ],
        );
        let reply = self
            .model
            .complete_at(&system, JUDGE_INPUT, &self.model_id, 0.0)
            .await?;
        let verdict = parse_verdict(&reply);
        if verdict == Verdict::Unclear {
            tracing::warn!(reply = %reply.trim(), "unclear or tied verdict");
        }
        Ok(verdict)
    }
}

/// Wins per prompt version across evaluation rounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scoreboard {
    wins: BTreeMap<Timestamp, u64>,
    pub unclear: u64,
    pub failed: u64,
}

impl Scoreboard {
    pub fn record(&mut self, winner: &Timestamp) {
        *self.wins.entry(winner.clone()).or_default() += 1;
    }

    pub fn apply(&mut self, pair: &(Timestamp, Timestamp), verdict: Verdict) {
        match verdict {
            Verdict::First => self.record(&pair.0),
            Verdict::Second => self.record(&pair.1),
            Verdict::Unclear => self.unclear += 1,
        }
    }

    pub fn wins(&self) -> &BTreeMap<Timestamp, u64> {
        &self.wins
    }

    /// `(timestamp, raw, share of all wins)` in timestamp order.
    pub fn normalized(&self) -> Vec<(Timestamp, u64, f64)> {
        let total: u64 = self.wins.values().sum();
        self.wins
            .iter()
            .map(|(ts, &points)| {
                let share = if total > 0 {
                    points as f64 / total as f64
                } else {
                    0.0
                };
                (ts.clone(), points, share)
            })
            .collect()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("Timestamp,Raw Points,Normalized Points\n");
        for (ts, points, share) in self.normalized() {
            let _ = writeln!(out, "{ts},{points},{share}");
        }
        out
    }

    /// Writes `raw_data_<now>.csv` into `dir` and returns its path.
    pub async fn write_csv(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("raw_data_{}.csv", Timestamp::now()));
        tokio::fs::write(&path, self.to_csv()).await?;
        Ok(path)
    }
}

/// `*.pdf` files directly under `dir`, sorted.
pub async fn pdf_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && tokio::fs::metadata(&path).await?.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Repeated pairwise comparisons of random prompt versions on random documents.
pub struct EvaluationRunner {
    pipeline: PodcastPipeline,
    prompts: PromptStore,
    evaluator: PairwiseEvaluator,
    max_tokens: usize,
    concurrency: usize,
}

impl EvaluationRunner {
    pub fn new(
        pipeline: PodcastPipeline,
        prompts: PromptStore,
        evaluator: PairwiseEvaluator,
        max_tokens: usize,
    ) -> Self {
        Self {
            pipeline,
            prompts,
            evaluator,
            max_tokens,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Failed rounds are logged and counted, never retried.
    pub async fn run(&self, documents: &[PathBuf], rounds: usize) -> Result<Scoreboard> {
        if documents.is_empty() {
            bail!("no documents to evaluate on");
        }
        let history: Vec<Timestamp> = self.prompts.list_timestamps().await?.into_iter().collect();
        if history.len() < 2 {
            bail!(
                "not enough prompt versions: found {}, need at least 2",
                history.len()
            );
        }

        let mut board = Scoreboard::default();
        let mut results = futures::stream::iter(1..=rounds)
            .map(|round| self.round(round, documents, &history))
            .buffer_unordered(self.concurrency);

        while let Some(result) = results.next().await {
            match result {
                Ok((pair, verdict)) => board.apply(&pair, verdict),
                Err(err) => {
                    board.failed += 1;
                    tracing::warn!("evaluation round failed: {err:#}");
                }
            }
        }
        Ok(board)
    }

    async fn round(
        &self,
        round: usize,
        documents: &[PathBuf],
        history: &[Timestamp],
    ) -> Result<((Timestamp, Timestamp), Verdict)> {
        let (document, first, second) = {
            let mut rng = rand::thread_rng();
            let document = documents
                .choose(&mut rng)
                .ok_or_else(|| anyhow!("no documents"))?
                .clone();
            let mut picked = history.iter().choose_multiple(&mut rng, 2);
            picked.shuffle(&mut rng);
            let [first, second] = picked.as_slice() else {
                bail!("not enough prompt versions");
            };
            (document, (*first).clone(), (*second).clone())
        };

        tracing::info!(round, document = %document.display(), %first, %second, "evaluation round");
        let bytes = tokio::fs::read(&document).await?;
        let text = extract_text(&bytes, self.max_tokens)?.text;

        let state1 = self.pipeline.run(&text, Some(&first)).await?;
        let state2 = self.pipeline.run(&text, Some(&second)).await?;
        let verdict = self
            .evaluator
            .judge(&text, &state1.enhanced_script, &state2.enhanced_script)
            .await?;
        Ok(((first, second), verdict))
    }
}
