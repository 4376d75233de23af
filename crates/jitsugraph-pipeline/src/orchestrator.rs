//! The pipeline orchestrator: one linear pass from problem text to a
//! normalized, render-ready graph. Stages run strictly in order, are never
//! retried or skipped, and the first failure aborts the run. The usage record
//! is written only after every stage has succeeded.

use crate::gate::RateLimitGate;
use crate::normalize::normalize_graph;
use jitsugraph_ai::stages;
use jitsugraph_ai::GenerativeProvider;
use jitsugraph_core::{
    FlowGraph, JitsuGraphError, PipelineConfig, ReferenceRetriever, Result, Stage,
    TechniqueSource, UsageLedger, Video, VideoSource,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct Pipeline {
    provider: Arc<dyn GenerativeProvider>,
    retriever: Arc<dyn ReferenceRetriever>,
    techniques: Arc<dyn TechniqueSource>,
    ledger: Arc<dyn UsageLedger>,
    videos: Arc<dyn VideoSource>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        retriever: Arc<dyn ReferenceRetriever>,
        techniques: Arc<dyn TechniqueSource>,
        ledger: Arc<dyn UsageLedger>,
        videos: Arc<dyn VideoSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            retriever,
            techniques,
            ledger,
            videos,
            config,
        }
    }

    /// Turn a practitioner's problem into a normalized technique flowchart.
    #[instrument(skip(self, problem), fields(user = user_id))]
    pub async fn solve(&self, user_id: &str, problem: &str) -> Result<FlowGraph> {
        let user = RateLimitGate::parse_identity(user_id)?;

        // The gate runs before any generative work; a denied request must
        // not touch the provider.
        let gate = RateLimitGate::new(self.ledger.clone());
        let decision = gate.check(user).await?;
        debug!(used = decision.used, limit = decision.limit, "rate gate passed");

        let hypothesis = stages::hypothesize(self.provider.as_ref(), problem).await?;

        let vector = stages::embed_paragraph(self.provider.as_ref(), &hypothesis).await?;

        let references = self
            .retriever
            .similarity_search(
                &vector,
                self.config.retrieval.threshold,
                self.config.retrieval.top_k,
            )
            .await
            .map_err(|e| JitsuGraphError::stage(Stage::Retrieve, e))?;
        debug!(references = references.len(), "retrieved reference documents");

        let grounded =
            stages::ground(self.provider.as_ref(), problem, &hypothesis, &references).await?;

        let sequences =
            stages::extract_sequences(self.provider.as_ref(), &grounded, self.config.extraction)
                .await?;

        let catalog = self
            .techniques
            .load_techniques()
            .await
            .map_err(|e| JitsuGraphError::stage(Stage::LoadCatalog, e))?;

        let late_problem = self
            .config
            .include_problem_in_late_stages
            .then_some(problem);

        let graph = stages::synthesize_graph(
            self.provider.as_ref(),
            late_problem,
            &sequences,
            &catalog,
            self.config.max_nodes,
        )
        .await?;

        // Structural minimums, checked before refinement. An empty graph
        // means the service could not satisfy the synthesis contract.
        if graph.nodes.is_empty() {
            return Err(JitsuGraphError::NoNodes);
        }
        if graph.edges.is_empty() {
            return Err(JitsuGraphError::NoEdges);
        }

        let refined = stages::refine_graph(
            self.provider.as_ref(),
            late_problem,
            &graph,
            &sequences,
            &references,
            &catalog,
        )
        .await?;

        let (_mapping, flow) = normalize_graph(&refined, &catalog)?;

        // Exactly one audit write, and only on full success.
        let metadata = json!({
            "problem": problem,
            "hypothesis": hypothesis,
            "grounded_text": grounded,
            "extracted_sequences": sequences,
        });
        self.ledger.record_use(user, metadata).await?;

        info!(
            nodes = flow.nodes.len(),
            edges = flow.edges.len(),
            name = %flow.name,
            "pipeline complete"
        );
        Ok(flow)
    }

    /// Recommend tutorial videos for an already-normalized graph: describe
    /// each branch, embed the descriptions, and search for the videos whose
    /// reference paragraphs match.
    #[instrument(skip_all)]
    pub async fn recommend_tutorials(&self, flow: &FlowGraph) -> Result<Vec<Video>> {
        let paragraphs = stages::describe_branches(self.provider.as_ref(), flow).await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut tutorials = Vec::new();

        for paragraph in &paragraphs {
            let vector = stages::embed_paragraph(self.provider.as_ref(), paragraph).await?;
            let matches = self
                .retriever
                .similarity_search(
                    &vector,
                    self.config.recommend.threshold,
                    self.config.recommend.top_k,
                )
                .await
                .map_err(|e| JitsuGraphError::stage(Stage::Retrieve, e))?;

            for doc in matches {
                let Some(video_id) = doc.video_id else {
                    continue;
                };
                if !seen.insert(video_id.clone()) {
                    continue;
                }
                if let Some(video) = self.videos.video_info(&video_id).await? {
                    tutorials.push(video);
                }
            }
        }

        debug!(count = tutorials.len(), "tutorial recommendations");
        Ok(tutorials)
    }
}
