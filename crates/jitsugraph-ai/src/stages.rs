//! The ordered generation stages. Each stage builds a prompt, calls the
//! opaque provider, and validates the result against its own output
//! contract; any collaborator error or contract violation surfaces as a
//! `Stage`-tagged failure naming the step.

use crate::provider::{GenerationConfig, GenerativeProvider};
use jitsugraph_core::{
    ExtractionMode, FlowGraph, Graph, JitsuGraphError, ReferenceDoc, Result, Sequence, Stage,
    Technique,
};
use serde::Serialize;
use tracing::debug;

const COACH_PERSONA: &str = "You are an expert in Brazilian gi and no-gi jiu-jitsu and a \
professional coach.";

/// References are flattened to `{name, paragraph}` pairs before being fed
/// back into prompts, matching the retrieval row shape.
#[derive(Debug, Serialize)]
struct PromptReference<'a> {
    name: &'a str,
    paragraph: &'a str,
}

fn serialize_references(references: &[ReferenceDoc]) -> Result<String> {
    let flattened: Vec<PromptReference<'_>> = references
        .iter()
        .map(|doc| PromptReference {
            name: &doc.name,
            paragraph: &doc.content,
        })
        .collect();
    Ok(serde_json::to_string(&flattened)?)
}

fn to_json<T: Serialize>(value: &T, stage: Stage) -> Result<String> {
    serde_json::to_string(value).map_err(|e| JitsuGraphError::stage(stage, e))
}

/// Generate a hypothetical solution paragraph for the user's problem. The
/// hypothesis is embedded for retrieval, so a plausible full answer beats the
/// often terse problem text.
pub async fn hypothesize(provider: &dyn GenerativeProvider, problem: &str) -> Result<String> {
    let instructions = format!(
        "{COACH_PERSONA} \
         This is a problem faced by a jiu-jitsu practitioner. \
         Generate a jiu-jitsu sequence that solves their problem and gives them \
         different techniques, positions, and paths."
    );

    debug!("generating hypothesis paragraph");
    provider
        .generate(&[problem, &instructions], &GenerationConfig::default())
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Hypothesize, e))
}

/// Embed the hypothesis paragraph.
pub async fn embed_paragraph(
    provider: &dyn GenerativeProvider,
    paragraph: &str,
) -> Result<Vec<f32>> {
    provider
        .embed(paragraph)
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Embed, e))
}

/// Reconcile the hypothesis against retrieved reference documents. Relevance
/// filtering is delegated to the service; an empty reference set is valid and
/// still runs the stage.
pub async fn ground(
    provider: &dyn GenerativeProvider,
    problem: &str,
    hypothesis: &str,
    references: &[ReferenceDoc],
) -> Result<String> {
    let similar =
        serialize_references(references).map_err(|e| JitsuGraphError::stage(Stage::Ground, e))?;
    let instructions = format!(
        "{COACH_PERSONA}\n\
         Given:\n\
         - A problem described by a jiu-jitsu practitioner.\n\
         - A hypothetical/proposed solution.\n\
         - A set of relevant paragraphs retrieved from tutorials.\n\
         Your task:\n\
         - Ignore any paragraphs that do not directly address the problem.\n\
         - Update the proposed solution to use relevant techniques, positions, \
           and transitions from the retrieved paragraphs.\n\
         - Remove contradictions and align the advice with realistic, proven \
           paths from the referenced content."
    );

    debug!(references = references.len(), "grounding hypothesis");
    provider
        .generate(
            &[problem, hypothesis, &similar, &instructions],
            &GenerationConfig::default(),
        )
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Ground, e))
}

/// Extract named step sequences from the grounded paragraph. `Single` mode
/// collapses the paragraph into one sequence; `Multi` splits distinct
/// pathways into separate sequences.
pub async fn extract_sequences(
    provider: &dyn GenerativeProvider,
    paragraph: &str,
    mode: ExtractionMode,
) -> Result<Vec<Sequence>> {
    let shape = match mode {
        ExtractionMode::Single => {
            "Respond with a single JSON object: {\"name\": string, \"steps\": [string]}."
        }
        ExtractionMode::Multi => {
            "Respond with a JSON array of objects: [{\"name\": string, \"steps\": [string]}]."
        }
    };
    let instructions = format!(
        "{COACH_PERSONA}\n\
         Break down the solution to a practitioner's jiu-jitsu problem into \
         detailed steps, containing information about techniques, positions, \
         and any other relevant information.\n\
         Keep sequence names under 30 characters.\n\
         {shape}"
    );

    let value = provider
        .generate_json(&[paragraph, &instructions], &GenerationConfig::default())
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Extract, e))?;

    let sequences = match mode {
        ExtractionMode::Single => serde_json::from_value::<Sequence>(value)
            .map(|s| vec![s])
            .map_err(|e| JitsuGraphError::stage(Stage::Extract, e))?,
        ExtractionMode::Multi => serde_json::from_value::<Vec<Sequence>>(value)
            .map_err(|e| JitsuGraphError::stage(Stage::Extract, e))?,
    };

    if sequences.is_empty() || sequences.iter().any(|s| s.steps.is_empty()) {
        return Err(JitsuGraphError::stage(
            Stage::Extract,
            "service returned no usable sequences",
        ));
    }
    Ok(sequences)
}

/// Merge the extracted sequences into one compact directed graph over the
/// supplied technique catalog.
pub async fn synthesize_graph(
    provider: &dyn GenerativeProvider,
    problem: Option<&str>,
    sequences: &[Sequence],
    catalog: &[Technique],
    max_nodes: usize,
) -> Result<Graph> {
    let sequences_json = to_json(&sequences, Stage::Synthesize)?;
    let catalog_json = to_json(&catalog, Stage::Synthesize)?;
    let instructions = format!(
        "Your task is to analyze the provided jiu-jitsu sequences and merge \
         them into a single, compact, directed graph. Prioritize the techniques \
         and pathways relevant to the given user problem. The final graph must \
         not exceed {max_nodes} nodes and should only contain 1 root node. \
         Create branches where the paths diverge to include multiple options.\n\
         Requirements:\n\
         - Use only the techniques from the given list; if not possible, \
           return empty nodes and edges.\n\
         - 'Top' and 'bottom' denote attacker and defender roles respectively \
           within each position.\n\
         - Each node must be assigned a unique small integer id (1, 2, 3, ...).\n\
         - Each node must include `id` and `technique_id` (an id from the \
           provided technique list).\n\
         - Each edge must include `id`, `source_id`, and `target_id` using \
           node ids, and may include a `note`.\n\
         - Eliminate duplicate steps and pathways.\n\
         Respond with a JSON object: {{\"name\": string, \"nodes\": [...], \
         \"edges\": [...]}}."
    );

    let mut parts = vec![catalog_json.as_str(), sequences_json.as_str()];
    if let Some(problem) = problem {
        parts.push(problem);
    }
    parts.push(&instructions);

    debug!(
        sequences = sequences.len(),
        techniques = catalog.len(),
        "synthesizing graph"
    );
    let value = provider
        .generate_json(&parts, &GenerationConfig::default())
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Synthesize, e))?;

    let graph: Graph = serde_json::from_value(value)
        .map_err(|e| JitsuGraphError::stage(Stage::Synthesize, e))?;

    // Catalog and closure invariants are part of the synthesis contract; a
    // violation means the service could not satisfy it.
    let unknown = graph.unknown_techniques(catalog);
    if !unknown.is_empty() {
        return Err(JitsuGraphError::stage(
            Stage::Synthesize,
            format!("graph references unknown technique ids {:?}", unknown),
        ));
    }
    if !graph.has_unique_ids() {
        return Err(JitsuGraphError::stage(
            Stage::Synthesize,
            "graph contains duplicate node or edge ids",
        ));
    }
    if !graph.is_referentially_closed() {
        return Err(JitsuGraphError::stage(
            Stage::Synthesize,
            "graph contains edges referencing missing nodes",
        ));
    }
    Ok(graph)
}

/// Rename the graph and rewrite edge notes with coaching detail. Structure is
/// read-only here: a refined graph whose topology drifted from the input is
/// rejected as a contract violation.
pub async fn refine_graph(
    provider: &dyn GenerativeProvider,
    problem: Option<&str>,
    graph: &Graph,
    sequences: &[Sequence],
    references: &[ReferenceDoc],
    catalog: &[Technique],
) -> Result<Graph> {
    let graph_json = to_json(graph, Stage::Refine)?;
    let sequences_json = to_json(&sequences, Stage::Refine)?;
    let catalog_json = to_json(&catalog, Stage::Refine)?;
    let similar =
        serialize_references(references).map_err(|e| JitsuGraphError::stage(Stage::Refine, e))?;

    let system = "You're a black belt jiu-jitsu coach capable of analyzing a \
                  sequence and giving practitioners (users) advice/details on how \
                  to execute and transition between techniques, or any other \
                  supplementary information that may be valuable for increasing \
                  the success of the sequence they're trying to implement/execute.";
    let instructions = "Given the following flowchart which is a directed graph \
                        along with a list of techniques, the original, and the \
                        similar sequences paragraphs:\n\
                        - Analyze the sequence and rename the flowchart (max 30 \
                          characters).\n\
                        - The name should be based on the problem, flowchart and \
                          its underlying sequences solutions.\n\
                        - Recreate notes (max 400 characters each) that add \
                          detail to the edges and related nodes.\n\
                        - Notes should help practitioners understand how to \
                          execute the sequence.\n\
                        - Do not change node ids, technique ids, or edge \
                          source/target ids.\n\
                        Respond with the same JSON graph shape.";

    let mut parts = Vec::new();
    if let Some(problem) = problem {
        parts.push(problem);
    }
    parts.extend([
        graph_json.as_str(),
        catalog_json.as_str(),
        sequences_json.as_str(),
        similar.as_str(),
        instructions,
    ]);

    let config = GenerationConfig::default()
        .with_temperature(0.75)
        .with_system_instruction(system);

    let value = provider
        .generate_json(&parts, &config)
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Refine, e))?;

    let refined: Graph =
        serde_json::from_value(value).map_err(|e| JitsuGraphError::stage(Stage::Refine, e))?;

    if !graph.same_topology(&refined) {
        return Err(JitsuGraphError::stage(
            Stage::Refine,
            "refinement altered graph structure",
        ));
    }
    Ok(refined)
}

/// Convert a normalized graph into one paragraph per branch, root to leaf,
/// folding edge notes in. The paragraphs feed tutorial retrieval.
pub async fn describe_branches(
    provider: &dyn GenerativeProvider,
    flow: &FlowGraph,
) -> Result<Vec<String>> {
    let nodes_json = to_json(&flow.nodes, Stage::Describe)?;
    let edges_json = to_json(&flow.edges, Stage::Describe)?;
    let instructions = "Convert the given nodes and edges that represent a \
                        jiu-jitsu sequence from a directed graph into paragraphs \
                        for each branch, going from the root nodes to the leaf \
                        nodes while taking the notes into consideration.\n\
                        Respond with a JSON array of strings.";

    let config = GenerationConfig::default().with_system_instruction(
        "You're a black belt/expert coach in brazilian jiu-jitsu, gi and no-gi.",
    );

    let value = provider
        .generate_json(&[&nodes_json, &edges_json, instructions], &config)
        .await
        .map_err(|e| JitsuGraphError::stage(Stage::Describe, e))?;

    let paragraphs: Vec<String> =
        serde_json::from_value(value).map_err(|e| JitsuGraphError::stage(Stage::Describe, e))?;
    if paragraphs.is_empty() {
        return Err(JitsuGraphError::stage(
            Stage::Describe,
            "service returned no branch paragraphs",
        ));
    }
    Ok(paragraphs)
}
