use serde::{Deserialize, Serialize};

/// How sequences are extracted from the grounded paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Collapse the paragraph into exactly one sequence; branching stays
    /// implicit within the step text.
    Single,
    /// Split distinct techniques and pathways into separate sequences.
    Multi,
}

/// Tunables for the similarity-search step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub threshold: f32,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.51,
            top_k: 10,
        }
    }
}

/// Tunables for the tutorial-recommendation flow, which searches with a
/// tighter threshold than grounding retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub threshold: f32,
    pub top_k: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub recommend: RecommendConfig,
    pub extraction: ExtractionMode,
    /// Generation-time node ceiling requested from synthesis.
    pub max_nodes: usize,
    /// Whether the raw problem text is re-supplied to the synthesize and
    /// refine prompts in addition to the grounded artifacts.
    pub include_problem_in_late_stages: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            recommend: RecommendConfig::default(),
            extraction: ExtractionMode::Multi,
            max_nodes: 10,
            include_problem_in_late_stages: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        let config = PipelineConfig::default();
        assert!((config.retrieval.threshold - 0.51).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.max_nodes, 10);
        assert_eq!(config.extraction, ExtractionMode::Multi);
    }

    #[test]
    fn extraction_mode_round_trips_lowercase() {
        let json = serde_json::to_string(&ExtractionMode::Multi).unwrap();
        assert_eq!(json, "\"multi\"");
        let mode: ExtractionMode = serde_json::from_str("\"single\"").unwrap();
        assert_eq!(mode, ExtractionMode::Single);
    }
}
