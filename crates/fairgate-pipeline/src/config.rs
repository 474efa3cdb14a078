use crate::behavior::BehaviorConfig;
use crate::events::PipelineEvent;
use fairgate_core::events::EventListeners;
use std::time::Duration;

/// Configuration for the RAG pipeline.
pub struct PipelineConfig {
    pub(crate) bm25_weight: f64,
    pub(crate) vector_weight: f64,
    pub(crate) min_score: f64,
    pub(crate) top_k: usize,
    /// How long the first-finished retrieval side waits for the slower one.
    pub(crate) patience: Duration,
    pub(crate) retrieval_cache_ttl: Duration,
    pub(crate) llm_cost_per_1k_tokens: f64,
    pub(crate) retrieval_cost_per_query: f64,
    pub(crate) pii_redaction_enabled: bool,
    pub(crate) behavior: BehaviorConfig,
    pub(crate) event_listeners: EventListeners<PipelineEvent>,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    bm25_weight: f64,
    vector_weight: f64,
    min_score: f64,
    top_k: usize,
    patience: Duration,
    retrieval_cache_ttl: Duration,
    llm_cost_per_1k_tokens: f64,
    retrieval_cost_per_query: f64,
    pii_redaction_enabled: bool,
    behavior: BehaviorConfig,
    event_listeners: EventListeners<PipelineEvent>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            bm25_weight: 0.4,
            vector_weight: 0.6,
            min_score: 0.3,
            top_k: 5,
            patience: Duration::from_millis(250),
            retrieval_cache_ttl: Duration::from_secs(3600),
            llm_cost_per_1k_tokens: 0.03,
            retrieval_cost_per_query: 0.001,
            pii_redaction_enabled: true,
            behavior: BehaviorConfig::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Default fusion weight for BM25 scores (overridable per request).
    ///
    /// Default: 0.4
    pub fn bm25_weight(mut self, weight: f64) -> Self {
        self.bm25_weight = weight;
        self
    }

    /// Default fusion weight for vector scores (overridable per request).
    ///
    /// Default: 0.6
    pub fn vector_weight(mut self, weight: f64) -> Self {
        self.vector_weight = weight;
        self
    }

    /// Minimum fused score a document needs to survive.
    ///
    /// Default: 0.3
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Default number of documents kept after fusion.
    ///
    /// Default: 5
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Grace the faster retrieval side extends to the slower one before it
    /// is abandoned.
    ///
    /// Default: 250 ms
    pub fn patience(mut self, patience: Duration) -> Self {
        self.patience = patience;
        self
    }

    /// TTL for cached per-side retrieval results.
    ///
    /// Default: 1 hour
    pub fn retrieval_cache_ttl(mut self, ttl: Duration) -> Self {
        self.retrieval_cache_ttl = ttl;
        self
    }

    /// Dollar cost per thousand LLM tokens.
    ///
    /// Default: 0.03
    pub fn llm_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.llm_cost_per_1k_tokens = cost;
        self
    }

    /// Flat dollar cost per retrieval.
    ///
    /// Default: 0.001
    pub fn retrieval_cost_per_query(mut self, cost: f64) -> Self {
        self.retrieval_cost_per_query = cost;
        self
    }

    /// Disable the PII pass (testing only; production keeps it on).
    ///
    /// Default: enabled
    pub fn pii_redaction_enabled(mut self, enabled: bool) -> Self {
        self.pii_redaction_enabled = enabled;
        self
    }

    /// Thresholds for the behaviour detectors.
    pub fn behavior(mut self, behavior: BehaviorConfig) -> Self {
        self.behavior = behavior;
        self
    }

    /// Register an event listener on pipeline activity.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: fairgate_core::EventListener<PipelineEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig {
            bm25_weight: self.bm25_weight,
            vector_weight: self.vector_weight,
            min_score: self.min_score,
            top_k: self.top_k,
            patience: self.patience,
            retrieval_cache_ttl: self.retrieval_cache_ttl,
            llm_cost_per_1k_tokens: self.llm_cost_per_1k_tokens,
            retrieval_cost_per_query: self.retrieval_cost_per_query,
            pii_redaction_enabled: self.pii_redaction_enabled,
            behavior: self.behavior,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
