use crate::llm_adapter::EnrichmentChain;
use crate::resolver::ResolvedContent;
use crate::types::{CandidateArticle, EnrichedArticle, EnrichmentError, EnrichmentOutcome};
use crate::utils::text;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    Raw,
    AiRequested,
    AiSuccess,
    AiFailed,
    Final,
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub summary_fallback_chars: usize,
    pub polish_content: bool,
    pub target_language: Option<String>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            summary_fallback_chars: 200,
            polish_content: true,
            target_language: None,
        }
    }
}

struct AiText {
    summary: String,
    content: String,
}

/// Produces the summary and content to persist for each candidate.
///
/// AI output is used only when every configured step succeeds; otherwise the
/// item gets a truncated summary and its resolved text verbatim.
pub struct EnrichmentEngine {
    chain: Arc<EnrichmentChain>,
    settings: EnrichmentSettings,
}

impl EnrichmentEngine {
    pub fn new(chain: Arc<EnrichmentChain>, settings: EnrichmentSettings) -> Self {
        Self { chain, settings }
    }

    pub async fn enrich(&self, candidate: &CandidateArticle, resolved: &ResolvedContent) -> EnrichedArticle {
        let mut state = EnrichmentState::Raw;

        let text = if resolved.text.trim().is_empty() {
            candidate.title.trim()
        } else {
            resolved.text.as_str()
        };

        trace_state(&candidate.url, &mut state, EnrichmentState::AiRequested);
        let (summary, content, outcome) = match self.ai_text(text).await {
            Ok(ai) => {
                trace_state(&candidate.url, &mut state, EnrichmentState::AiSuccess);
                (ai.summary, ai.content, EnrichmentOutcome::Ai)
            }
            Err(e) => {
                if e.is_disabled() {
                    debug!(url = %candidate.url, "AI disabled, using fallback summary");
                } else {
                    warn!(url = %candidate.url, error = %e, "AI enrichment failed, using fallback summary");
                }
                trace_state(&candidate.url, &mut state, EnrichmentState::AiFailed);
                (
                    text::fallback_summary(text, self.settings.summary_fallback_chars),
                    text.to_string(),
                    EnrichmentOutcome::Fallback,
                )
            }
        };
        trace_state(&candidate.url, &mut state, EnrichmentState::Final);

        EnrichedArticle {
            article: candidate.clone(),
            summary,
            content,
            image_url: candidate.image_url.clone(),
            outcome,
        }
    }

    async fn ai_text(&self, text: &str) -> Result<AiText, EnrichmentError> {
        if !self.chain.is_enabled() {
            return Err(EnrichmentError::Disabled);
        }

        let mut summary = self.chain.summarize(text).await?;
        let mut content = if self.settings.polish_content {
            self.chain.polish(text).await?
        } else {
            text.to_string()
        };

        if let Some(language) = self.settings.target_language.as_deref() {
            summary = self.chain.translate(&summary, language).await?;
            content = self.chain.translate(&content, language).await?;
        }

        if summary.trim().is_empty() || content.trim().is_empty() {
            return Err(EnrichmentError::EmptyResponse);
        }
        Ok(AiText { summary, content })
    }
}

fn trace_state(url: &str, state: &mut EnrichmentState, next: EnrichmentState) {
    debug!(url = %url, from = ?state, to = ?next, "Enrichment state");
    *state = next;
}
