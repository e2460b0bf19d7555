use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CircuitBreaker, ContextBuilder, RankingContext};
use crate::application::{CompletionRequest, LlmConfig, LlmProvider};
use crate::domain::{
    DomainError, Product, RecommendationResult, RecommendationType, ShopperContext,
};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// One entry of the `rankings` array returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRankEntry {
    pub product_id: i64,
    pub rank: i64,
    pub reason: String,
}

/// Best-effort LLM re-ordering of similarity candidates.
///
/// Every failure path (disabled, provider unavailable, open circuit, transport
/// error, unparseable answer) returns the incoming order truncated to `limit`.
pub struct LlmReRanker {
    provider: Option<Arc<dyn LlmProvider>>,
    breaker: Arc<CircuitBreaker>,
    context: ContextBuilder,
    config: LlmConfig,
}

impl LlmReRanker {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        breaker: Arc<CircuitBreaker>,
        config: LlmConfig,
    ) -> Self {
        Self {
            provider,
            breaker,
            context: ContextBuilder::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.active_provider().is_some()
    }

    fn active_provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.provider.as_ref().filter(|p| p.is_available())
    }

    fn breaker_key(provider: &dyn LlmProvider) -> String {
        format!("{}_api", provider.provider_name())
    }

    pub async fn rerank(
        &self,
        source: &Product,
        candidates: Vec<RecommendationResult>,
        rec_type: RecommendationType,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Vec<RecommendationResult> {
        let mut fallback = candidates.clone();
        fallback.truncate(limit);

        if !self.config.enabled {
            debug!("LLM re-ranking disabled, keeping similarity order");
            return fallback;
        }

        let Some(provider) = self.active_provider() else {
            debug!("No available LLM provider, keeping similarity order");
            return fallback;
        };

        let service = Self::breaker_key(provider.as_ref());
        if self.breaker.is_open(&service).await {
            return fallback;
        }

        let mut pool = candidates;
        pool.truncate(self.config.candidate_count.max(1));
        if pool.is_empty() {
            return Vec::new();
        }

        let ranking_context = self.context.build(shopper);
        let request = CompletionRequest {
            prompt: self.build_prompt(source, &pool, rec_type, &ranking_context),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            model: self.config.model.clone(),
        };

        info!(
            provider = provider.provider_name(),
            model = provider.model(),
            candidates = pool.len(),
            store_id,
            "Sending candidates for LLM re-ranking"
        );

        let completion = match provider.send_prompt(&request).await {
            Ok(completion) => {
                self.breaker.reset(&service).await;
                completion
            }
            Err(e) => {
                warn!("LLM re-ranking failed, keeping similarity order: {}", e);
                self.breaker.record_failure(&service).await;
                return fallback;
            }
        };

        let rankings = match parse_rankings(&completion.text) {
            Ok(rankings) => rankings,
            Err(e) => {
                warn!("Unusable LLM ranking response, keeping similarity order: {}", e);
                debug!("Response was: {}", completion.text.chars().take(500).collect::<String>());
                return fallback;
            }
        };

        let cost = provider.estimate_cost(&completion);
        let model = if completion.model.is_empty() {
            provider.model().to_string()
        } else {
            completion.model.clone()
        };

        let mut ranked = apply_rankings(pool, &rankings);
        for result in &mut ranked {
            result.metadata.insert("llm_model".into(), Value::from(model.clone()));
            result.metadata.insert("llm_cost".into(), Value::from(cost));
        }
        ranked.truncate(limit);

        info!(
            ranked = ranked.len(),
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            estimated_cost = cost,
            "LLM re-ranking applied"
        );
        ranked
    }

    pub fn build_prompt(
        &self,
        source: &Product,
        candidates: &[RecommendationResult],
        rec_type: RecommendationType,
        ranking_context: &RankingContext,
    ) -> String {
        let candidate_list: Vec<Value> = candidates.iter().map(|c| self.context.candidate(c)).collect();
        let candidate_json =
            serde_json::to_string_pretty(&candidate_list).unwrap_or_else(|_| "[]".to_string());

        format!(
            r#"You are an intelligent product re-ranking assistant for an e-commerce store. Your task is to re-order a list of recommended products to maximize relevance and purchase likelihood.

**Context:**
- Source Product: {name} (${price:.2})
- Category: {category}
- Customer Profile: {segment}
- Current Season/Event: {season} season, {month}{holiday}
- Time of Day: {time_of_day}
- Recommendation Type: {rec_type}

**Candidate Products to Re-rank:**
{candidates}

**Re-ranking Criteria (in priority order):**
1. **Relevance**: How well does this product complement or relate to the source product?
2. **Purchase Intent**: Based on the customer profile, how likely is a purchase?
3. **Price Compatibility**: Is the price range appropriate for this customer?
4. **Contextual Fit**: Does this product make sense for the current season/event?
5. **Diversity**: Avoid showing too many similar items consecutively.
6. **Value**: Consider discounts and special offers that may increase conversion.

**Output Format:**
Return ONLY valid JSON with a "rankings" array ordering the product IDs, with reasoning. Do not include any other text.

Example format:
{{
  "rankings": [
    {{"product_id": 123, "rank": 1, "reason": "Perfect complement, similar price point, seasonal fit"}},
    {{"product_id": 456, "rank": 2, "reason": "Frequently bought together, good value"}}
  ]
}}

Re-rank the products now:"#,
            name = source.name,
            price = source.final_price(),
            category = source.primary_category_name(),
            segment = ranking_context.customer_segment,
            season = ranking_context.season,
            month = ranking_context.month,
            holiday = if ranking_context.is_holiday_season { " (holiday season)" } else { "" },
            time_of_day = ranking_context.time_of_day,
            rec_type = rec_type,
            candidates = candidate_json,
        )
    }
}

/// Extract the `rankings` array from a model answer, tolerating code fences.
///
/// Entries without a numeric `product_id` and `rank` are skipped; an answer
/// with no usable entry is an error.
pub fn parse_rankings(text: &str) -> Result<Vec<LlmRankEntry>, DomainError> {
    let body = match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
    .trim();

    let data: Value = serde_json::from_str(body)
        .map_err(|e| DomainError::parse(format!("Invalid JSON response: {}", e)))?;

    let rankings = data
        .get("rankings")
        .and_then(Value::as_array)
        .ok_or_else(|| DomainError::parse("Response missing rankings array"))?;

    let entries: Vec<LlmRankEntry> = rankings
        .iter()
        .filter_map(|entry| {
            Some(LlmRankEntry {
                product_id: as_i64(entry.get("product_id")?)?,
                rank: as_i64(entry.get("rank")?)?,
                reason: entry
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(DomainError::parse("Rankings array has no usable entries"));
    }
    Ok(entries)
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Reorder by ascending rank; unranked candidates follow in input order.
pub fn apply_rankings(
    candidates: Vec<RecommendationResult>,
    rankings: &[LlmRankEntry],
) -> Vec<RecommendationResult> {
    let mut by_product: HashMap<i64, &LlmRankEntry> = HashMap::new();
    for entry in rankings {
        by_product.entry(entry.product_id).or_insert(entry);
    }

    let (mut ranked, unranked): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| by_product.contains_key(&c.product_id()));

    for result in &mut ranked {
        if let Some(entry) = by_product.get(&result.product_id()) {
            result.metadata.insert("llm_rank".into(), Value::from(entry.rank));
            result.metadata.insert("llm_reason".into(), Value::from(entry.reason.clone()));
        }
    }
    ranked.sort_by_key(|r| by_product.get(&r.product_id()).map(|e| e.rank).unwrap_or(i64::MAX));

    ranked.extend(unranked);
    ranked
}
