use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use perkly_core::repository::{LookasideCache, RecordStore, StoreError};
use perkly_core::timestamp::format_rfc3339;
use perkly_core::validation::{self, ValidationErrorKind};
use perkly_core::{
    EligibilityResponse, EngineError, EngineResult, Offer, OfferRequest, TransactionRequest,
};
use perkly_shared::models::events::{
    DomainEvent, EligibilityCheckedEvent, OfferUpsertedEvent, TransactionsIngestedEvent,
};
use perkly_store::app_config::Config;
use perkly_store::EventPublisher;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::eligibility::EligibilityEvaluator;
use crate::features::{FeatureFlags, CACHE_ENABLED, EVENT_HOOKS_ENABLED};
use crate::response::assemble;

/// Replaced on every offer write; part of every eligibility cache key.
const OFFERS_GENERATION_KEY: &str = "eligibility:generation:offers";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_batch_size: usize,
    pub evaluation_timeout: Duration,
    pub evaluation_concurrency: usize,
    pub cache_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            evaluation_timeout: Duration::from_secs(5),
            evaluation_concurrency: 8,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_batch_size: config.engine.max_batch_size,
            evaluation_timeout: config.engine.evaluation_timeout(),
            evaluation_concurrency: config.engine.evaluation_concurrency,
            cache_ttl: config.redis.ttl(),
        }
    }
}

/// The engine's caller-facing operations: offer writes, transaction ingestion and
/// eligibility checks. Holds no per-user state between calls.
#[derive(Clone)]
pub struct EligibilityService {
    store: Arc<dyn RecordStore>,
    evaluator: EligibilityEvaluator,
    cache: Option<Arc<dyn LookasideCache>>,
    events: Option<EventPublisher>,
    flags: Arc<FeatureFlags>,
    settings: ServiceSettings,
}

impl EligibilityService {
    pub fn new(store: Arc<dyn RecordStore>, settings: ServiceSettings) -> Self {
        Self {
            evaluator: EligibilityEvaluator::new(store.clone(), settings.evaluation_concurrency),
            store,
            cache: None,
            events: None,
            flags: Arc::new(FeatureFlags::new()),
            settings,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn LookasideCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_flags(mut self, flags: Arc<FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    #[instrument(skip(self, request), fields(offer_id = %request.id))]
    pub async fn create_or_update_offer(&self, request: OfferRequest) -> EngineResult<Offer> {
        let offer = validation::validate_offer(request)?;

        let stored = self
            .store
            .upsert_offer(&offer)
            .await
            .map_err(storage_failure)?;

        info!("Upserted offer {} (active: {})", stored.id, stored.active);
        self.invalidate(vec![OFFERS_GENERATION_KEY.to_string()]).await;
        self.publish(|| {
            DomainEvent::OfferUpserted(OfferUpsertedEvent {
                offer_id: stored.id.clone(),
                merchant_id: stored.merchant_id.clone(),
                active: stored.active,
                timestamp: Utc::now().timestamp(),
            })
        });

        Ok(stored)
    }

    /// Validates the whole batch before anything is written; the store then
    /// inserts all of it or none of it.
    #[instrument(skip(self, requests), fields(batch_size = requests.len()))]
    pub async fn ingest_transactions(&self, requests: Vec<TransactionRequest>) -> EngineResult<u64> {
        if requests.is_empty() {
            return Err(ValidationErrorKind::InvalidBatch
                .at("transactions", "must contain at least one transaction")
                .into());
        }
        if requests.len() > self.settings.max_batch_size {
            return Err(ValidationErrorKind::InvalidBatch
                .at(
                    "transactions",
                    format!("exceeds maximum batch size of {}", self.settings.max_batch_size),
                )
                .into());
        }

        let now = Utc::now();
        let transactions = requests
            .into_iter()
            .enumerate()
            .map(|(i, req)| {
                validation::validate_transaction(req, now).map_err(|e| e.in_batch("transactions", i))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(transactions.len());
        if let Some(dup) = transactions.iter().find(|t| !seen.insert(t.id.as_str())) {
            return Err(EngineError::DuplicateTransaction(dup.id.clone()));
        }

        let inserted = self
            .store
            .insert_transactions(&transactions)
            .await
            .map_err(storage_failure)?;

        info!("Ingested {} transactions", inserted);
        let users: BTreeSet<&str> = transactions.iter().map(|t| t.user_id.as_str()).collect();
        self.invalidate(users.into_iter().map(user_generation_key).collect()).await;
        self.publish(|| {
            DomainEvent::TransactionsIngested(TransactionsIngestedEvent {
                transaction_ids: transactions.iter().map(|t| t.id.clone()).collect(),
                inserted,
                timestamp: Utc::now().timestamp(),
            })
        });

        Ok(inserted)
    }

    pub async fn get_eligible_offers(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<EligibilityResponse> {
        self.get_eligible_offers_within(user_id, now, self.settings.evaluation_timeout)
            .await
    }

    /// Evaluation abandoned after `deadline` returns `DeadlineExceeded` and nothing else.
    /// The deadline covers cache round trips as well as the store.
    #[instrument(skip(self))]
    pub async fn get_eligible_offers_within(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        deadline: Duration,
    ) -> EngineResult<EligibilityResponse> {
        let user_id = validation::sanitize_identifier(user_id);
        validation::validate_identifier(&user_id, "user_id")?;

        let response = tokio::time::timeout(deadline, self.evaluate_cached(&user_id, now))
            .await
            .map_err(|_| {
                warn!("Eligibility evaluation for {} exceeded {:?}", user_id, deadline);
                EngineError::DeadlineExceeded
            })??;

        self.publish(|| {
            DomainEvent::EligibilityChecked(EligibilityCheckedEvent {
                user_id: response.user_id.clone(),
                eligible_offer_ids: response
                    .eligible_offers
                    .iter()
                    .map(|o| o.offer_id.clone())
                    .collect(),
                evaluated_at: now,
                timestamp: Utc::now().timestamp(),
            })
        });

        Ok(response)
    }

    async fn evaluate_cached(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<EligibilityResponse> {
        let key = self.eligibility_key(user_id, now).await;
        if let Some(key) = &key {
            if let Some(hit) = self.cached(key).await {
                return Ok(hit);
            }
        }

        let verdicts = self
            .evaluator
            .evaluate(user_id, now)
            .await
            .map_err(storage_failure)?;

        let response = assemble(user_id, &verdicts);
        debug!(
            "Evaluated {} active offers at {}, {} eligible",
            verdicts.len(),
            format_rfc3339(now),
            response.eligible_offers.len()
        );

        if let Some(key) = &key {
            self.remember(key, &response).await;
        }
        Ok(response)
    }

    fn active_cache(&self) -> Option<&Arc<dyn LookasideCache>> {
        self.cache
            .as_ref()
            .filter(|_| self.flags.is_enabled(CACHE_ENABLED))
    }

    /// `None` when caching is off or a generation cannot be read; the caller then
    /// neither reads nor writes the cache.
    async fn eligibility_key(&self, user_id: &str, now: DateTime<Utc>) -> Option<String> {
        let cache = self.active_cache()?;
        let offers = self.generation(&**cache, OFFERS_GENERATION_KEY).await?;
        let user = self
            .generation(&**cache, &user_generation_key(user_id))
            .await?;
        Some(cache_key(user_id, now, &offers, &user))
    }

    /// Current generation under `key`, starting a fresh one if there is none.
    /// Generations are never reused, so an expired one only costs misses.
    async fn generation(&self, cache: &dyn LookasideCache, key: &str) -> Option<String> {
        match cache.get(key).await {
            Ok(Some(generation)) => Some(generation),
            Ok(None) => {
                let generation = Uuid::new_v4().to_string();
                match cache.set(key, &generation, self.generation_ttl()).await {
                    Ok(()) => Some(generation),
                    Err(e) => {
                        warn!("Cache write failed for {}: {}", key, e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Moves every generation in `keys` on, orphaning the entries cached under it.
    /// Runs whenever a cache is attached, whatever the cache flag says.
    async fn invalidate(&self, keys: Vec<String>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let ttl = self.generation_ttl();

        let bumps = join_all(keys.iter().map(|key| async move {
            let generation = Uuid::new_v4().to_string();
            if let Err(e) = cache.set(key, &generation, ttl).await {
                warn!("Could not invalidate cached eligibility under {}: {}", key, e);
            }
        }));

        if tokio::time::timeout(self.settings.evaluation_timeout, bumps)
            .await
            .is_err()
        {
            warn!("Cache invalidation of {} keys timed out", keys.len());
        }
    }

    fn generation_ttl(&self) -> Duration {
        self.settings.cache_ttl.saturating_mul(2)
    }

    async fn cached(&self, key: &str) -> Option<EligibilityResponse> {
        let cache = self.active_cache()?;
        match cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(response) => {
                    debug!("Cache hit for {}", key);
                    Some(response)
                }
                Err(e) => {
                    warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn remember(&self, key: &str, response: &EligibilityResponse) {
        let Some(cache) = self.active_cache() else {
            return;
        };
        let raw = match serde_json::to_string(response) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize eligibility for cache: {}", e);
                return;
            }
        };
        if let Err(e) = cache.set(key, &raw, self.settings.cache_ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    fn publish(&self, event: impl FnOnce() -> DomainEvent) {
        if let Some(events) = &self.events {
            if self.flags.is_enabled(EVENT_HOOKS_ENABLED) {
                events.publish(event());
            }
        }
    }
}

fn user_generation_key(user_id: &str) -> String {
    format!("eligibility:generation:user:{}", user_id)
}

fn cache_key(
    user_id: &str,
    now: DateTime<Utc>,
    offers_generation: &str,
    user_generation: &str,
) -> String {
    format!(
        "eligibility:{}:{}:{}:{}",
        user_id,
        now.timestamp(),
        offers_generation,
        user_generation
    )
}

fn storage_failure(err: StoreError) -> EngineError {
    if !matches!(err, StoreError::Duplicate(_)) {
        error!("Record store failure: {}", err);
    }
    err.into()
}
