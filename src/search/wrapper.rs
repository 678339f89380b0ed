//! Per-line pagination with retry, backoff and key rotation

use super::backoff::{Backoff, RetryPolicy};
use crate::config::SearchSettings;
use crate::credentials::CredentialPool;
use crate::providers::{FailureKind, Provider, ProviderError};
use crate::query::{InputLine, Query};
use crate::results::{now_millis, ResultPage};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pagination limits per input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Stop once the next start index would pass this many results
    pub num_results: u64,
    /// Pages fetched per line, not counting retries
    pub max_requests: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::from(&SearchSettings::default())
    }
}

impl From<&SearchSettings> for SearchLimits {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            num_results: settings.num_results,
            max_requests: settings.max_requests,
        }
    }
}

/// Drives one provider through the pages of each input line.
///
/// Fatal failures end the line with a fatal page. Quota failures mark the
/// current key and move to the next one if there is one. Everything else is
/// retried on the same key after an exponentially growing wait, switching
/// keys after too many consecutive waits.
pub struct SearchWrapper {
    provider: Arc<dyn Provider>,
    pool: Option<CredentialPool>,
    policy: RetryPolicy,
    limits: SearchLimits,
    clock: Clock,
}

/// Source of the millisecond timestamps recorded on pages
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

impl SearchWrapper {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            pool: None,
            policy: RetryPolicy::default(),
            limits: SearchLimits::default(),
            clock: Arc::new(now_millis),
        }
    }

    /// Sign requests with keys from `pool`
    pub fn with_pool(mut self, pool: CredentialPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the wall clock used for page timestamps
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn pool(&self) -> Option<&CredentialPool> {
        self.pool.as_ref()
    }

    /// Fetch every page of one input line, in order.
    ///
    /// The last page is fatal if the line hit a fatal failure; pages before
    /// it are kept.
    pub async fn search(&mut self, line: &InputLine) -> Vec<ResultPage> {
        info!("Query [{}]: {}", line.label, line.query_text);

        let line_start = self.now();
        let mut pages = Vec::new();
        let mut start_index = 1u64;
        let mut requests = 0u32;
        let mut query = Some(line.to_query());

        while let Some(current) = query.take() {
            let mut page = self.fetch_page(current, line_start).await;
            requests += 1;

            if page.fatal_error() {
                pages.push(page);
                break;
            }

            start_index += page.len() as u64;
            let next = page.take_next_query();
            debug!(
                label = %line.label,
                items = page.len(),
                start_index,
                requests,
                "page fetched"
            );
            pages.push(page);

            if start_index <= self.limits.num_results && requests < self.limits.max_requests {
                query = next;
            }
        }

        pages
    }

    /// Fetch one page, retrying until it succeeds or fails fatally
    async fn fetch_page(&mut self, query: Query, line_start: i64) -> ResultPage {
        let mut backoff = Backoff::new(self.policy);
        let mut attempts = 0u32;
        let started = self.now();

        loop {
            let signed = self.sign(&query);
            attempts += 1;

            let result = self.provider.fetch(&signed).await;

            let err = match result {
                Ok(page) => {
                    self.mark_quota(true);
                    return page.with_timing(started, self.now());
                }
                Err(err) => err,
            };

            if err.kind() == FailureKind::Fatal {
                error!(
                    label = %signed.label(),
                    provider = %self.provider.name(),
                    error = %err,
                    "giving up on query"
                );
                return ResultPage::fatal(&signed, line_start, self.now());
            }

            if let Some(max) = self.policy.max_attempts_per_page {
                if attempts >= max {
                    error!(
                        label = %signed.label(),
                        provider = %self.provider.name(),
                        attempts,
                        error = %err,
                        "retry limit reached, giving up on query"
                    );
                    return ResultPage::fatal(&signed, line_start, self.now());
                }
            }

            // At most one key change per failed attempt
            let quota = err.kind() == FailureKind::Quota;
            self.mark_quota(!quota);
            if (quota || backoff.should_rotate()) && self.rotate(signed.label()) {
                backoff.reset();
                continue;
            }

            let wait = backoff.advance();
            self.log_retry(&signed, &err, wait.as_secs(), backoff.consecutive_waits());
            tokio::time::sleep(wait).await;
        }
    }

    /// Attach the current key if the provider needs one
    fn sign(&self, query: &Query) -> Query {
        match &self.pool {
            Some(pool) if self.provider.is_keyed() => query.clone().with_key(pool.current()),
            _ => query.clone(),
        }
    }

    fn mark_quota(&mut self, has_quota: bool) {
        if let Some(pool) = self.pool.as_mut() {
            pool.mark_quota(has_quota);
        }
    }

    /// Move to the next key. Returns whether that key is believed to have
    /// quota; `false` when there is nothing to rotate to.
    fn rotate(&mut self, label: &str) -> bool {
        let pool = match self.pool.as_mut() {
            Some(pool) if pool.can_rotate() => pool,
            _ => return false,
        };
        let from = pool.index();
        let to = pool.rotate();
        let has_quota = pool.current_has_quota();
        info!(
            label = %label,
            from_key = from,
            to_key = to,
            key = %pool.fingerprint(),
            has_quota,
            "switching registration key"
        );
        has_quota
    }

    fn log_retry(&self, query: &Query, err: &ProviderError, wait_secs: u64, consecutive_waits: u32) {
        let (key_index, key) = match &self.pool {
            Some(pool) => (Some(pool.index()), Some(pool.fingerprint())),
            None => (None, None),
        };
        warn!(
            label = %query.label(),
            provider = %self.provider.name(),
            key_index = ?key_index,
            key = ?key,
            wait_secs,
            consecutive_waits,
            error = %err,
            "fetch failed, retrying"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderAbout;
    use crate::results::ResultItem;
    use async_trait::async_trait;
    use num_bigint::BigUint;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    type Reply = Box<dyn Fn(&Query) -> Result<ResultPage, ProviderError> + Send + Sync>;

    /// Provider answering from a script and recording the keys it saw
    struct Scripted {
        keyed: bool,
        replies: Mutex<VecDeque<Reply>>,
        seen_keys: Mutex<Vec<Option<String>>>,
    }

    impl Scripted {
        fn new(keyed: bool, replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                keyed,
                replies: Mutex::new(replies.into()),
                seen_keys: Mutex::new(Vec::new()),
            })
        }

        fn seen_keys(&self) -> Vec<Option<String>> {
            self.seen_keys.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn about(&self) -> ProviderAbout {
            if self.keyed {
                ProviderAbout::new().keyed("key")
            } else {
                ProviderAbout::new()
            }
        }

        async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
            self.seen_keys
                .lock()
                .unwrap()
                .push(query.key().map(String::from));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted");
            reply(query)
        }
    }

    fn items(page: u32, n: u32) -> Vec<ResultItem> {
        (0..n)
            .map(|i| ResultItem::new(format!("https://example.com/{page}/{i}"), format!("r{page}.{i}")))
            .collect()
    }

    /// A page of `n` items, with a next query unless `last`
    fn page(n: u32, last: bool) -> Reply {
        Box::new(move |query: &Query| {
            let next = (!last).then(|| query.next_page(query.start_index() + n as u64));
            Ok(ResultPage::for_query(query)
                .with_total_hits(1000u32)
                .with_items(items(query.start_index() as u32, n))
                .with_next_query(next))
        })
    }

    fn fail(err: ProviderError) -> Reply {
        Box::new(move |_: &Query| Err(err.clone()))
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_line() {
        let provider = Scripted::new(
            false,
            vec![Box::new(|query: &Query| {
                Ok(ResultPage::for_query(query)
                    .with_total_hits(42u32)
                    .with_items(items(1, 3)))
            })],
        );
        let mut wrapper = SearchWrapper::new(provider.clone());

        let pages = wrapper.search(&InputLine::parse("0001: hello world")).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].label(), "0001");
        assert_eq!(pages[0].query_text(), "hello world");
        assert_eq!(pages[0].start_index(), 1);
        assert_eq!(pages[0].total_hits(), &BigUint::from(42u32));
        assert_eq!(pages[0].len(), 3);
        assert!(!pages[0].fatal_error());
        assert_eq!(provider.seen_keys(), [None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_requested_count() {
        let provider = Scripted::new(false, vec![page(4, false), page(4, false), page(4, false)]);
        let mut wrapper = SearchWrapper::new(provider).with_limits(SearchLimits {
            num_results: 10,
            max_requests: 10,
        });

        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        // 1 -> 5 -> 9 -> 13, which passes 10
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].start_index(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_max_requests() {
        let provider = Scripted::new(false, vec![page(1, false), page(1, false)]);
        let mut wrapper = SearchWrapper::new(provider).with_limits(SearchLimits {
            num_results: 100,
            max_requests: 2,
        });

        let pages = wrapper.search(&InputLine::parse("a: b")).await;
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_on_later_page_keeps_earlier_pages() {
        let provider = Scripted::new(
            false,
            vec![
                page(2, false),
                page(2, false),
                fail(ProviderError::fatal("bad request")),
            ],
        );
        let mut wrapper = SearchWrapper::new(provider);

        let pages = wrapper.search(&InputLine::parse("0009: rust")).await;

        assert_eq!(pages.len(), 3);
        let fatal = &pages[2];
        assert!(fatal.fatal_error());
        assert!(fatal.is_empty());
        assert_eq!(fatal.total_hits(), &BigUint::default());
        assert_eq!(fatal.start_index(), 5);
        assert!(fatal.next_query().is_none());
        assert_eq!(pages[0].len() + pages[1].len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_back_off() {
        let provider = Scripted::new(
            false,
            vec![
                fail(ProviderError::transient("timeout")),
                fail(ProviderError::transient("timeout")),
                fail(ProviderError::transient("timeout")),
                page(1, true),
            ],
        );
        let mut wrapper = SearchWrapper::new(provider);

        let started = Instant::now();
        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages.len(), 1);
        assert!(!pages[0].fatal_error());
        assert_eq!(started.elapsed(), Duration::from_secs(5 + 10 + 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_on_single_key_waits_and_retries() {
        let mut replies: Vec<Reply> = (0..12)
            .map(|_| fail(ProviderError::quota("limit")))
            .collect();
        replies.push(page(2, true));
        let provider = Scripted::new(true, replies);
        let pool = CredentialPool::with_start_index(keys(1), 0).unwrap();
        let mut wrapper = SearchWrapper::new(provider.clone()).with_pool(pool);

        let started = Instant::now();
        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages.len(), 1);
        assert!(!pages[0].fatal_error());
        assert_eq!(pages[0].len(), 2);
        assert!(provider.seen_keys().iter().all(|k| k.as_deref() == Some("key0")));
        // 5 + 10 + ... + 1280, then three waits at the ceiling
        let expected: u64 = 5 * (1 << 9) - 5 + 3 * 1800;
        assert_eq!(started.elapsed(), Duration::from_secs(expected));
        assert!(wrapper.pool().unwrap().current_has_quota());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_rotates_without_waiting() {
        let provider = Scripted::new(
            true,
            vec![fail(ProviderError::quota("limit")), page(1, true)],
        );
        let pool = CredentialPool::with_start_index(keys(3), 2).unwrap();
        let mut wrapper = SearchWrapper::new(provider.clone()).with_pool(pool);

        let started = Instant::now();
        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(
            provider.seen_keys(),
            [Some("key2".to_string()), Some("key0".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_keys_exhausted_falls_back_to_waiting() {
        let provider = Scripted::new(
            true,
            vec![
                fail(ProviderError::quota("limit")),
                fail(ProviderError::quota("limit")),
                page(1, true),
            ],
        );
        let pool = CredentialPool::with_start_index(keys(2), 0).unwrap();
        let mut wrapper = SearchWrapper::new(provider.clone()).with_pool(pool);

        let started = Instant::now();
        wrapper.search(&InputLine::parse("a: b")).await;

        // key0 exhausted -> key1 (fresh, no wait); key1 exhausted -> key0 (known
        // exhausted), so wait once before retrying with key0
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(
            provider.seen_keys(),
            [
                Some("key0".to_string()),
                Some("key1".to_string()),
                Some("key0".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_waits_forces_rotation() {
        let policy = RetryPolicy {
            max_num_waits: 2,
            ..RetryPolicy::default()
        };
        let provider = Scripted::new(
            true,
            vec![
                fail(ProviderError::transient("503")),
                fail(ProviderError::transient("503")),
                fail(ProviderError::transient("503")),
                page(1, true),
            ],
        );
        let pool = CredentialPool::with_start_index(keys(2), 0).unwrap();
        let mut wrapper = SearchWrapper::new(provider.clone())
            .with_pool(pool)
            .with_policy(policy);

        let started = Instant::now();
        wrapper.search(&InputLine::parse("a: b")).await;

        // two waits on key0, then the next failure switches to key1 without waiting
        assert_eq!(started.elapsed(), Duration::from_secs(5 + 10));
        assert_eq!(
            provider.seen_keys(),
            [
                Some("key0".to_string()),
                Some("key0".to_string()),
                Some("key0".to_string()),
                Some("key1".to_string())
            ]
        );
    }

    /// key1 never has quota; key0 recovers on its `recovers_on`-th call
    struct OneKeyRecovers {
        recovers_on: usize,
        seen_keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for OneKeyRecovers {
        fn name(&self) -> &str {
            "one-key-recovers"
        }

        fn about(&self) -> ProviderAbout {
            ProviderAbout::new().keyed("key")
        }

        async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
            let key = query.key().unwrap_or_default().to_string();
            let mut seen = self.seen_keys.lock().unwrap();
            seen.push(key.clone());
            if seen.len() > 100 {
                return Err(ProviderError::fatal("too many calls"));
            }
            let key0_calls = seen.iter().filter(|k| *k == "key0").count();
            if key == "key0" && key0_calls >= self.recovers_on {
                Ok(ResultPage::for_query(query).with_items(items(1, 1)))
            } else {
                Err(ProviderError::quota("limit"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_key_pair_keeps_alternating_past_wait_limit() {
        let provider = Arc::new(OneKeyRecovers {
            recovers_on: 12,
            seen_keys: Mutex::new(Vec::new()),
        });
        let pool = CredentialPool::with_start_index(keys(2), 0).unwrap();
        let mut wrapper = SearchWrapper::new(provider.clone()).with_pool(pool);

        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages.len(), 1);
        assert!(!pages[0].fatal_error());
        let seen = provider.seen_keys.lock().unwrap().clone();
        assert_eq!(seen.len(), 23);
        for pair in seen.windows(2) {
            assert_ne!(pair[0], pair[1], "same key tried twice in a row: {seen:?}");
        }
        assert_eq!(wrapper.pool().unwrap().index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_timing_covers_retries() {
        let provider = Scripted::new(
            false,
            vec![
                fail(ProviderError::transient("timeout")),
                fail(ProviderError::transient("timeout")),
                page(1, true),
            ],
        );
        let origin = Instant::now();
        let mut wrapper =
            SearchWrapper::new(provider).with_clock(move || origin.elapsed().as_millis() as i64);

        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages[0].start_time_millis(), 0);
        assert_eq!(pages[0].elapsed_millis(), (5 + 10) * 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_ceiling_turns_page_fatal() {
        let policy = RetryPolicy {
            max_attempts_per_page: Some(3),
            ..RetryPolicy::default()
        };
        let provider = Scripted::new(
            false,
            (0..3).map(|_| fail(ProviderError::transient("down"))).collect(),
        );
        let mut wrapper = SearchWrapper::new(provider).with_policy(policy);

        let pages = wrapper.search(&InputLine::parse("a: b")).await;

        assert_eq!(pages.len(), 1);
        assert!(pages[0].fatal_error());
    }
}
