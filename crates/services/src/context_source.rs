//! Context gathering: learner notes first, web search as supplement.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use tutor_core::Clock;
use tutor_core::model::{Checkpoint, ContextId, ContextOrigin, GatheredContext};

use crate::error::ProviderError;
use crate::providers::{CallPolicy, SearchHit, SearchProvider, with_policy};

const SEARCH_RESULTS_PER_GATHER: usize = 5;

/// How a gather round sources its material. Retries escalate so the same
/// request is never repeated verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherStrategy {
    /// Learner notes only.
    NotesOnly,
    /// Notes first, topped up with a topic search.
    NotesAndSearch,
    /// Search with a broadened query covering every objective.
    BroadSearch,
}

impl GatherStrategy {
    /// The next, wider strategy for a retry round.
    #[must_use]
    pub fn escalate(self) -> Self {
        match self {
            GatherStrategy::NotesOnly => GatherStrategy::NotesAndSearch,
            GatherStrategy::NotesAndSearch | GatherStrategy::BroadSearch => {
                GatherStrategy::BroadSearch
            }
        }
    }

    fn uses_notes(self) -> bool {
        matches!(
            self,
            GatherStrategy::NotesOnly | GatherStrategy::NotesAndSearch
        )
    }

    fn uses_search(self) -> bool {
        !matches!(self, GatherStrategy::NotesOnly)
    }
}

/// Supplies raw study material for a checkpoint attempt.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// The strategy the first gather round should use.
    fn initial_strategy(&self) -> GatherStrategy;

    /// Gather one context under the given strategy.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` when the backing search provider fails after
    /// retries.
    async fn gather(
        &self,
        checkpoint: &Checkpoint,
        strategy: GatherStrategy,
    ) -> Result<GatheredContext, ProviderError>;
}

/// Production source: learner notes take priority, search supplements them.
/// Search results already seen in earlier rounds are dropped.
pub struct NotesAndSearchSource {
    notes: Option<String>,
    search: Arc<dyn SearchProvider>,
    policy: CallPolicy,
    clock: Clock,
    next_id: AtomicU64,
    seen: Mutex<BTreeSet<String>>,
}

impl NotesAndSearchSource {
    #[must_use]
    pub fn new(
        notes: Option<String>,
        search: Arc<dyn SearchProvider>,
        policy: CallPolicy,
        clock: Clock,
    ) -> Self {
        let notes = notes.filter(|n| !n.trim().is_empty());
        Self {
            notes,
            search,
            policy,
            clock,
            next_id: AtomicU64::new(1),
            seen: Mutex::new(BTreeSet::new()),
        }
    }

    fn allocate_id(&self) -> ContextId {
        ContextId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn unseen(&self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hits.into_iter()
            .filter(|hit| {
                let key = hit
                    .url
                    .as_ref()
                    .map_or_else(|| hit.snippet.clone(), |url| url.to_string());
                seen.insert(key)
            })
            .collect()
    }

    fn query_for(checkpoint: &Checkpoint, strategy: GatherStrategy) -> String {
        match strategy {
            GatherStrategy::BroadSearch => {
                let mut query = checkpoint.topic().to_string();
                for objective in checkpoint.objectives() {
                    query.push(' ');
                    query.push_str(objective);
                }
                query
            }
            _ => checkpoint.topic().to_string(),
        }
    }
}

#[async_trait]
impl ContextSource for NotesAndSearchSource {
    fn initial_strategy(&self) -> GatherStrategy {
        if self.notes.is_some() {
            GatherStrategy::NotesOnly
        } else {
            GatherStrategy::NotesAndSearch
        }
    }

    async fn gather(
        &self,
        checkpoint: &Checkpoint,
        strategy: GatherStrategy,
    ) -> Result<GatheredContext, ProviderError> {
        let mut parts: Vec<String> = Vec::new();
        let mut from_notes = false;
        let mut from_search = false;

        if strategy.uses_notes() {
            if let Some(notes) = &self.notes {
                parts.push(notes.clone());
                from_notes = true;
            }
        }

        if strategy.uses_search() {
            let query = Self::query_for(checkpoint, strategy);
            let search = Arc::clone(&self.search);
            let hits = with_policy(self.policy, || {
                let search = Arc::clone(&search);
                let query = query.clone();
                async move { search.search(&query, SEARCH_RESULTS_PER_GATHER).await }
            })
            .await?;

            let fresh = self.unseen(hits);
            debug!(
                topic = checkpoint.topic(),
                ?strategy,
                results = fresh.len(),
                "gathered search results"
            );
            for hit in fresh {
                if hit.title.trim().is_empty() {
                    parts.push(hit.snippet);
                } else {
                    parts.push(format!("{}\n{}", hit.title, hit.snippet));
                }
                from_search = true;
            }
        }

        let origin = match (from_notes, from_search) {
            (true, true) => ContextOrigin::Mixed,
            (true, false) => ContextOrigin::UserNotes,
            _ => ContextOrigin::WebSearch,
        };

        Ok(GatheredContext::new(
            self.allocate_id(),
            origin,
            parts.join("\n\n"),
            self.clock.now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::time::fixed_clock;
    use url::Url;

    struct FixedSearch {
        queries: Mutex<Vec<String>>,
        hits: Vec<SearchHit>,
    }

    impl FixedSearch {
        fn new(hits: Vec<SearchHit>) -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                hits,
            }
        }
    }

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(&self, query: &str, _k: usize) -> Result<Vec<SearchHit>, ProviderError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.clone())
        }
    }

    fn hit(title: &str, url: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            snippet: format!("{title} snippet"),
            url: Some(Url::parse(url).unwrap()),
        }
    }

    fn checkpoint() -> Checkpoint {
        Checkpoint::new(
            "Rust ownership",
            vec!["Understand moves".into(), "Understand borrows".into()],
        )
        .unwrap()
    }

    #[test]
    fn strategies_escalate_and_saturate() {
        assert_eq!(
            GatherStrategy::NotesOnly.escalate(),
            GatherStrategy::NotesAndSearch
        );
        assert_eq!(
            GatherStrategy::NotesAndSearch.escalate(),
            GatherStrategy::BroadSearch
        );
        assert_eq!(
            GatherStrategy::BroadSearch.escalate(),
            GatherStrategy::BroadSearch
        );
    }

    #[tokio::test]
    async fn notes_take_priority_over_search() {
        let search = Arc::new(FixedSearch::new(vec![hit("Guide", "https://a.example/1")]));
        let source = NotesAndSearchSource::new(
            Some("my own ownership notes".into()),
            search,
            CallPolicy::fast(),
            fixed_clock(),
        );

        assert_eq!(source.initial_strategy(), GatherStrategy::NotesOnly);

        let ctx = source
            .gather(&checkpoint(), GatherStrategy::NotesAndSearch)
            .await
            .unwrap();
        assert_eq!(ctx.origin, ContextOrigin::Mixed);
        assert!(ctx.content.starts_with("my own ownership notes"));
        assert!(ctx.content.contains("Guide snippet"));
    }

    #[tokio::test]
    async fn repeated_search_results_are_deduplicated() {
        let search = Arc::new(FixedSearch::new(vec![
            hit("Guide", "https://a.example/1"),
            hit("Book", "https://a.example/2"),
        ]));
        let source =
            NotesAndSearchSource::new(None, search, CallPolicy::fast(), fixed_clock());

        let first = source
            .gather(&checkpoint(), GatherStrategy::NotesAndSearch)
            .await
            .unwrap();
        assert!(!first.is_empty());
        assert_eq!(first.origin, ContextOrigin::WebSearch);

        // Same hits again: nothing new survives the dedup.
        let second = source
            .gather(&checkpoint(), GatherStrategy::NotesAndSearch)
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn broad_search_widens_the_query() {
        let search = Arc::new(FixedSearch::new(vec![]));
        let source = NotesAndSearchSource::new(
            None,
            Arc::clone(&search) as Arc<dyn SearchProvider>,
            CallPolicy::fast(),
            fixed_clock(),
        );

        source
            .gather(&checkpoint(), GatherStrategy::BroadSearch)
            .await
            .unwrap();

        let queries = search.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("Rust ownership"));
        assert!(queries[0].contains("Understand moves"));
        assert!(queries[0].contains("Understand borrows"));
    }
}
