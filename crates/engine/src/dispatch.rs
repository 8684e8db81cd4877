// crates/engine/src/dispatch.rs
//! The dispatcher: orchestrates one user input end to end.
//!
//! The knowledge base is read-mostly behind a `std::sync::RwLock`; only
//! the learning path takes the write lock, and no lock is held while a
//! template evaluates. Each session is locked for the duration of its
//! dispatch, which keeps per-session history linearizable.

use std::sync::{Arc, Mutex, RwLock};

use parlance_core::{Category, KnowledgeBase};
use parlance_match::{find_match, CacheConfig, MatchCache, MatchCacheStats};
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::eval::Evaluator;
use crate::learn::{LearnedCategory, LearnedSink};
use crate::session::{Session, SessionConfig, SessionRegistry};
use crate::sraix::ServiceRegistry;

/// Property consulted when no category matches.
const FALLBACK_PROPERTY: &str = "default-response";

/// The interpreter: knowledge base, match cache, sessions, service
/// adapters, and the learned-category sink.
pub struct Interpreter {
    kb: RwLock<KnowledgeBase>,
    cache: MatchCache,
    sessions: SessionRegistry,
    services: ServiceRegistry,
    learned_sink: RwLock<Option<Box<dyn LearnedSink>>>,
    session_config: SessionConfig,
}

impl Interpreter {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self::with_config(kb, CacheConfig::default(), SessionConfig::default())
    }

    pub fn with_config(
        kb: KnowledgeBase,
        cache_config: CacheConfig,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            kb: RwLock::new(kb),
            cache: MatchCache::new(cache_config),
            sessions: SessionRegistry::new(),
            services: ServiceRegistry::new(),
            learned_sink: RwLock::new(None),
            session_config,
        }
    }

    // ── Wiring ─────────────────────────────────────────────────────────

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Install the durable store `<learnf>` appends to.
    pub fn set_learned_sink(&self, sink: Box<dyn LearnedSink>) {
        *self.learned_sink.write().unwrap() = Some(sink);
    }

    pub fn cache_stats(&self) -> MatchCacheStats {
        self.cache.stats()
    }

    /// Shared-read access to the knowledge base.
    pub fn with_kb<R>(&self, f: impl FnOnce(&KnowledgeBase) -> R) -> R {
        f(&self.kb.read().unwrap())
    }

    /// Exclusive access for load-time mutation (directory loaders, learned
    /// replay). The match cache picks up the new content hash on the next
    /// match.
    pub fn with_kb_mut<R>(&self, f: impl FnOnce(&mut KnowledgeBase) -> R) -> R {
        f(&mut self.kb.write().unwrap())
    }

    pub fn category_count(&self) -> usize {
        self.kb.read().unwrap().len()
    }

    // ── Sessions ───────────────────────────────────────────────────────

    /// Create (or fetch) the session registered under `id`.
    pub fn create_session(&self, id: &str) -> Arc<Mutex<Session>> {
        self.sessions.create_with_config(id, self.session_config)
    }

    // ── Dispatch ───────────────────────────────────────────────────────

    /// Process one user input against a session: record the request,
    /// match, evaluate, record the response. Content-level failures never
    /// escape; the only error is an unknown session id.
    pub fn process(&self, input: &str, session_id: &str) -> Result<String, DispatchError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| DispatchError::UnknownSession(session_id.to_string()))?;
        let mut session = session.lock().unwrap();
        session.add_request(input);
        let response = self.respond(input, &mut session, 0);
        session.add_response(&response);
        session.add_that(&response);
        Ok(response)
    }

    /// Match and evaluate one input. Depth 0 is the dispatcher's call;
    /// `<srai>` re-enters at depth+1, where a failed match yields ""
    /// instead of the configured fallback.
    pub(crate) fn respond(&self, input: &str, session: &mut Session, depth: u32) -> String {
        let topic = session.topic.clone();
        let that = session.latest_that().to_string();

        let matched = {
            let kb = self.kb.read().unwrap();
            find_match(&kb, &self.cache, input, &topic, &that, 1)
                .map(|m| (kb.categories()[m.category_index].template.clone(), m.bindings))
        };

        let response = match matched {
            Some((template, bindings)) => {
                Evaluator::new(self).evaluate(&template, &bindings, session, input, depth)
            }
            None if depth == 0 => {
                debug!(%input, "no category matched; using fallback");
                self.with_kb(|kb| {
                    kb.property(FALLBACK_PROPERTY)
                        .or_else(|| kb.pdefault(FALLBACK_PROPERTY))
                        .unwrap_or("")
                        .to_string()
                })
            }
            None => String::new(),
        };

        if depth == 0 {
            response.trim_end().to_string()
        } else {
            response
        }
    }

    // ── Learning ───────────────────────────────────────────────────────

    /// Insert a learned category into the live knowledge base, invalidate
    /// the match cache, and optionally persist the record.
    pub(crate) fn insert_learned(&self, category: Category, persist: Option<&LearnedCategory>) {
        let new_hash = {
            let mut kb = self.kb.write().unwrap();
            kb.add_category(category);
            kb.content_hash().to_string()
        };
        self.cache.invalidate_knowledge_base(&new_hash);

        if let Some(record) = persist {
            match self.learned_sink.read().unwrap().as_ref() {
                Some(sink) => {
                    if let Err(err) = sink.append(record) {
                        warn!(%err, "failed to persist learned category");
                    }
                }
                None => debug!("learnf with no learned-category sink configured"),
            }
        }
    }

    /// Re-insert a persisted learned category (startup replay).
    pub fn replay_learned(&self, record: &LearnedCategory) {
        let template = parlance_core::parse_template(&record.template);
        match Category::new(&record.pattern, &record.that, &record.topic, template) {
            Ok(category) => self.insert_learned(category, None),
            Err(err) => warn!(%err, pattern = %record.pattern, "skipping invalid learned record"),
        }
    }
}
