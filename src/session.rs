//! Per-document edit session.
//!
//! One [`PdfEditSession`] owns everything a document's search/replace
//! lifecycle needs: the current byte buffer, a revision counter, the last
//! find results, and the ephemeral highlight state with its auto-clear
//! timer. Nothing is module-level, so concurrent sessions over different
//! documents are safe by construction, and `&mut self` receivers serialize
//! callers on one session.
//!
//! Mutations run as a transaction: `Idle → Loading → Mutating →
//! {Committed, Failed}`. The current bytes are parsed into a mutable
//! document, the mutator runs against it, and only a successful, dirty
//! mutation re-serializes the buffer and bumps the revision. Any error
//! discards the in-progress document and leaves the previous buffer
//! unchanged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::geometry::{self, Rect, TextMatch};
use crate::layout::{self, LayoutConfig};
use crate::matcher::{Matcher, SearchOptions};
use crate::provider::{self, GlyphRunProvider, LopdfRunProvider};
use crate::replace::{
    self, canvas, BulkReplaceOutcome, ReplaceOutcome, SkipReason, MIN_SCALE_BULK,
    MIN_SCALE_REFINED,
};

/// Options for a bulk replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOptions {
    #[serde(flatten)]
    pub search: SearchOptions,
    pub replacement: String,
}

/// Default lifetime of the current-match highlight.
const HIGHLIGHT_TTL: Duration = Duration::from_millis(1500);

struct FindCache {
    revision: u64,
    options: SearchOptions,
    matches: Vec<TextMatch>,
}

/// Search-and-replace engine for one open document.
pub struct PdfEditSession {
    bytes: Vec<u8>,
    revision: u64,
    provider: Box<dyn GlyphRunProvider>,
    config: LayoutConfig,
    find_cache: Option<FindCache>,
    highlight_rect: Arc<Mutex<Option<Rect>>>,
    highlight_timer: Option<JoinHandle<()>>,
    highlight_ttl: Duration,
}

impl PdfEditSession {
    /// Open a session over an in-memory document buffer with the default
    /// lopdf-backed glyph run provider.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::with_provider(bytes, Box::new(LopdfRunProvider::new()), LayoutConfig::default())
    }

    /// Open a session with a custom run provider and layout heuristics.
    pub fn with_provider(
        bytes: Vec<u8>,
        provider: Box<dyn GlyphRunProvider>,
        config: LayoutConfig,
    ) -> Self {
        Self {
            bytes,
            revision: 0,
            provider,
            config,
            find_cache: None,
            highlight_rect: Arc::new(Mutex::new(None)),
            highlight_timer: None,
            highlight_ttl: HIGHLIGHT_TTL,
        }
    }

    /// Current document bytes (reflects all committed mutations).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bumped on every committed mutation; cached matches from earlier
    /// revisions reference pre-mutation rectangles.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Shorten or lengthen the highlight auto-clear delay.
    pub fn set_highlight_ttl(&mut self, ttl: Duration) {
        self.highlight_ttl = ttl;
    }

    /// Search the whole document.
    ///
    /// Glyph runs are re-fetched from the current bytes, so results always
    /// reflect the latest committed state. Results are cached as the "last
    /// find results" for `replace_match`.
    pub async fn find_text_matches(&mut self, options: &SearchOptions) -> Result<Vec<TextMatch>> {
        if self.bytes.is_empty() {
            return Err(EngineError::NoDocument);
        }

        let matches = match Matcher::new(options) {
            Some(matcher) => self.search_pages(&matcher).await?,
            None => Vec::new(),
        };
        debug!(
            search = %options.search,
            matches = matches.len(),
            "find completed"
        );
        self.find_cache = Some(FindCache {
            revision: self.revision,
            options: options.clone(),
            matches: matches.clone(),
        });
        Ok(matches)
    }

    async fn search_pages(&mut self, matcher: &Matcher) -> Result<Vec<TextMatch>> {
        let page_count = self.provider.page_count(&self.bytes).await?;
        let mut matches = Vec::new();
        for page_index in 0..page_count {
            let runs = self.provider.page_runs(&self.bytes, page_index).await?;
            let page_text = layout::reconstruct_page(&runs, &self.config);
            if page_text.text.is_empty() {
                continue;
            }
            for (start, end) in matcher.spans(&page_text.text) {
                if let Some(m) = geometry::map_span(
                    &page_text,
                    start,
                    end,
                    runs.page_width,
                    runs.page_height,
                    &self.config,
                ) {
                    matches.push(m);
                }
            }
        }
        Ok(matches)
    }

    /// Replace one match by id.
    ///
    /// Uses the cached match when the cache is current; after a mutation the
    /// geometry is re-derived against the new bytes, so a stale id either
    /// resolves to fresh coordinates or fails gracefully — the same region
    /// is never erased twice from stale coordinates.
    pub async fn replace_match(&mut self, match_id: &str, replacement: &str) -> Result<ReplaceOutcome> {
        let Some(m) = self.resolve_match(match_id).await? else {
            debug!(match_id, "match not resolvable against current document");
            return Ok(ReplaceOutcome::skipped(SkipReason::GenericFailure));
        };
        let min_scale = if m.refinement.is_some() {
            MIN_SCALE_REFINED
        } else {
            MIN_SCALE_BULK
        };
        let replacement = replacement.to_owned();
        let outcome = self
            .mutate(move |doc| {
                Ok(match apply_match(doc, &m, &replacement, min_scale) {
                    Ok(flash) => (ReplaceOutcome::replaced(flash), true),
                    Err(reason) => (ReplaceOutcome::skipped(reason), false),
                })
            })
            .await?;
        if let Some(flash) = outcome.flash.clone() {
            self.set_highlight(Some(flash));
        }
        Ok(outcome)
    }

    /// Replace every occurrence. Per-match fit failures are counted as
    /// skipped and never abort the batch; all successful replacements for
    /// one call commit in a single transaction.
    pub async fn replace_text(&mut self, options: &ReplaceOptions) -> Result<BulkReplaceOutcome> {
        let matches = self.find_text_matches(&options.search).await?;
        if matches.is_empty() {
            return Ok(BulkReplaceOutcome::default());
        }

        let replacement = options.replacement.clone();
        let (outcome, flash) = self
            .mutate(move |doc| {
                let mut outcome = BulkReplaceOutcome::default();
                let mut flash = None;
                for m in &matches {
                    match apply_match(doc, m, &replacement, MIN_SCALE_BULK) {
                        Ok(rect) => {
                            outcome.replacements += 1;
                            flash = Some(rect);
                        }
                        Err(reason) => {
                            debug!(id = %m.id, ?reason, "replacement skipped");
                            outcome.skipped += 1;
                        }
                    }
                }
                let dirty = outcome.replacements > 0;
                Ok(((outcome, flash), dirty))
            })
            .await?;
        info!(
            replacements = outcome.replacements,
            skipped = outcome.skipped,
            "bulk replace finished"
        );
        if let Some(rect) = flash {
            self.set_highlight(Some(rect));
        }
        Ok(outcome)
    }

    /// Show (or clear) the ephemeral current-match highlight. The highlight
    /// expires on a cancellable timer; a new call aborts the previous one.
    pub fn set_current_match_highlight(&mut self, current: Option<&TextMatch>) {
        self.set_highlight(current.map(|m| m.rect.clone()));
    }

    /// The highlight rectangle, if one is currently displayed.
    pub fn current_highlight(&self) -> Option<Rect> {
        lock(&self.highlight_rect).clone()
    }

    fn set_highlight(&mut self, rect: Option<Rect>) {
        if let Some(timer) = self.highlight_timer.take() {
            timer.abort();
        }
        let armed = rect.is_some();
        *lock(&self.highlight_rect) = rect;
        if armed {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let slot = Arc::clone(&self.highlight_rect);
                let ttl = self.highlight_ttl;
                self.highlight_timer = Some(handle.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    *lock(&slot) = None;
                }));
            }
        }
    }

    /// Look the id up in the last find results, re-deriving them first when
    /// a mutation has invalidated the cache.
    async fn resolve_match(&mut self, match_id: &str) -> Result<Option<TextMatch>> {
        let Some(cache) = &self.find_cache else {
            return Ok(None);
        };
        if cache.revision == self.revision {
            return Ok(cache.matches.iter().find(|m| m.id == match_id).cloned());
        }
        debug!(match_id, "cache stale, re-deriving match geometry");
        let options = cache.options.clone();
        let matches = self.find_text_matches(&options).await?;
        Ok(matches.into_iter().find(|m| m.id == match_id))
    }

    /// Run one load → mutate → save transaction. The mutator reports
    /// whether it dirtied the document; clean runs neither re-serialize nor
    /// bump the revision, so the match cache stays valid.
    async fn mutate<T>(
        &mut self,
        mutator: impl FnOnce(&mut Document) -> Result<(T, bool)>,
    ) -> Result<T> {
        if self.bytes.is_empty() {
            return Err(EngineError::NoDocument);
        }
        debug!(revision = self.revision, "transaction: loading document");
        let mut doc = match Document::load_mem(&self.bytes) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(%err, "transaction failed: document would not parse");
                return Err(err.into());
            }
        };
        let (value, dirty) = mutator(&mut doc)?;
        if dirty {
            let mut buffer = Vec::new();
            doc.save_to(&mut buffer)?;
            self.bytes = buffer;
            self.revision += 1;
            info!(revision = self.revision, "transaction committed");
        }
        Ok(value)
    }
}

impl Drop for PdfEditSession {
    fn drop(&mut self) {
        if let Some(timer) = self.highlight_timer.take() {
            timer.abort();
        }
    }
}

fn lock(slot: &Mutex<Option<Rect>>) -> MutexGuard<'_, Option<Rect>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plan and paint one replacement inside an open transaction.
fn apply_match(
    doc: &mut Document,
    m: &TextMatch,
    replacement: &str,
    min_scale: f64,
) -> std::result::Result<Rect, SkipReason> {
    let page_ids = canvas::page_ids(doc);
    let Some(&page_id) = page_ids.get(m.page_index) else {
        return Err(SkipReason::GenericFailure);
    };
    let (page_width, page_height) = provider::page_dimensions(doc, page_id);
    let plan = replace::plan_replacement(m, replacement, min_scale, page_width, page_height)?;
    canvas::apply_plan(doc, page_id, &plan).map_err(|err| {
        warn!(id = %m.id, %err, "draw failed");
        SkipReason::GenericFailure
    })?;
    Ok(plan.erase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> TextMatch {
        TextMatch {
            id: "p0:r0:o0:l2".to_string(),
            page_index: 0,
            entry_index: 0,
            start_in_run: 0,
            length: 2,
            rect: Rect {
                x: 72.0,
                y: 700.0,
                width: 20.0,
                height: 12.0,
            },
            snippet: "Hi".to_string(),
            font_name: None,
            original_font_size: 12.0,
            multi_run: false,
            matched_text: "Hi".to_string(),
            refinement: None,
        }
    }

    #[tokio::test]
    async fn highlight_expires_after_ttl() {
        let mut session = PdfEditSession::new(vec![0u8]);
        session.set_highlight_ttl(Duration::from_millis(20));
        session.set_current_match_highlight(Some(&sample_match()));
        assert!(session.current_highlight().is_some());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(session.current_highlight().is_none());
    }

    #[tokio::test]
    async fn new_highlight_cancels_previous_timer() {
        let mut session = PdfEditSession::new(vec![0u8]);
        session.set_highlight_ttl(Duration::from_millis(40));
        session.set_current_match_highlight(Some(&sample_match()));
        tokio::time::sleep(Duration::from_millis(25)).await;
        // Re-arm; the first timer must not clear the new highlight.
        session.set_current_match_highlight(Some(&sample_match()));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(session.current_highlight().is_some());
    }

    #[tokio::test]
    async fn clearing_highlight_removes_rect() {
        let mut session = PdfEditSession::new(vec![0u8]);
        session.set_current_match_highlight(Some(&sample_match()));
        session.set_current_match_highlight(None);
        assert!(session.current_highlight().is_none());
    }

    #[tokio::test]
    async fn empty_buffer_is_a_structural_error() {
        let mut session = PdfEditSession::new(Vec::new());
        let err = session
            .find_text_matches(&SearchOptions::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoDocument));
    }

    #[tokio::test]
    async fn unknown_match_id_fails_gracefully() {
        let mut session = PdfEditSession::new(vec![0u8]);
        let outcome = session.replace_match("p9:r9:o9:l9", "x").await.unwrap();
        assert!(!outcome.replaced);
        assert_eq!(outcome.reason, Some(SkipReason::GenericFailure));
    }
}
