//! Ephemeral clip store.
//!
//! The authoritative code → clip map plus the per-owner index, guarded by a
//! single lock so eviction and lazy expiry mutate both together. Clips live
//! purely in memory; restart loses everything by design.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    codegen,
    errors::Error,
    expiry::{self, TtlSpec},
    formatting::preview,
    Result,
};

/// Hard cap on clip content, in characters.
pub const MAX_CONTENT_LEN: usize = 10_000;

/// Retention cap per owner. Saving beyond this evicts the owner's oldest
/// live clip (creation order, not last-access order).
pub const MAX_CLIPS_PER_OWNER: usize = 50;

#[derive(Clone, Debug)]
struct Clip {
    id: String,
    content: String,
    owner: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    tags: Vec<String>,
    is_public: bool,
    views: u64,
    last_accessed: Option<DateTime<Utc>>,
}

/// Input for a save.
#[derive(Clone, Debug)]
pub struct SaveRequest {
    pub content: String,
    pub owner: String,
    pub ttl: Option<TtlSpec>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

/// What a successful save hands back to the caller.
#[derive(Clone, Debug)]
pub struct SaveReceipt {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Immutable snapshot of a clip, taken after the view count was bumped.
#[derive(Clone, Debug)]
pub struct ClipView {
    pub id: String,
    pub content: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub views: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Lightweight listing entry: never carries full content.
#[derive(Clone, Debug)]
pub struct ClipPreview {
    pub id: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub views: u64,
}

/// One page of an owner's live clips, newest first.
#[derive(Clone, Debug)]
pub struct ClipPage {
    pub items: Vec<ClipPreview>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Visibility policy: public clips are readable by anyone, private clips
/// only by their owner. Evaluated fresh on every read.
fn can_read(clip: &Clip, caller: Option<&str>) -> bool {
    clip.is_public || caller == Some(clip.owner.as_str())
}

#[derive(Default)]
struct StoreState {
    clips: HashMap<String, Clip>,
    by_owner: HashMap<String, VecDeque<String>>,
}

impl StoreState {
    /// Remove-if-present from both maps. Idempotent on purpose: lazy expiry
    /// and the sweep may race to delete the same code.
    fn remove(&mut self, code: &str) -> bool {
        let Some(clip) = self.clips.remove(code) else {
            return false;
        };
        if let Some(codes) = self.by_owner.get_mut(&clip.owner) {
            codes.retain(|c| c != code);
            if codes.is_empty() {
                self.by_owner.remove(&clip.owner);
            }
        }
        true
    }
}

/// Source of candidate retrieval codes. Swappable so tests can force
/// collisions; production uses [`codegen::generate_code`].
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared handle to the clip store. Cheap to clone; all mutation is
/// serialized behind one lock so store and owner index never diverge.
#[derive(Clone)]
pub struct ClipStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    preview_length: usize,
    generate: CodeGenerator,
    state: Mutex<StoreState>,
}

impl ClipStore {
    pub fn new(preview_length: usize) -> Self {
        Self::with_generator(preview_length, Arc::new(codegen::generate_code))
    }

    pub fn with_generator(preview_length: usize, generate: CodeGenerator) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                preview_length,
                generate,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// Save a clip and return its retrieval code.
    pub async fn put(&self, req: SaveRequest) -> Result<SaveReceipt> {
        self.put_at(req, Utc::now()).await
    }

    async fn put_at(&self, req: SaveRequest, now: DateTime<Utc>) -> Result<SaveReceipt> {
        if req.content.trim().is_empty() {
            return Err(Error::Validation("content is empty".to_string()));
        }
        if req.owner.trim().is_empty() {
            return Err(Error::Validation("owner is missing".to_string()));
        }
        let len = req.content.chars().count();
        if len > MAX_CONTENT_LEN {
            return Err(Error::Validation(format!(
                "content too long: {len} chars (max {MAX_CONTENT_LEN})"
            )));
        }

        let expires_at = expiry::expires_at(now, req.ttl);

        let mut guard = self.inner.state.lock().await;
        let st = &mut *guard;

        // The generator is random-only; the live set is the uniqueness
        // authority.
        let code = loop {
            let candidate = (self.inner.generate)();
            if !st.clips.contains_key(&candidate) {
                break candidate;
            }
        };

        st.clips.insert(
            code.clone(),
            Clip {
                id: code.clone(),
                content: req.content,
                owner: req.owner.clone(),
                created_at: now,
                expires_at,
                tags: req.tags,
                is_public: req.is_public,
                views: 0,
                last_accessed: None,
            },
        );

        let codes = st.by_owner.entry(req.owner).or_default();
        codes.push_back(code.clone());

        // FIFO eviction beyond the retention cap.
        while codes.len() > MAX_CLIPS_PER_OWNER {
            let Some(oldest) = codes.pop_front() else {
                break;
            };
            st.clips.remove(&oldest);
        }

        Ok(SaveReceipt { code, expires_at })
    }

    /// Fetch a clip by code. Expired clips are deleted on the spot before
    /// the error is returned; a successful read counts exactly one view.
    pub async fn get(&self, code: &str, caller: Option<&str>) -> Result<ClipView> {
        self.get_at(code, caller, Utc::now()).await
    }

    async fn get_at(
        &self,
        code: &str,
        caller: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ClipView> {
        let mut st = self.inner.state.lock().await;

        let Some(clip) = st.clips.get_mut(code) else {
            return Err(Error::NotFound);
        };

        if now >= clip.expires_at {
            st.remove(code);
            return Err(Error::Expired);
        }

        if !can_read(clip, caller) {
            return Err(Error::AccessDenied);
        }

        clip.views += 1;
        clip.last_accessed = Some(now);

        Ok(ClipView {
            id: clip.id.clone(),
            content: clip.content.clone(),
            owner: clip.owner.clone(),
            created_at: clip.created_at,
            expires_at: clip.expires_at,
            tags: clip.tags.clone(),
            is_public: clip.is_public,
            views: clip.views,
            last_accessed: clip.last_accessed,
        })
    }

    /// Page through an owner's live clips, newest first. Never errors:
    /// unknown owners and out-of-range pages yield an empty page.
    pub async fn list(&self, owner: &str, page: usize, limit: usize) -> ClipPage {
        self.list_at(owner, page, limit, Utc::now()).await
    }

    async fn list_at(
        &self,
        owner: &str,
        page: usize,
        limit: usize,
        now: DateTime<Utc>,
    ) -> ClipPage {
        let page = page.max(1);
        let limit = limit.max(1);

        let st = self.inner.state.lock().await;

        // Walk the append-ordered index in reverse; skip clips the sweep
        // has not reclaimed yet.
        let live: Vec<&Clip> = st
            .by_owner
            .get(owner)
            .map(|codes| {
                codes
                    .iter()
                    .rev()
                    .filter_map(|c| st.clips.get(c))
                    .filter(|clip| clip.expires_at > now)
                    .collect()
            })
            .unwrap_or_default();

        let total = live.len();
        let total_pages = total.div_ceil(limit);

        let start = (page - 1).saturating_mul(limit);
        let items = live
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|clip| ClipPreview {
                id: clip.id.clone(),
                preview: preview(&clip.content, self.inner.preview_length),
                created_at: clip.created_at,
                expires_at: clip.expires_at,
                tags: clip.tags.clone(),
                views: clip.views,
            })
            .collect();

        ClipPage {
            items,
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1 && total > 0,
        }
    }

    /// Idempotent removal. Returns whether the code was present.
    pub async fn delete(&self, code: &str) -> bool {
        let mut st = self.inner.state.lock().await;
        st.remove(code)
    }

    /// One sweep pass: delete every clip past its expiry from both maps.
    /// Returns the number of clips reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut st = self.inner.state.lock().await;

        let expired: Vec<String> = st
            .clips
            .values()
            .filter(|clip| clip.expires_at <= now)
            .map(|clip| clip.id.clone())
            .collect();

        let mut removed = 0usize;
        for code in &expired {
            if st.remove(code) {
                removed += 1;
            }
        }
        removed
    }

    /// Number of clips currently held (live or not-yet-swept).
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.clips.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ClipStore {
    fn default() -> Self {
        Self::new(80)
    }
}
