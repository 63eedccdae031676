//! Load-more trigger driven by sentinel visibility.
//!
//! A front end reports how much of the sentinel at the end of a list is
//! visible. When it crosses into view the trigger asks its target for more
//! items, with a guard so slow loads are not stacked.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::pagination::TabPager;
use crate::Result;

/// Anything that can load the next batch of items.
#[async_trait]
pub trait LoadMore: Send + Sync {
    async fn load_more(&self) -> Result<()>;
}

#[async_trait]
impl LoadMore for TabPager {
    async fn load_more(&self) -> Result<()> {
        // Pager failures are logged by the pager itself.
        Self::load_more(self).await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOptions {
    pub enabled: bool,
    /// Visible fraction of the sentinel needed to count as intersecting
    pub threshold: f64,
    /// Grows (or, when negative, shrinks) the viewport on both edges
    pub root_margin_px: f64,
    pub prevent_load_while_loading: bool,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            root_margin_px: 0.0,
            prevent_load_while_loading: true,
        }
    }
}

/// Vertical extent of an element, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub top: f64,
    pub bottom: f64,
}

impl Span {
    #[must_use]
    pub const fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    fn height(self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }
}

/// Fraction of `sentinel` inside `viewport` after growing the viewport by
/// `root_margin_px`. A zero-height sentinel counts as fully visible when it
/// sits inside the viewport.
#[must_use]
pub fn intersection_ratio(viewport: Span, sentinel: Span, root_margin_px: f64) -> f64 {
    let top = viewport.top - root_margin_px;
    let bottom = viewport.bottom + root_margin_px;
    if bottom < top {
        return 0.0;
    }

    let height = sentinel.height();
    if height == 0.0 {
        return if sentinel.top >= top && sentinel.top <= bottom {
            1.0
        } else {
            0.0
        };
    }
    let overlap = (sentinel.bottom.min(bottom) - sentinel.top.max(top)).max(0.0);
    (overlap / height).clamp(0.0, 1.0)
}

/// Watches one sentinel and calls [`LoadMore::load_more`] on entry.
pub struct InfiniteScrollTrigger<L: LoadMore + ?Sized> {
    target: Arc<L>,
    options: ScrollOptions,
    enabled: AtomicBool,
    intersecting: AtomicBool,
    /// Loads started by this trigger and not yet finished
    in_flight: AtomicUsize,
}

impl<L: LoadMore + ?Sized> InfiniteScrollTrigger<L> {
    pub fn new(target: Arc<L>, options: ScrollOptions) -> Self {
        Self {
            target,
            enabled: AtomicBool::new(options.enabled),
            options,
            intersecting: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn the trigger on or off. Turning it on re-arms it, so a sentinel
    /// that is already visible fires on the next observation.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            self.intersecting.store(false, Ordering::SeqCst);
        }
    }

    /// True while any triggered load is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Report the sentinel's geometry.
    pub async fn observe_geometry(&self, viewport: Span, sentinel: Span) -> bool {
        let ratio = intersection_ratio(viewport, sentinel, self.options.root_margin_px);
        self.observe(ratio).await
    }

    /// Report the visible fraction of the sentinel. Returns whether a load
    /// was started and has finished.
    pub async fn observe(&self, ratio: f64) -> bool {
        let now = ratio > 0.0 && ratio >= self.options.threshold;
        let was = self.intersecting.swap(now, Ordering::SeqCst);
        if !now || was || !self.is_enabled() {
            return false;
        }

        if self.options.prevent_load_while_loading {
            if self
                .in_flight
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                tracing::debug!("Sentinel visible while loading; skipped");
                return false;
            }
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        let _guard = LoadingGuard(&self.in_flight);

        if let Err(error) = self.target.load_more().await {
            tracing::error!("Error loading more items: {}", error);
        }
        true
    }
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
