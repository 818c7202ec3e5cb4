//! Render Target Pool
//!
//! Owns every persistent GPU render target the SSR pipeline uses and hands
//! out lightweight [`TextureHandle`]s in their place. The actual GPU work is
//! delegated to a [`TextureAllocator`], so the pool (and everything above it)
//! runs unchanged against a real wgpu device or a test double.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              RenderTargetPool<A>                     │
//! │                                                     │
//! │  targets: SlotMap<TextureHandle, RenderTargetSpec>  │
//! │  allocator: A  ──► allocate(handle, spec)           │
//! │                ──► release(handle)                  │
//! │                                                     │
//! │  create()    → handle        (rebuild time)         │
//! │  recreate()  → new handle    (destroy, then create) │
//! │  release()                   (idempotent)           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifetime Strategy
//!
//! - Targets live until released explicitly; nothing is recycled behind the
//!   caller's back.
//! - A spec never changes on a live target. Resizing goes through
//!   [`RenderTargetPool::recreate`], which releases the old GPU texture before
//!   allocating the new one and returns a fresh handle, so stale handles from
//!   before a rebuild can never alias the new target.
//! - Allocation and release counters make leaks observable.

use slotmap::SlotMap;

use super::history::{HistoryAxes, HistoryManager, HistorySlot};
use super::texture::RenderTargetSpec;
use crate::errors::{Result, SsrError};

slotmap::new_key_type! {
    /// Lightweight handle to a render target owned by a [`RenderTargetPool`].
    pub struct TextureHandle;
}

/// Backend that turns [`RenderTargetSpec`]s into GPU textures.
///
/// The pool has validated the spec and reserved `handle` before `allocate` is
/// called; the backend keys its own storage by that handle.
pub trait TextureAllocator {
    /// Creates the GPU texture for `handle`.
    fn allocate(&mut self, handle: TextureHandle, spec: &RenderTargetSpec) -> Result<()>;

    /// Destroys the GPU texture for `handle`.
    fn release(&mut self, handle: TextureHandle);
}

/// Pool of persistent render targets.
pub struct RenderTargetPool<A> {
    allocator: A,
    targets: SlotMap<TextureHandle, RenderTargetSpec>,
    allocations: u64,
    releases: u64,
}

impl<A: TextureAllocator> RenderTargetPool<A> {
    /// Creates an empty pool on top of `allocator`.
    #[must_use]
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            targets: SlotMap::with_key(),
            allocations: 0,
            releases: 0,
        }
    }

    // ── Allocation ─────────────────────────────────────────────────────────

    /// Allocates a render target matching `spec`.
    pub fn create(&mut self, spec: &RenderTargetSpec) -> Result<TextureHandle> {
        spec.validate()?;

        let handle = self.targets.insert(spec.clone());
        if let Err(err) = self.allocator.allocate(handle, spec) {
            self.targets.remove(handle);
            return Err(err);
        }

        self.allocations += 1;
        log::debug!(
            "Allocated render target '{}' {}x{} {:?} ({} mips)",
            spec.label,
            spec.width,
            spec.height,
            spec.format,
            spec.mip_count
        );
        Ok(handle)
    }

    /// Destroys `handle` and creates a new target from `spec`.
    ///
    /// The old handle is invalid afterwards even if allocation fails.
    pub fn recreate(
        &mut self,
        handle: TextureHandle,
        spec: &RenderTargetSpec,
    ) -> Result<TextureHandle> {
        self.release(handle);
        self.create(spec)
    }

    /// Makes `slot` hold a target matching `spec`, recreating it only when
    /// the existing spec differs.
    ///
    /// Returns `true` if a new target was created.
    pub fn ensure(
        &mut self,
        slot: &mut Option<TextureHandle>,
        spec: &RenderTargetSpec,
    ) -> Result<bool> {
        if let Some(handle) = *slot {
            if self.targets.get(handle) == Some(spec) {
                return Ok(false);
            }
            self.release(handle);
            *slot = None;
        }

        *slot = Some(self.create(spec)?);
        Ok(true)
    }

    /// Releases a render target. Releasing a stale handle is a no-op.
    pub fn release(&mut self, handle: TextureHandle) {
        if let Some(spec) = self.targets.remove(handle) {
            self.allocator.release(handle);
            self.releases += 1;
            log::debug!("Released render target '{}'", spec.label);
        }
    }

    // ── History managers ───────────────────────────────────────────────────

    /// Allocates one target per enabled-axis combination of `axes`.
    ///
    /// On failure every target created so far is released again.
    pub fn create_history(
        &mut self,
        axes: HistoryAxes,
        spec: &RenderTargetSpec,
    ) -> Result<HistoryManager<TextureHandle>> {
        let mut history = HistoryManager::new(axes);
        let (_, _, faces) = axes.dimensions();

        let slots: &[HistorySlot] = if axes.flip_flop {
            &[HistorySlot::Current, HistorySlot::Previous]
        } else {
            &[HistorySlot::Current]
        };

        for &slot in slots {
            for &eye in axes.eyes() {
                for face in 0..faces as u32 {
                    match self.create(spec) {
                        Ok(handle) => {
                            history.set(slot, eye, face, handle);
                        }
                        Err(err) => {
                            self.release_history(&mut history);
                            return Err(err);
                        }
                    }
                }
            }
        }

        Ok(history)
    }

    /// Releases every target in `history` exactly once and empties it.
    ///
    /// Calling this again on the same manager does nothing.
    pub fn release_history(&mut self, history: &mut HistoryManager<TextureHandle>) {
        let handles: Vec<TextureHandle> = history.drain().collect();
        for handle in handles {
            self.release(handle);
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    /// Spec of a live target.
    #[must_use]
    pub fn spec(&self, handle: TextureHandle) -> Option<&RenderTargetSpec> {
        self.targets.get(handle)
    }

    /// Spec of a live target, or [`SsrError::UnknownTexture`].
    pub fn try_spec(&self, handle: TextureHandle) -> Result<&RenderTargetSpec> {
        self.targets.get(handle).ok_or(SsrError::UnknownTexture)
    }

    #[must_use]
    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.targets.contains_key(handle)
    }

    /// Number of live render targets.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.targets.len()
    }

    /// Total successful allocations since creation.
    #[must_use]
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// Total releases since creation.
    #[must_use]
    pub fn release_count(&self) -> u64 {
        self.releases
    }

    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// Releases every live target.
    pub fn clear(&mut self) {
        let handles: Vec<TextureHandle> = self.targets.keys().collect();
        for handle in handles {
            self.release(handle);
        }
    }
}
