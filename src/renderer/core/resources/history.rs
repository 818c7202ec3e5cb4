//! History Manager
//!
//! A small indexed container over three independent axes:
//!
//! ```text
//!  slot  ∈ { Current, Previous }   (flip-flop axis)
//!  eye   ∈ { Left, Right }         (VR axis)
//!  face  ∈ 0..6                    (cubemap axis)
//! ```
//!
//! Each axis is enabled at construction. A disabled axis always resolves to
//! index 0, so pipeline code can be written once for every combination
//! without manual double-buffering logic. The manager never flips state on its
//! own: the caller passes the slot it wants, and alternates it across blur
//! iterations or frames.
//!
//! Texture-backed managers are created and released through
//! [`RenderTargetPool::create_history`](super::pool::RenderTargetPool::create_history)
//! and [`RenderTargetPool::release_history`](super::pool::RenderTargetPool::release_history).

use super::texture::CUBE_FACE_COUNT;

/// Temporal slot of a flip-flop resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistorySlot {
    Current,
    Previous,
}

impl HistorySlot {
    /// The other slot.
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Current => Self::Previous,
            Self::Previous => Self::Current,
        }
    }

    /// `Current` for even iterations, `Previous` for odd ones.
    #[inline]
    #[must_use]
    pub fn for_iteration(iteration: u32) -> Self {
        if iteration % 2 == 0 {
            Self::Current
        } else {
            Self::Previous
        }
    }
}

/// Eye of a stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];
    pub const MONO: [Eye; 1] = [Eye::Left];
}

/// Axes enabled on a [`HistoryManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HistoryAxes {
    pub flip_flop: bool,
    pub vr: bool,
    pub cubemap: bool,
}

impl HistoryAxes {
    #[must_use]
    pub const fn new(flip_flop: bool, vr: bool, cubemap: bool) -> Self {
        Self {
            flip_flop,
            vr,
            cubemap,
        }
    }

    /// Extent of each axis: `(slots, eyes, faces)`.
    #[inline]
    #[must_use]
    pub fn dimensions(self) -> (usize, usize, usize) {
        (
            if self.flip_flop { 2 } else { 1 },
            if self.vr { 2 } else { 1 },
            if self.cubemap {
                CUBE_FACE_COUNT as usize
            } else {
                1
            },
        )
    }

    /// Total number of entries.
    #[inline]
    #[must_use]
    pub fn len(self) -> usize {
        let (x, y, z) = self.dimensions();
        x * y * z
    }

    /// Enabled eyes, in rendering order.
    #[must_use]
    pub fn eyes(self) -> &'static [Eye] {
        let eyes: &'static [Eye] = if self.vr { &Eye::BOTH } else { &Eye::MONO };
        eyes
    }
}

/// Indexed container of per-slot, per-eye, per-face values.
///
/// Exactly one entry exists per enabled-axis combination. Entries start
/// empty; accessors return `None` until a value is set.
#[derive(Debug, Clone)]
pub struct HistoryManager<T> {
    axes: HistoryAxes,
    entries: Vec<Option<T>>,
}

impl<T> HistoryManager<T> {
    /// Creates an empty manager with the given axes enabled.
    #[must_use]
    pub fn new(axes: HistoryAxes) -> Self {
        let mut entries = Vec::with_capacity(axes.len());
        entries.resize_with(axes.len(), || None);
        Self { axes, entries }
    }

    #[inline]
    #[must_use]
    pub fn axes(&self) -> HistoryAxes {
        self.axes
    }

    /// Extent of each axis: `(slots, eyes, faces)`.
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.axes.dimensions()
    }

    fn index(&self, slot: HistorySlot, eye: Eye, face: u32) -> usize {
        let (_, eyes, faces) = self.axes.dimensions();
        let x = usize::from(self.axes.flip_flop && slot == HistorySlot::Previous);
        let y = usize::from(self.axes.vr && eye == Eye::Right);
        let z = if self.axes.cubemap {
            face.min(CUBE_FACE_COUNT - 1) as usize
        } else {
            0
        };
        (x * eyes + y) * faces + z
    }

    #[inline]
    #[must_use]
    pub fn get(&self, slot: HistorySlot, eye: Eye, face: u32) -> Option<&T> {
        self.entries[self.index(slot, eye, face)].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, slot: HistorySlot, eye: Eye, face: u32) -> Option<&mut T> {
        let index = self.index(slot, eye, face);
        self.entries[index].as_mut()
    }

    /// Stores `value`, returning the value it replaced.
    pub fn set(&mut self, slot: HistorySlot, eye: Eye, face: u32, value: T) -> Option<T> {
        let index = self.index(slot, eye, face);
        self.entries[index].replace(value)
    }

    /// Removes and returns a value, leaving the entry empty.
    pub fn take(&mut self, slot: HistorySlot, eye: Eye, face: u32) -> Option<T> {
        let index = self.index(slot, eye, face);
        self.entries[index].take()
    }

    /// Iterates over the populated entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().flatten()
    }

    /// Number of populated entries.
    #[must_use]
    pub fn populated(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }

    /// Takes every value out of the manager, leaving all entries empty.
    ///
    /// Each stored value is yielded exactly once; a second drain yields
    /// nothing.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.iter_mut().filter_map(Option::take)
    }
}

impl<T: Copy> HistoryManager<T> {
    /// Copy of the value at the given coordinates.
    #[inline]
    #[must_use]
    pub fn at(&self, slot: HistorySlot, eye: Eye, face: u32) -> Option<T> {
        self.get(slot, eye, face).copied()
    }
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new(HistoryAxes::default())
    }
}
