use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};
use tile_core::ComplexField;

/// Best pivot candidate found by one worker for the current column.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate<T> {
    /// Distance between the candidate row and the diagonal row.
    pub offset: usize,
    /// Value of the candidate entry.
    pub value: T,
}

/// One candidate slot per member of the team.
///
/// Slot `r` is only written by worker `r`, and only read by the leader after the barrier that
/// follows the write.
pub struct RankRegisters<T> {
    slots: Box<[UnsafeCell<Candidate<T>>]>,
}

// SAFETY: concurrent accesses to a slot are ordered by the team barrier.
unsafe impl<T: Send> Sync for RankRegisters<T> {}

impl<T: ComplexField> RankRegisters<T> {
    /// Allocates registers for a team of `size` workers.
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size)
                .map(|_| {
                    UnsafeCell::new(Candidate {
                        offset: 0,
                        value: T::zero(),
                    })
                })
                .collect(),
        }
    }
}

impl<T: Copy> RankRegisters<T> {
    /// Team size the registers were allocated for.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// # Safety
    ///
    /// Only worker `rank` may call this, and no other worker may read slot `rank` before the
    /// next barrier.
    #[inline]
    pub(crate) unsafe fn store(&self, rank: usize, candidate: Candidate<T>) {
        *self.slots[rank].get() = candidate;
    }

    /// # Safety
    ///
    /// Slot `rank` must not be written concurrently.
    #[inline]
    pub(crate) unsafe fn load(&self, rank: usize) -> Candidate<T> {
        *self.slots[rank].get()
    }
}

/// 1-based index of the first column whose pivot was exactly zero, `0` while there is none.
#[derive(Debug, Default)]
pub struct SingularityFlag {
    info: AtomicUsize,
}

impl SingularityFlag {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the LAPACK style `info` value.
    #[inline]
    pub fn get(&self) -> usize {
        self.info.load(Ordering::Relaxed)
    }

    /// Returns the 1-based column of the first zero pivot, if any.
    #[inline]
    pub fn first_zero_pivot(&self) -> Option<usize> {
        match self.get() {
            0 => None,
            col => Some(col),
        }
    }

    /// Records `col` unless a zero pivot was already recorded. Returns `true` if the flag was
    /// set by this call.
    #[inline]
    pub(crate) fn record(&self, col: usize) -> bool {
        self.info
            .compare_exchange(0, col, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

/// Pivot vector shared by the members of a team.
///
/// Only the leader writes to it, the other workers read it after a barrier.
pub struct PivotsMut<'a> {
    ptr: NonNull<usize>,
    len: usize,
    _marker: PhantomData<&'a mut [usize]>,
}

impl<'a> Copy for PivotsMut<'a> {}
impl<'a> Clone for PivotsMut<'a> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

unsafe impl<'a> Send for PivotsMut<'a> {}
unsafe impl<'a> Sync for PivotsMut<'a> {}

impl<'a> PivotsMut<'a> {
    #[inline]
    pub fn new(ipiv: &'a mut [usize]) -> Self {
        Self {
            len: ipiv.len(),
            ptr: NonNull::from(ipiv).cast(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    ///
    /// `i < self.len()`, and the entry must not be written concurrently.
    #[inline]
    pub(crate) unsafe fn read(self, i: usize) -> usize {
        debug_assert!(i < self.len);
        *self.ptr.as_ptr().add(i)
    }

    /// # Safety
    ///
    /// `i < self.len()`, and the entry must not be accessed concurrently.
    #[inline]
    pub(crate) unsafe fn write(self, i: usize, value: usize) {
        debug_assert!(i < self.len);
        *self.ptr.as_ptr().add(i) = value;
    }
}
