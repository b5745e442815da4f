// matchpairs.rs - Capture offset buffers.
//
// A MatchPairs buffer holds one (start, limit) pair per capture, index 0
// being the whole match. Two allocation disciplines share the trait:
// ScopedMatchPairs (inline storage, sized once, reusable at that size) and
// VectorMatchPairs (growable, owns its storage).

use smallvec::SmallVec;

use crate::error::RegexError;

/// Inline capacity of a scoped buffer before it spills to the heap.
pub const SCOPED_INLINE_PAIRS: usize = 10;

/// One capture's offsets. Both fields are -1 when the capture did not
/// participate in the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchPair {
    pub start: i32,
    pub limit: i32,
}

impl MatchPair {
    pub const UNDEFINED: MatchPair = MatchPair {
        start: -1,
        limit: -1,
    };

    pub fn new(start: i32, limit: i32) -> Self {
        MatchPair { start, limit }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        self.start < 0
    }

    pub fn length(&self) -> usize {
        debug_assert!(!self.is_undefined());
        (self.limit - self.start) as usize
    }

    /// Internal consistency: either both offsets are -1, or
    /// `0 <= start <= limit`.
    pub fn check(&self) -> bool {
        if self.start < 0 {
            self.start == -1 && self.limit == -1
        } else {
            self.limit >= self.start
        }
    }
}

/// Capture offset buffer.
///
/// `alloc_or_expand_array` is the only allocation hook; the provided methods
/// build initialization, copying and displacement on top of it.
pub trait MatchPairs {
    fn pairs(&self) -> &[MatchPair];

    fn pairs_mut(&mut self) -> &mut [MatchPair];

    /// Guarantee room for exactly `pair_count` pairs. Contents are
    /// unspecified afterwards.
    fn alloc_or_expand_array(&mut self, pair_count: usize) -> Result<(), RegexError>;

    fn pair_count(&self) -> usize {
        self.pairs().len()
    }

    fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }

    fn get(&self, i: usize) -> MatchPair {
        self.pairs()[i]
    }

    /// Allocate (or reuse) `pair_count` pairs, all set to (-1, -1).
    fn init_array(&mut self, pair_count: usize) -> Result<(), RegexError> {
        assert!(pair_count > 0, "a match always has at least one pair");
        self.alloc_or_expand_array(pair_count)?;
        for pair in self.pairs_mut() {
            *pair = MatchPair::UNDEFINED;
        }
        Ok(())
    }

    /// Size this buffer like `other` and copy its contents.
    fn init_array_from(&mut self, other: &dyn MatchPairs) -> Result<(), RegexError> {
        assert!(other.pair_count() > 0);
        self.alloc_or_expand_array(other.pair_count())?;
        self.pairs_mut().copy_from_slice(other.pairs());
        Ok(())
    }

    /// Add `disp` to every defined offset.
    fn displace(&mut self, disp: usize) {
        if disp == 0 {
            return;
        }
        let disp = disp as i32;
        for pair in self.pairs_mut() {
            debug_assert!(pair.check());
            if pair.start >= 0 {
                pair.start += disp;
            }
            if pair.limit >= 0 {
                pair.limit += disp;
            }
        }
    }

    /// Whether every pair is consistent and lies within `[0, input_len]`.
    fn check_against(&self, input_len: usize) -> bool {
        self.pairs().iter().all(|pair| {
            pair.check() && (pair.is_undefined() || pair.limit as usize <= input_len)
        })
    }
}

// ============================================================================
// ScopedMatchPairs
// ============================================================================

/// Buffer whose storage is fixed by the first allocation.
///
/// Re-requesting the same pair count reuses the storage; requesting a
/// different one is a programming error and panics.
#[derive(Debug, Default)]
pub struct ScopedMatchPairs {
    pairs: SmallVec<[MatchPair; SCOPED_INLINE_PAIRS]>,
}

impl ScopedMatchPairs {
    pub fn new() -> Self {
        ScopedMatchPairs {
            pairs: SmallVec::new(),
        }
    }

    /// True once storage has been handed out.
    pub fn is_allocated(&self) -> bool {
        !self.pairs.is_empty()
    }
}

impl MatchPairs for ScopedMatchPairs {
    fn pairs(&self) -> &[MatchPair] {
        &self.pairs
    }

    fn pairs_mut(&mut self) -> &mut [MatchPair] {
        &mut self.pairs
    }

    fn alloc_or_expand_array(&mut self, pair_count: usize) -> Result<(), RegexError> {
        if self.is_allocated() {
            assert_eq!(
                self.pairs.len(),
                pair_count,
                "scoped match pairs cannot change size once allocated"
            );
            return Ok(());
        }
        self.pairs.try_reserve_exact(pair_count).map_err(|_| RegexError::Memory)?;
        self.pairs.resize(pair_count, MatchPair::UNDEFINED);
        Ok(())
    }
}

// ============================================================================
// VectorMatchPairs
// ============================================================================

/// Growable buffer; any pair count may be requested at any time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VectorMatchPairs {
    vec: Vec<MatchPair>,
}

impl VectorMatchPairs {
    pub fn new() -> Self {
        VectorMatchPairs { vec: Vec::new() }
    }

    pub fn into_vec(self) -> Vec<MatchPair> {
        self.vec
    }
}

impl MatchPairs for VectorMatchPairs {
    fn pairs(&self) -> &[MatchPair] {
        &self.vec
    }

    fn pairs_mut(&mut self) -> &mut [MatchPair] {
        &mut self.vec
    }

    fn alloc_or_expand_array(&mut self, pair_count: usize) -> Result<(), RegexError> {
        if pair_count > self.vec.len() {
            self.vec
                .try_reserve(pair_count - self.vec.len())
                .map_err(|_| RegexError::Memory)?;
        }
        self.vec.resize(pair_count, MatchPair::UNDEFINED);
        Ok(())
    }
}
