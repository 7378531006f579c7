//! Striped block views.
//!
//! A file of `N` bytes is partitioned into `block_size`-sized blocks that
//! are distributed round-robin across `stride` workers; the view yields the
//! `(offset, length)` pairs owned by the worker at a given displacement.
//! For a file with blocks `0 1 2 3 4` and a stride of 2, the worker at
//! displacement 0 owns blocks `0 2 4` and the worker at displacement 1 owns
//! `1 3`.

/// One contiguous byte range of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRange {
    pub offset: u64,
    pub len: u64,
}

/// The lazy sequence of block ranges one worker owns.
///
/// Finite, forward-only, and cheap to restart: the view is `Copy` and
/// [`StripedView::iter`] starts from the beginning each time. Ranges past
/// end of file are never produced and the final block may be short.
#[derive(Debug, Clone, Copy)]
pub struct StripedView {
    file_size: u64,
    block_size: u64,
    stride: u64,
    displacement: u64,
}

impl StripedView {
    /// Builds a view for the worker at `displacement` (0-based) out of
    /// `stride` workers.
    ///
    /// `block_size` must be a power of two and `displacement < stride`.
    pub fn new(file_size: u64, block_size: u64, stride: u64, displacement: u64) -> Self {
        assert!(block_size.is_power_of_two(), "block size must be a power of two");
        assert!(stride > 0, "stride must be positive");
        assert!(displacement < stride, "displacement must be below the stride");
        Self {
            file_size,
            block_size,
            stride,
            displacement,
        }
    }

    /// Number of blocks in the whole file.
    pub fn total_blocks(&self) -> u64 {
        self.file_size.div_ceil(self.block_size)
    }

    /// Number of blocks this worker owns.
    pub fn owned_blocks(&self) -> u64 {
        let total = self.total_blocks();
        let base = total / self.stride;
        let extra = u64::from(self.displacement < total % self.stride);
        base + extra
    }

    /// The `index`-th owned range, or `None` past the end of the view.
    pub fn get(&self, index: u64) -> Option<FileRange> {
        if index >= self.owned_blocks() {
            return None;
        }
        let block = self.displacement + index * self.stride;
        let offset = block * self.block_size;
        let len = self.block_size.min(self.file_size - offset);
        Some(FileRange { offset, len })
    }

    /// Iterates the owned ranges from the beginning.
    pub fn iter(&self) -> impl Iterator<Item = FileRange> + '_ {
        (0..self.owned_blocks()).map(|i| {
            self.get(i)
                .expect("index below owned_blocks always yields a range")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_distribution() {
        // 5 blocks of 4 over 2 workers: rank 0 owns 0/2/4, rank 1 owns 1/3.
        let r0 = StripedView::new(20, 4, 2, 0);
        let r1 = StripedView::new(20, 4, 2, 1);

        let owned0: Vec<_> = r0.iter().collect();
        let owned1: Vec<_> = r1.iter().collect();

        assert_eq!(
            owned0,
            vec![
                FileRange { offset: 0, len: 4 },
                FileRange { offset: 8, len: 4 },
                FileRange { offset: 16, len: 4 },
            ]
        );
        assert_eq!(
            owned1,
            vec![
                FileRange { offset: 4, len: 4 },
                FileRange { offset: 12, len: 4 },
            ]
        );
    }

    #[test]
    fn final_block_may_be_short() {
        let view = StripedView::new(10, 4, 1, 0);
        let ranges: Vec<_> = view.iter().collect();
        assert_eq!(
            ranges,
            vec![
                FileRange { offset: 0, len: 4 },
                FileRange { offset: 4, len: 4 },
                FileRange { offset: 8, len: 2 },
            ]
        );
    }

    #[test]
    fn empty_file_owns_nothing() {
        let view = StripedView::new(0, 512, 4, 2);
        assert_eq!(view.total_blocks(), 0);
        assert_eq!(view.owned_blocks(), 0);
        assert_eq!(view.iter().count(), 0);
        assert_eq!(view.get(0), None);
    }

    #[test]
    fn single_block_file_lands_on_the_first_worker() {
        for rank in 0..4 {
            let view = StripedView::new(100, 512, 4, rank);
            let expected = u64::from(rank == 0);
            assert_eq!(view.owned_blocks(), expected);
        }
    }

    #[test]
    fn view_restarts_from_the_beginning() {
        let view = StripedView::new(4096, 512, 3, 1);
        let first: Vec<_> = view.iter().collect();
        let second: Vec<_> = view.iter().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_odd_block_sizes() {
        let _ = StripedView::new(100, 300, 2, 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn params() -> impl Strategy<Value = (u64, u32, u64)> {
            // (file_size, block_size_exponent, stride)
            (0u64..1 << 20, 4u32..16, 1u64..9)
        }

        proptest! {
            #[test]
            fn offsets_increase_and_stay_in_bounds((file_size, bs_exp, stride) in params()) {
                let block_size = 1u64 << bs_exp;
                for disp in 0..stride {
                    let view = StripedView::new(file_size, block_size, stride, disp);
                    let mut last_end = None;
                    for range in view.iter() {
                        prop_assert!(range.len > 0);
                        prop_assert!(range.offset + range.len <= file_size);
                        if let Some(end) = last_end {
                            prop_assert!(range.offset >= end);
                        }
                        last_end = Some(range.offset + range.len);
                    }
                }
            }

            #[test]
            fn ownership_counts_sum_to_total((file_size, bs_exp, stride) in params()) {
                let block_size = 1u64 << bs_exp;
                let total = StripedView::new(file_size, block_size, stride, 0).total_blocks();
                let sum: u64 = (0..stride)
                    .map(|d| StripedView::new(file_size, block_size, stride, d).owned_blocks())
                    .sum();
                prop_assert_eq!(sum, total);
            }

            #[test]
            fn ranges_tile_the_file((file_size, bs_exp, stride) in params()) {
                let block_size = 1u64 << bs_exp;
                let covered: u64 = (0..stride)
                    .flat_map(|d| {
                        StripedView::new(file_size, block_size, stride, d)
                            .iter()
                            .collect::<Vec<_>>()
                    })
                    .map(|r| r.len)
                    .sum();
                prop_assert_eq!(covered, file_size);
            }
        }
    }
}
