// src/miner/scheduler.rs
//! Mining task scheduler implementation
//!
//! Holds the single current task and hands out disjoint nonce ranges to
//! device workers. Task replacement and range allocation go through one
//! exclusive lock, so a worker always sees a consistent (task, range)
//! pair and two workers never search the same nonces of the same task.

use crate::miner::verify;
use crate::types::SubmitTarget;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Length of a complete candidate input in bytes
pub const INPUT_LEN: usize = 123;

/// Length of the input prefix the midstate covers
pub const FIRST_BLOCK_LEN: usize = 64;

/// Number of 32-bit words in the padded input suffix
pub const SUFFIX_WORDS: usize = 15;

/// Represents the current mining assignment received from a pool
///
/// A task is immutable once installed; the nonce cursor lives in the
/// [`Scheduler`] and is reset whenever a new task replaces this one.
#[derive(Debug, Clone)]
pub struct Task {
    /// Complete input template (header, expiry, wallet, prefix, seed, suffix)
    pub input: [u8; INPUT_LEN],
    /// Opaque giver identifier, echoed back on submission
    pub giver: serde_json::Value,
    /// Threshold a candidate digest must compare below (big-endian)
    pub complexity: [u8; 32],
    /// SHA-256 state after compressing the first 64-byte block of `input`
    pub hash_state: [u32; 8],
    /// Big-endian words of `input[64..]` plus the `0x80` padding byte
    pub suffix: [u32; SUFFIX_WORDS],
    /// When this task was installed, used for staleness checks
    pub created_at: Instant,
    /// Pool and wallet any share derived from this task is submitted to
    pub target: SubmitTarget,
    /// Whether this task was fetched from a devfee pool
    pub is_devfee: bool,
}

impl Task {
    /// Builds a task from an assembled input template
    ///
    /// Derives the precomputed hash state and the suffix words the
    /// accelerator consumes, so neither is recomputed per dispatch.
    ///
    /// # Arguments
    /// * `input` - The 123-byte input template
    /// * `giver` - Opaque pool identifier echoed on submission
    /// * `complexity` - Digest threshold for this task
    /// * `target` - Pool/wallet pair shares must be submitted to
    /// * `is_devfee` - Whether the task came from a devfee pool
    pub fn new(
        input: [u8; INPUT_LEN],
        giver: serde_json::Value,
        complexity: [u8; 32],
        target: SubmitTarget,
        is_devfee: bool,
    ) -> Self {
        let mut first_block = [0u8; FIRST_BLOCK_LEN];
        first_block.copy_from_slice(&input[..FIRST_BLOCK_LEN]);

        let mut padded = [0u8; SUFFIX_WORDS * 4];
        padded[..INPUT_LEN - FIRST_BLOCK_LEN].copy_from_slice(&input[FIRST_BLOCK_LEN..]);
        padded[INPUT_LEN - FIRST_BLOCK_LEN] = 0x80;

        let mut suffix = [0u32; SUFFIX_WORDS];
        for (i, word) in suffix.iter_mut().enumerate() {
            *word = u32::from_be_bytes(padded[i * 4..i * 4 + 4].try_into().unwrap());
        }

        Task {
            input,
            giver,
            complexity,
            hash_state: verify::midstate(&first_block),
            suffix,
            created_at: Instant::now(),
            target,
            is_devfee,
        }
    }

    /// Assembles the fixed argument buffer for one accelerator dispatch
    ///
    /// Layout: `[iterations, base_offset, hash_state(8), suffix(13)]`.
    /// Only the first 12 suffix words and the final padded word are
    /// passed; words 12 and 13 mirror words 0 and 1 and are folded in
    /// by the kernel itself.
    ///
    /// # Arguments
    /// * `iterations` - Hash attempts per accelerator thread
    /// * `base_offset` - Start of the nonce range being dispatched
    pub fn kernel_args(&self, iterations: u32, base_offset: u32) -> [u32; crate::accel::ARG_WORDS] {
        let mut args = [0u32; crate::accel::ARG_WORDS];
        args[0] = iterations;
        args[1] = base_offset;
        args[2..10].copy_from_slice(&self.hash_state);
        args[10..22].copy_from_slice(&self.suffix[..12]);
        args[22] = self.suffix[14];
        args
    }

    /// Reconstructs the full candidate input for a reported nonce pair
    ///
    /// The accelerator reports each candidate as two words `(a, b)`;
    /// together with the range's base offset they are XOR-folded into
    /// the suffix at fixed word positions (b at 0/12, a at 1/13, the
    /// offset at 2/14), mirroring what the kernel did when it found the
    /// candidate.
    ///
    /// # Arguments
    /// * `a` - First reported word of the pair
    /// * `b` - Second reported word of the pair
    /// * `base_offset` - Base offset of the dispatched range
    ///
    /// # Returns
    /// The complete 123-byte candidate input
    pub fn rebuild_candidate(&self, a: u32, b: u32, base_offset: u32) -> [u8; INPUT_LEN] {
        let mut words = self.suffix;
        words[0] ^= b;
        words[12] ^= b;
        words[1] ^= a;
        words[13] ^= a;
        words[2] ^= base_offset;
        words[14] ^= base_offset;

        let mut candidate = [0u8; INPUT_LEN];
        candidate[..FIRST_BLOCK_LEN].copy_from_slice(&self.input[..FIRST_BLOCK_LEN]);
        let mut bytes = [0u8; SUFFIX_WORDS * 4];
        for (i, word) in words.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        candidate[FIRST_BLOCK_LEN..].copy_from_slice(&bytes[..INPUT_LEN - FIRST_BLOCK_LEN]);
        candidate
    }

    /// Get the age of this task
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// A worker-exclusive slice of the nonce space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce of the range
    pub base: u64,
    /// Number of nonces in the range
    pub size: u64,
}

/// Represents a qualifying candidate ready for submission
#[derive(Debug, Clone)]
pub struct Share {
    /// Reconstructed candidate input
    pub input: [u8; INPUT_LEN],
    /// Giver identifier of the originating task
    pub giver: serde_json::Value,
    /// Recomputed digest of `input`
    pub digest: [u8; 32],
    /// When the originating task was installed
    pub task_created_at: Instant,
    /// Pool/wallet pair this share must be submitted to
    pub target: SubmitTarget,
    /// Whether the originating task was a devfee task
    pub is_devfee: bool,
}

struct Board {
    task: Option<Arc<Task>>,
    cursor: u64,
}

/// Coordinates the current task and nonce distribution across workers
///
/// This is the sole synchronization point between job fetchers and
/// device workers. Replacing the task and allocating a range both take
/// the same exclusive lock, held only for the O(1) bookkeeping.
pub struct Scheduler {
    board: Mutex<Board>,
}

impl Scheduler {
    /// Creates an empty scheduler with no current task
    pub fn new() -> Self {
        Scheduler {
            board: Mutex::new(Board {
                task: None,
                cursor: 0,
            }),
        }
    }

    /// Installs a new task and resets the nonce cursor
    ///
    /// Last writer wins; ranges already allocated from the superseded
    /// task stay valid and their shares keep that task's submit target.
    ///
    /// # Arguments
    /// * `task` - The new task to replace the current one
    pub fn replace(&self, task: Task) {
        let mut board = self.board.lock().unwrap();
        board.task = Some(Arc::new(task));
        board.cursor = 0;
    }

    /// Atomically allocates the next nonce range of the current task
    ///
    /// Captures a snapshot of the task together with the range, so a
    /// concurrent `replace` can never pair a new task with an old
    /// cursor or vice versa. Never blocks beyond the lock itself.
    ///
    /// # Arguments
    /// * `size` - Number of nonces to claim
    ///
    /// # Returns
    /// The task snapshot and the claimed range, or `None` if no task
    /// has been installed yet
    pub fn allocate(&self, size: u64) -> Option<(Arc<Task>, NonceRange)> {
        let mut board = self.board.lock().unwrap();
        let task = board.task.as_ref()?.clone();
        let range = NonceRange {
            base: board.cursor,
            size,
        };
        board.cursor += size;
        Some((task, range))
    }

    /// Age of the current task, or `None` before the first `replace`
    pub fn task_age(&self) -> Option<Duration> {
        let board = self.board.lock().unwrap();
        board.task.as_ref().map(|t| t.age())
    }

    /// Whether a task has ever been installed
    pub fn has_task(&self) -> bool {
        self.board.lock().unwrap().task.is_some()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use url::Url;

    fn dummy_target() -> SubmitTarget {
        SubmitTarget::new(Url::parse("https://pool.example").unwrap(), "wallet")
    }

    fn dummy_task(seed: u8) -> Task {
        let mut input = [0u8; INPUT_LEN];
        for (i, b) in input.iter_mut().enumerate() {
            *b = seed.wrapping_add(i as u8);
        }
        Task::new(
            input,
            serde_json::json!("giver"),
            [0xff; 32],
            dummy_target(),
            false,
        )
    }

    #[test]
    fn allocate_before_first_task_yields_nothing() {
        let scheduler = Scheduler::new();
        assert!(scheduler.allocate(1024).is_none());
        assert!(!scheduler.has_task());
        assert!(scheduler.task_age().is_none());
    }

    #[test]
    fn ranges_form_a_contiguous_prefix() {
        let scheduler = Scheduler::new();
        scheduler.replace(dummy_task(1));

        let mut next = 0u64;
        for size in [256u64, 1024, 64, 4096] {
            let (_, range) = scheduler.allocate(size).unwrap();
            assert_eq!(range.base, next);
            assert_eq!(range.size, size);
            next += size;
        }
    }

    #[test]
    fn concurrent_ranges_are_disjoint() {
        let scheduler = Arc::new(Scheduler::new());
        scheduler.replace(dummy_task(2));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            handles.push(thread::spawn(move || {
                (0..200)
                    .map(|_| scheduler.allocate(512).unwrap().1)
                    .collect::<Vec<_>>()
            }));
        }

        let mut ranges: Vec<NonceRange> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ranges.sort_by_key(|r| r.base);

        let mut next = 0u64;
        for range in ranges {
            // no overlap and no gap: issuance covers a contiguous prefix
            assert_eq!(range.base, next);
            next += range.size;
        }
        assert_eq!(next, 8 * 200 * 512);
    }

    #[test]
    fn replace_resets_the_cursor_and_swaps_fields() {
        let scheduler = Scheduler::new();
        scheduler.replace(dummy_task(3));
        let (first, _) = scheduler.allocate(128).unwrap();
        scheduler.allocate(128).unwrap();

        scheduler.replace(dummy_task(99));
        let (second, range) = scheduler.allocate(128).unwrap();
        assert_eq!(range.base, 0);
        assert_ne!(first.input, second.input);
        assert_ne!(first.hash_state, second.hash_state);
    }

    #[test]
    fn suffix_words_cover_the_padded_tail() {
        let task = dummy_task(7);
        // first suffix word is input[64..68] big-endian
        assert_eq!(
            task.suffix[0],
            u32::from_be_bytes(task.input[64..68].try_into().unwrap())
        );
        // final word holds the last three template bytes and the padding
        let expect = u32::from_be_bytes([task.input[120], task.input[121], task.input[122], 0x80]);
        assert_eq!(task.suffix[14], expect);
    }

    #[test]
    fn kernel_args_layout_is_fixed() {
        let task = dummy_task(5);
        let args = task.kernel_args(8192, 77);
        assert_eq!(args[0], 8192);
        assert_eq!(args[1], 77);
        assert_eq!(&args[2..10], &task.hash_state);
        assert_eq!(&args[10..22], &task.suffix[..12]);
        assert_eq!(args[22], task.suffix[14]);
    }

    #[test]
    fn rebuild_folds_pair_and_offset_at_fixed_positions() {
        let task = dummy_task(11);
        let (a, b, base) = (5u32, 9u32, 256u32);
        let candidate = task.rebuild_candidate(a, b, base);

        assert_eq!(&candidate[..64], &task.input[..64]);
        let word = |i: usize| {
            let mut padded = [0u8; 4];
            let start = 64 + i * 4;
            let end = (start + 4).min(INPUT_LEN);
            padded[..end - start].copy_from_slice(&candidate[start..end]);
            if end - start < 4 {
                padded[end - start] = 0x80;
            }
            u32::from_be_bytes(padded)
        };
        assert_eq!(word(0), task.suffix[0] ^ b);
        assert_eq!(word(12), task.suffix[12] ^ b);
        assert_eq!(word(1), task.suffix[1] ^ a);
        assert_eq!(word(13), task.suffix[13] ^ a);
        assert_eq!(word(2), task.suffix[2] ^ base);
        // word 14 is truncated to three bytes in the candidate; compare those
        let folded = (task.suffix[14] ^ base).to_be_bytes();
        assert_eq!(&candidate[120..123], &folded[..3]);
    }
}
