//! Adaptive state shared bit for bit by the encoder and the decoder.
use tracing::debug;

use super::{fsm::next_state, lg2::n_log2};
use crate::{Error, Options};

const FNV_PRIME: u32 = 16777619;
const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;

/// Initial LZP cell: state 0xff, predicted symbol 0xb5.
const LZP_CELL_INIT: u16 = 0xffb5;

const SEE_HISTORY_MASK: usize = 15;
const SEE_SIZE: usize = 16 * 256;
/// Probability 0.5 with 15 fractional bits.
const SEE_INIT: u16 = 0x4000;
const SEE_ONE: u32 = 1 << 15;
const SEE_RATE: u32 = 7;

const COST_SCALE: i32 = 7;
/// Average cost of 8 bits per literal scaled by 2^14 and by the moving average window.
const COST_THRESHOLD: i32 = 8 << (COST_SCALE + 14);

/// Hash state after folding in the most recent byte of the context.
static PRECOMPUTED_HASHES: [u32; 256] = {
    let mut hashes = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        hashes[i] = (FNV_OFFSET_BASIS.wrapping_mul(FNV_PRIME) ^ i as u32).wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hashes
};

/// Allocates a table without aborting the process when memory is exhausted.
fn allocate<T: Copy>(len: usize, value: T) -> crate::Result<Vec<T>> {
    let mut table = Vec::new();
    if table.try_reserve_exact(len).is_err() {
        return Err(Error::MemoryAllocation {
            bytes: len.saturating_mul(size_of::<T>()),
        });
    }
    table.resize(len, value);
    Ok(table)
}

/// One LZP model together with its secondary estimation table.
pub(crate) struct Predictor {
    cells: Vec<u16>,
    mask: u32,
    hash: usize,
    see: Vec<u16>,
    history: usize,
}

impl Predictor {
    fn new(mask_size: u32) -> crate::Result<Self> {
        Ok(Self {
            cells: allocate(1 << mask_size, LZP_CELL_INIT)?,
            mask: (1 << mask_size) - 1,
            hash: 0,
            see: allocate(SEE_SIZE, SEE_INIT)?,
            history: 0,
        })
    }

    fn set_hash(&mut self, hash: u32) {
        self.hash = (hash & self.mask) as usize;
    }

    #[inline(always)]
    pub(crate) fn state(&self) -> u8 {
        (self.cells[self.hash] >> 8) as u8
    }

    #[inline(always)]
    pub(crate) fn predicted_symbol(&self) -> u8 {
        self.cells[self.hash] as u8
    }

    /// Stores the symbol that actually followed the context together with the next state.
    #[inline(always)]
    pub(crate) fn update_lzp(&mut self, state: u8, symbol: u8, matched: bool) {
        self.cells[self.hash] = (next_state(state, matched) as u16) << 8 | symbol as u16;
    }

    /// Match probability for `state` in the current history, 15 fractional bits.
    #[inline(always)]
    pub(crate) fn see(&self, state: u8) -> u16 {
        self.see[(self.history << 8) + state as usize]
    }

    #[inline(always)]
    pub(crate) fn update_see_history(&mut self, matched: bool) {
        self.history = ((self.history << 1) + (!matched) as usize) & SEE_HISTORY_MASK;
    }

    pub(crate) fn update_see(&mut self, state: u8, matched: bool) {
        let probability = &mut self.see[(self.history << 8) + state as usize];
        let value = *probability as u32;
        if matched {
            *probability = (value + ((SEE_ONE - value) >> SEE_RATE)) as u16;
        } else {
            *probability = (value - (value >> SEE_RATE)) as u16;
        }
        self.update_see_history(matched);
    }
}

/// Adaptive order-1 or order-2 frequency model for literals.
///
/// Frequencies are kept on three levels: per symbol, per group of 16 symbols and per context, so
/// cumulative frequencies take at most 16 + 16 additions.
pub(crate) struct LiteralCoder {
    single: Vec<u16>,
    grouped: Vec<u16>,
    total: Vec<u16>,
    mask: u64,
    context: usize,
    step: u16,
    limit: u16,
    recent_cost: i32,
    fixed: bool,
}

impl LiteralCoder {
    fn new(order: u32, init: u32, step: u32, limit: u32) -> crate::Result<Self> {
        let mask_size = 8 * order;
        Ok(Self {
            single: allocate(1 << (mask_size + 8), init as u16)?,
            grouped: allocate(1 << (mask_size + 4), (init * 16) as u16)?,
            total: allocate(1 << mask_size, (init * 256) as u16)?,
            mask: (1 << mask_size) - 1,
            context: 0,
            step: step as u16,
            limit: limit as u16,
            recent_cost: COST_THRESHOLD,
            fixed: false,
        })
    }

    /// Selects the frequency block of the last `order` bytes of `context`.
    #[inline(always)]
    pub(crate) fn compute_context(&mut self, context: u64) {
        self.context = (context & self.mask) as usize;
    }

    #[inline(always)]
    pub(crate) fn frequency(&self, symbol: u8) -> u32 {
        self.single[(self.context << 8) + symbol as usize] as u32
    }

    #[inline(always)]
    pub(crate) fn total(&self) -> u32 {
        self.total[self.context] as u32
    }

    /// Sum of the frequencies of all symbols below `symbol`.
    pub(crate) fn cumulative_frequency(&self, symbol: u8) -> u32 {
        let index = (self.context << 8) + symbol as usize;
        let group = index >> 4;
        let groups: u32 = self.grouped[self.context << 4..group]
            .iter()
            .map(|&frequency| frequency as u32)
            .sum();
        let singles: u32 = self.single[group << 4..index]
            .iter()
            .map(|&frequency| frequency as u32)
            .sum();
        groups + singles
    }

    /// Finds the symbol whose cumulative interval contains `target` when `excluded` is removed
    /// from the alphabet. Returns the symbol and the start of its interval, or `None` if `target`
    /// lies beyond the total frequency.
    pub(crate) fn find(&self, target: u32, excluded: u8) -> Option<(u8, u32)> {
        let excluded_frequency = self.frequency(excluded);
        let excluded_group = excluded as usize >> 4;
        let mut remaining = target;

        for group in 0..16 {
            let mut group_frequency = self.grouped[(self.context << 4) + group] as u32;
            if group == excluded_group {
                group_frequency -= excluded_frequency;
            }
            if remaining >= group_frequency {
                remaining -= group_frequency;
                continue;
            }
            for symbol in (group << 4)..(group << 4) + 16 {
                let symbol = symbol as u8;
                let frequency = if symbol == excluded { 0 } else { self.frequency(symbol) };
                if remaining < frequency {
                    return Some((symbol, target - remaining));
                }
                remaining -= frequency;
            }
            return None;
        }

        None
    }

    pub(crate) fn update(&mut self, symbol: u8) {
        let index = (self.context << 8) + symbol as usize;
        self.single[index] += self.step;
        self.grouped[index >> 4] += self.step;
        self.total[self.context] += self.step;
        if self.total[self.context] > self.limit {
            self.rescale();
        }
    }

    /// Halves the frequencies of the current context, rounding up so no symbol drops to zero.
    fn rescale(&mut self) {
        let block = self.context << 8..(self.context + 1) << 8;
        for frequency in &mut self.single[block] {
            *frequency -= *frequency >> 1;
        }
        let mut total = 0;
        for group in self.context << 4..(self.context + 1) << 4 {
            let frequency: u16 = self.single[group << 4..(group + 1) << 4].iter().sum();
            self.grouped[group] = frequency;
            total += frequency;
        }
        self.total[self.context] = total;
    }

    /// Returns `true` while the adaptive model has recently cost more than a flat distribution.
    #[inline(always)]
    pub(crate) fn use_fixed_probabilities(&self) -> bool {
        self.recent_cost > COST_THRESHOLD
    }

    pub(crate) fn update_recent_cost(&mut self, frequency: u32, total: u32) {
        self.recent_cost -= self.recent_cost >> COST_SCALE;
        self.recent_cost += n_log2(total);
        self.recent_cost -= n_log2(frequency);

        let fixed = self.use_fixed_probabilities();
        if fixed != self.fixed {
            self.fixed = fixed;
            debug!(fixed, recent_cost = self.recent_cost, "literal coder mode changed");
        }
    }
}

/// All adaptive state of one coding session.
pub(crate) struct Model {
    pub(crate) low: Predictor,
    /// `None` if both LZP models coincide.
    pub(crate) high: Option<Predictor>,
    pub(crate) literal: LiteralCoder,
    pub(crate) context: u64,
    low_context_length: u32,
    high_context_length: u32,
}

impl Model {
    pub(crate) fn new(options: &Options) -> crate::Result<Self> {
        let low = Predictor::new(options.lzp_low_mask_size())?;
        let high = if options.only_low_lzp() {
            None
        } else {
            Some(Predictor::new(options.lzp_high_mask_size())?)
        };
        let literal = LiteralCoder::new(
            options.literal_coder_order(),
            options.literal_coder_init(),
            options.literal_coder_step(),
            options.literal_coder_limit(),
        )?;

        debug!(
            %options,
            only_low_lzp = high.is_none(),
            lzp_low_cells = low.cells.len(),
            lzp_high_cells = high.as_ref().map_or(0, |high| high.cells.len()),
            literal_cells = literal.single.len(),
            "model allocated"
        );

        Ok(Self {
            low,
            high,
            literal,
            context: 0,
            low_context_length: options.lzp_low_context_length(),
            high_context_length: options.lzp_high_context_length(),
        })
    }

    /// Shifts `symbol` into the rolling context of the last eight bytes.
    #[inline(always)]
    pub(crate) fn update_context(&mut self, symbol: u8) {
        self.context = self.context << 8 | symbol as u64;
    }

    /// Folds the most recent bytes into the low hash and keeps folding for the high hash.
    pub(crate) fn compute_hashes(&mut self) {
        let mut local_context = self.context >> 8;
        let mut hash = PRECOMPUTED_HASHES[(self.context & 0xff) as usize];
        let mut i = 1;
        loop {
            hash ^= (local_context & 0xff) as u32;
            local_context >>= 8;
            i += 1;
            if i == self.low_context_length {
                break;
            }
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        self.low.set_hash(hash);

        if let Some(high) = &mut self.high {
            while i < self.high_context_length {
                i += 1;
                hash = hash.wrapping_mul(FNV_PRIME);
                hash ^= (local_context & 0xff) as u32;
                local_context >>= 8;
            }
            high.set_hash(hash);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{allocate, LiteralCoder, Model, Predictor, LZP_CELL_INIT, SEE_INIT, SEE_ONE};
    use crate::{Error, Options};

    fn small_options() -> Options {
        Options::new(3, 16, 6, 17, 2, 1, 60, 30000).unwrap()
    }

    fn assert_frequency_invariant(coder: &LiteralCoder) {
        let context = coder.context;
        let mut total = 0u32;
        for group in context << 4..(context + 1) << 4 {
            let sum: u32 = coder.single[group << 4..(group + 1) << 4]
                .iter()
                .map(|&frequency| frequency as u32)
                .sum();
            assert_eq!(coder.grouped[group] as u32, sum);
            total += sum;
        }
        assert_eq!(coder.total[context] as u32, total);
    }

    #[test]
    fn fresh_predictor_uses_sentinel_cells() {
        let predictor = Predictor::new(15).unwrap();
        assert!(predictor.cells.iter().all(|&cell| cell == LZP_CELL_INIT));
        assert_eq!(predictor.state(), 0xff);
        assert_eq!(predictor.predicted_symbol(), 0xb5);
        assert_eq!(predictor.see(0xff), SEE_INIT);
    }

    #[test]
    fn lzp_cell_remembers_last_symbol() {
        let mut predictor = Predictor::new(15).unwrap();
        predictor.set_hash(1234);
        let state = predictor.state();
        predictor.update_lzp(state, b'x', false);
        assert_eq!(predictor.predicted_symbol(), b'x');
        let state = predictor.state();
        predictor.update_lzp(state, b'y', false);
        assert_eq!(predictor.predicted_symbol(), b'y');
        let state = predictor.state();
        predictor.update_lzp(state, b'y', true);
        assert_eq!(predictor.predicted_symbol(), b'y');
    }

    #[test]
    fn see_saturates_without_reaching_bounds() {
        let mut predictor = Predictor::new(15).unwrap();
        for _ in 0..10_000 {
            predictor.update_see(7, true);
        }
        let high = predictor.see(7) as u32;
        assert!(high < SEE_ONE);
        assert!(high > SEE_ONE - 256);

        for _ in 0..10_000 {
            predictor.update_see(7, false);
        }
        let low = predictor.see(7);
        assert!(low > 0);
        assert!(low < 256);
    }

    #[test]
    fn see_history_keeps_four_outcomes() {
        let mut predictor = Predictor::new(15).unwrap();
        for _ in 0..8 {
            predictor.update_see_history(false);
        }
        assert_eq!(predictor.history, 15);
        predictor.update_see_history(true);
        assert_eq!(predictor.history, 14);
    }

    #[test]
    fn frequency_invariant_survives_rescaling() {
        let mut coder = LiteralCoder::new(1, 1, 60, 30000).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        coder.compute_context(0x41);
        for _ in 0..5_000 {
            coder.update(rng.u8(..));
            assert_frequency_invariant(&coder);
            assert!(coder.total() <= 30000);
        }
        for symbol in 0..=255 {
            assert!(coder.frequency(symbol) > 0);
        }
    }

    #[test]
    fn cumulative_frequency_matches_find() {
        let mut coder = LiteralCoder::new(2, 3, 17, 20000).unwrap();
        coder.compute_context(0x1234);
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..3_000 {
            coder.update(rng.u8(..));
        }
        let excluded = 0x42;
        let excluded_frequency = coder.frequency(excluded);
        for symbol in (0..=255u8).filter(|&symbol| symbol != excluded) {
            let mut start = coder.cumulative_frequency(symbol);
            if symbol > excluded {
                start -= excluded_frequency;
            }
            for target in [start, start + coder.frequency(symbol) - 1] {
                assert_eq!(coder.find(target, excluded), Some((symbol, start)));
            }
        }
        assert_eq!(coder.find(coder.total() - excluded_frequency, excluded), None);
    }

    #[test]
    fn recent_cost_switches_to_fixed_mode() {
        let mut coder = LiteralCoder::new(1, 1, 1, 256).unwrap();
        assert!(!coder.use_fixed_probabilities());
        for _ in 0..2_000 {
            coder.update_recent_cost(1, 30000);
        }
        assert!(coder.use_fixed_probabilities());
        for _ in 0..2_000 {
            coder.update_recent_cost(256, 256);
        }
        assert!(!coder.use_fixed_probabilities());
    }

    #[test]
    fn hashes_depend_only_on_context_length() {
        let mut model = Model::new(&small_options()).unwrap();
        for &byte in b"0123456789" {
            model.update_context(byte);
        }
        model.compute_hashes();
        let (low, high) = (model.low.hash, model.high.as_ref().unwrap().hash);

        // bytes older than the high context length do not matter
        model.context = (model.context & 0xffff_ffff_ffff) | 0xabcd << 48;
        model.compute_hashes();
        assert_eq!(model.low.hash, low);
        assert_eq!(model.high.as_ref().unwrap().hash, high);

        // a byte inside the high but outside the low context only moves the high hash
        model.context ^= 0x10 << 32;
        model.compute_hashes();
        assert_eq!(model.low.hash, low);
        assert_ne!(model.high.as_ref().unwrap().hash, high);
    }

    #[test]
    fn only_low_lzp_skips_high_tables() {
        let options = Options::new(4, 16, 4, 16, 2, 1, 60, 30000).unwrap();
        let model = Model::new(&options).unwrap();
        assert!(model.high.is_none());
    }

    #[test]
    fn allocation_failure_is_reported() {
        assert!(matches!(
            allocate::<u16>(usize::MAX / 2, 0),
            Err(Error::MemoryAllocation { .. })
        ));
    }
}
