/// Integer base 2 logarithm of every byte value, `LG_LUT[0]` is -1.
static LG_LUT: [i8; 256] = {
    let mut lut = [0i8; 256];
    lut[0] = -1;
    let mut i = 1;
    while i < 256 {
        lut[i] = 1 + lut[i / 2];
        i += 1;
    }
    lut
};

fn i_log2(value: u32) -> i32 {
    if value < 256 {
        LG_LUT[value as usize] as i32
    } else if value < 65536 {
        8 + LG_LUT[(value >> 8) as usize] as i32
    } else {
        16 + i_log2(value >> 16)
    }
}

/// Approximate logarithm base 2 scaled by 2^14, linear between powers of two.
///
/// Only defined for `0 < value < 2^15`.
#[inline]
pub(crate) fn n_log2(value: u32) -> i32 {
    debug_assert!(value > 0 && value < 1 << 15);
    let ilog = i_log2(value);
    let norm = (value << (14 - ilog)) as i32;
    ((ilog - 1) << 14) + norm
}
