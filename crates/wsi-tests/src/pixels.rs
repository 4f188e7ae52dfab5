//! Deterministic RGB8 test patterns.

/// Smooth diagonal gradient, offset by `seed`.
pub fn gradient(width: usize, height: usize, seed: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = ((x + y) * 127 / (width + height).max(1)) as u8;
            out.extend_from_slice(&[r.wrapping_add(seed), g, b.wrapping_add(seed / 2)]);
        }
    }
    out
}

/// Single flat color.
pub fn flat(width: usize, height: usize, rgb: [u8; 3]) -> Vec<u8> {
    rgb.iter().copied().cycle().take(width * height * 3).collect()
}

/// Pseudo-random noise (xorshift), hard to compress.
pub fn noise(width: usize, height: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..width * height * 3)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Mean absolute difference between two equally sized buffers.
pub fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (x as i16 - y as i16).unsigned_abs() as u64)
        .sum();
    total as f64 / a.len().max(1) as f64
}
