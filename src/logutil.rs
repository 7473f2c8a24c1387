//! Logging helpers for byte-oriented data so log lines stay short and single-line.

/// Hex-encode at most `max` bytes of `data`, appending `…(+N)` when bytes were left out.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    use std::fmt::Write;
    let shown = data.len().min(max);
    let mut out = String::with_capacity(shown * 2 + 8);
    for b in &data[..shown] {
        let _ = write!(&mut out, "{:02x}", b);
    }
    if data.len() > shown {
        let _ = write!(&mut out, "…(+{})", data.len() - shown);
    }
    out
}
