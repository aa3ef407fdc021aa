//! Fixed-offset big-endian field readers shared by the adapters.
//!
//! Callers validate the payload length before reading, so the slice
//! indexing here cannot go out of bounds.

pub(crate) fn f64_at(buf: &[u8], offset: usize) -> f64 {
    f64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())
}

pub(crate) fn i32_at(buf: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}

pub(crate) fn vec3_at(buf: &[u8], offset: usize) -> [f64; 3] {
    [
        f64_at(buf, offset),
        f64_at(buf, offset + 8),
        f64_at(buf, offset + 16),
    ]
}

pub(crate) fn quat_at(buf: &[u8], offset: usize) -> [f64; 4] {
    [
        f64_at(buf, offset),
        f64_at(buf, offset + 8),
        f64_at(buf, offset + 16),
        f64_at(buf, offset + 24),
    ]
}
