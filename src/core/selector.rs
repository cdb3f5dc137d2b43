/// Indices picked by [`select_frames`] for a buffer of `len` frames.
///
/// Walks the buffer with stride `len / target_count` and stops once
/// `target_count` indices are collected, so when `len` is not a multiple of
/// the stride the tail of the buffer is never reached.
pub fn select_indices(len: usize, target_count: usize) -> Vec<usize> {
    if target_count == 0 {
        return Vec::new();
    }
    if len <= target_count {
        return (0..len).collect();
    }

    let stride = len / target_count;
    (0..len).step_by(stride).take(target_count).collect()
}

/// Reduce an ordered frame sequence to at most `target_count` entries,
/// spread over the sequence. Buffers no larger than the target come back
/// unchanged.
pub fn select_frames<T: Clone>(frames: &[T], target_count: usize) -> Vec<T> {
    select_indices(frames.len(), target_count)
        .into_iter()
        .map(|i| frames[i].clone())
        .collect()
}
