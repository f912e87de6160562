//! Parallel-for over disjoint output partitions
//!
//! With the `rayon` feature, partitions run on the global rayon pool once the
//! buffer reaches `min_len` elements; below that (or without the feature) they
//! run in order on the calling thread. Each callback receives exclusive access
//! to its own partition, so workers never share a write target.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Run `f(start, chunk)` over consecutive `chunk_len`-sized partitions of `data`
///
/// `start` is the index of the partition's first element in `data`.
pub fn for_each_chunk<T, F>(data: &mut [T], chunk_len: usize, min_len: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    let chunk_len = chunk_len.max(1);

    #[cfg(feature = "rayon")]
    if data.len() >= min_len && data.len() > chunk_len {
        data.par_chunks_mut(chunk_len)
            .enumerate()
            .for_each(|(i, chunk)| f(i * chunk_len, chunk));
        return;
    }

    #[cfg(not(feature = "rayon"))]
    let _ = min_len;

    for (i, chunk) in data.chunks_mut(chunk_len).enumerate() {
        f(i * chunk_len, chunk);
    }
}

/// Like [`for_each_chunk`], but partitions a real plane and an optional
/// imaginary plane of equal length in lockstep
pub fn for_each_chunk_pair<T, F>(
    re: &mut [T],
    im: Option<&mut [T]>,
    chunk_len: usize,
    min_len: usize,
    f: F,
) where
    T: Send,
    F: Fn(usize, &mut [T], Option<&mut [T]>) + Send + Sync,
{
    let Some(im) = im else {
        for_each_chunk(re, chunk_len, min_len, |start, chunk| f(start, chunk, None));
        return;
    };
    let chunk_len = chunk_len.max(1);

    #[cfg(feature = "rayon")]
    if re.len() >= min_len && re.len() > chunk_len {
        re.par_chunks_mut(chunk_len)
            .zip(im.par_chunks_mut(chunk_len))
            .enumerate()
            .for_each(|(i, (r, m))| f(i * chunk_len, r, Some(m)));
        return;
    }

    for (i, (r, m)) in re
        .chunks_mut(chunk_len)
        .zip(im.chunks_mut(chunk_len))
        .enumerate()
    {
        f(i * chunk_len, r, Some(m));
    }
}
