//! Resolves an unordered, possibly-overlapping set of chunk spans into an
//! ordered list of non-overlapping [`SpanInfo`]s, each naming every chunk
//! whose data falls within it. Grounded on
//! `original_source/archive/overlap.go`'s `mergeChunksToSpans`.
//!
//! A query over an archive walks chunks in time order; where two chunks'
//! spans overlap, a reader needs to merge records from both for as long as
//! the overlap lasts. This turns the raw chunk set into the minimal
//! sequence of (span, contributing chunks) entries a merge-reader can
//! drive one at a time.

use std::cmp::Ordering;
use zq_core::{Span, Ts};
use zq_stream::Direction;

use crate::chunk::{Chunk, ChunkId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanInfo {
    pub span: Span,
    pub chunks: Vec<Chunk>,
}

fn next_ts(ts: Ts, dir: Direction) -> Ts {
    match dir {
        Direction::Forward => ts.add(1),
        Direction::Reverse => ts.add(-1),
    }
}

fn prev_ts(ts: Ts, dir: Direction) -> Ts {
    match dir {
        Direction::Forward => ts.add(-1),
        Direction::Reverse => ts.add(1),
    }
}

/// A span covering both `x` and `y`, regardless of which is earlier.
fn first_last_to_span(x: Ts, y: Ts) -> Span {
    Span::instant(x).union(&Span::instant(y))
}

fn copy_chunks(src: &[Chunk], skip: &[Chunk]) -> Vec<Chunk> {
    src.iter()
        .filter(|c| !skip.iter().any(|s| s.id == c.id))
        .copied()
        .collect()
}

fn chunk_ts_less(dir: Direction, ts_a: Ts, id_a: ChunkId, ts_b: Ts, id_b: ChunkId) -> Ordering {
    let ord = match dir {
        Direction::Forward => ts_a.cmp(&ts_b),
        Direction::Reverse => ts_b.cmp(&ts_a),
    };
    if ord == Ordering::Equal {
        id_a.cmp(&id_b)
    } else {
        ord
    }
}

/// One boundary timestamp, plus the chunks for which it is a first
/// timestamp and the chunks for which it is a last timestamp.
struct Boundary {
    ts: Ts,
    first_chunks: Vec<Chunk>,
    last_chunks: Vec<Chunk>,
}

/// Sorts the given chunks' first/last timestamps into a single ordered
/// sequence of boundary events, grouping every chunk that shares a
/// timestamp.
fn boundaries(chunks: &[Chunk], dir: Direction) -> Vec<Boundary> {
    struct Point {
        idx: usize,
        is_first: bool,
        ts: Ts,
    }

    let mut points = Vec::with_capacity(2 * chunks.len());
    for (i, c) in chunks.iter().enumerate() {
        points.push(Point { idx: i, is_first: true, ts: c.first });
        points.push(Point { idx: i, is_first: false, ts: c.last });
    }
    points.sort_by(|a, b| chunk_ts_less(dir, a.ts, chunks[a.idx].id, b.ts, chunks[b.idx].id));

    let mut result = Vec::new();
    let mut i = 0;
    while i < points.len() {
        let mut j = i + 1;
        while j < points.len() && points[j].ts == points[i].ts {
            j += 1;
        }
        let mut first_chunks = Vec::new();
        let mut last_chunks = Vec::new();
        for p in &points[i..j] {
            if p.is_first {
                first_chunks.push(chunks[p.idx]);
            } else {
                last_chunks.push(chunks[p.idx]);
            }
        }
        result.push(Boundary { ts: points[i].ts, first_chunks, last_chunks });
        i = j;
    }
    result
}

/// Takes an unordered set of chunks with possibly overlapping spans and
/// returns an ordered list of [`SpanInfo`]s, bounded by `filter`, where
/// each `SpanInfo` names every chunk whose data falls within its span.
pub fn merge_chunks_to_spans(chunks: &[Chunk], dir: Direction, filter: Span) -> Vec<SpanInfo> {
    let mut si_chunks: Vec<Chunk> = Vec::new();
    let mut si_first = Ts(0);
    let mut result = Vec::new();

    for b in boundaries(chunks, dir) {
        if !b.first_chunks.is_empty() {
            if !si_chunks.is_empty() {
                let si_span = first_last_to_span(si_first, prev_ts(b.ts, dir));
                if filter.overlaps(&si_span) {
                    result.push(SpanInfo {
                        span: filter.intersect(&si_span),
                        chunks: copy_chunks(&si_chunks, &[]),
                    });
                }
            }
            si_chunks.extend(b.first_chunks.iter().copied());
            si_first = b.ts;
        }
        if !b.last_chunks.is_empty() {
            let si_span = first_last_to_span(si_first, b.ts);
            if filter.overlaps(&si_span) {
                result.push(SpanInfo {
                    span: filter.intersect(&si_span),
                    chunks: copy_chunks(&si_chunks, &[]),
                });
            }
            si_chunks = copy_chunks(&si_chunks, &b.last_chunks);
            si_first = next_ts(b.ts, dir);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkId;

    fn chunk(id_byte: u8, first: i64, last: i64) -> Chunk {
        let mut bytes = [0u8; 16];
        bytes[0] = id_byte;
        Chunk { id: ChunkId(uuid::Uuid::from_bytes(bytes)), first: Ts(first), last: Ts(last) }
    }

    #[test]
    fn disjoint_chunks_become_separate_spans() {
        let a = chunk(1, 0, 0);
        let b = chunk(2, 1, 1);
        let got = merge_chunks_to_spans(&[a, b], Direction::Forward, zq_core::span::UNBOUNDED);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].span, Span::new(Ts(0), 1));
        assert_eq!(got[0].chunks, vec![a]);
        assert_eq!(got[1].span, Span::new(Ts(1), 1));
        assert_eq!(got[1].chunks, vec![b]);
    }

    #[test]
    fn adjacent_chunks_overlap_by_one_instant() {
        let a = chunk(1, 0, 1);
        let b = chunk(2, 1, 2);
        let got = merge_chunks_to_spans(&[a, b], Direction::Forward, zq_core::span::UNBOUNDED);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].span, Span::new(Ts(0), 1));
        assert_eq!(got[0].chunks, vec![a]);
        assert_eq!(got[1].span, Span::new(Ts(1), 1));
        assert_eq!(got[1].chunks, vec![a, b]);
        assert_eq!(got[2].span, Span::new(Ts(2), 1));
        assert_eq!(got[2].chunks, vec![b]);
    }

    #[test]
    fn one_chunk_fully_contains_another() {
        let a = chunk(1, 0, 3);
        let b = chunk(2, 1, 2);
        let got = merge_chunks_to_spans(&[a, b], Direction::Forward, zq_core::span::UNBOUNDED);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].span, Span::new(Ts(0), 1));
        assert_eq!(got[0].chunks, vec![a]);
        assert_eq!(got[1].span, Span::new(Ts(1), 2));
        assert_eq!(got[1].chunks, vec![a, b]);
        assert_eq!(got[2].span, Span::new(Ts(3), 1));
        assert_eq!(got[2].chunks, vec![a]);
    }

    #[test]
    fn filter_narrows_the_result() {
        let a = chunk(1, 0, 3);
        let b = chunk(2, 1, 2);
        let got = merge_chunks_to_spans(&[a, b], Direction::Forward, Span::new(Ts(1), 2));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].span, Span::new(Ts(1), 2));
        assert_eq!(got[0].chunks, vec![a, b]);
    }

    #[test]
    fn reverse_direction_chunks_in_reverse_time_order() {
        let a = chunk(1, 9, 7);
        let b = chunk(2, 5, 3);
        let got = merge_chunks_to_spans(&[a, b], Direction::Reverse, zq_core::span::UNBOUNDED);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].span, Span::new(Ts(7), 3));
        assert_eq!(got[0].chunks, vec![a]);
        assert_eq!(got[1].span, Span::new(Ts(3), 3));
        assert_eq!(got[1].chunks, vec![b]);
    }

    #[test]
    fn four_chunks_sharing_one_instant_tiebreak_by_id() {
        let a = chunk(1, 0, 0);
        let b = chunk(2, 0, 0);
        let c = chunk(3, 0, 0);
        let d = chunk(4, 0, 0);
        let got = merge_chunks_to_spans(&[b, a, d, c], Direction::Forward, zq_core::span::UNBOUNDED);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].chunks, vec![a, b, c, d]);
    }

    #[test]
    fn empty_input_yields_no_spans() {
        let got = merge_chunks_to_spans(&[], Direction::Forward, zq_core::span::UNBOUNDED);
        assert!(got.is_empty());
    }
}
