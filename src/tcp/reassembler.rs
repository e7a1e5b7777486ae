use crate::tcp::byte_stream::ByteStream;
use std::collections::BTreeMap;
use std::io;
use std::io::Read;

/// Accepts substrings at arbitrary stream offsets, possibly out of order and
/// overlapping, and feeds the longest contiguous prefix into an output
/// `ByteStream`.
#[derive(Debug)]
pub struct Reassembler {
    segments: BTreeMap<u64, Vec<u8>>, // buffered out-of-order runs, key = start index
    output: ByteStream,
    next_index: u64,        // next stream offset to deliver
    eof_index: Option<u64>, // total stream length, once known
}

impl Reassembler {
    /// New `Reassembler` with the provided `ByteStream` as output
    pub fn new(output: ByteStream) -> Self {
        Reassembler {
            segments: BTreeMap::new(),
            output,
            next_index: 0,
            eof_index: None,
        }
    }

    /// Insert a substring starting at the absolute stream offset
    /// `first_index`. Bytes already delivered or beyond the output stream's
    /// remaining capacity are discarded; the peer is expected to resend them.
    pub fn insert(&mut self, first_index: u64, data: &[u8], is_last: bool) {
        if is_last {
            self.eof_index = Some(first_index + data.len() as u64);
        }

        // Clip against what has been delivered and what the output can still hold
        let window_end = self.next_index + self.output.available_capacity() as u64;
        let start = first_index.max(self.next_index);
        let end = (first_index + data.len() as u64).min(window_end);

        if start < end {
            let clipped = &data[(start - first_index) as usize..(end - first_index) as usize];
            if start == self.next_index {
                self.deliver(clipped);
            } else {
                self.buffer_segment(start, clipped);
            }
        }

        if self.eof_index == Some(self.next_index) {
            self.output.close();
        }
    }

    /// The total number of bytes pending reassembly in the buffer
    pub fn count_bytes_pending(&self) -> u64 {
        self.segments.values().map(|seg| seg.len() as u64).sum()
    }

    /// The next absolute stream offset the output is waiting for
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// The assembled output stream
    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    /// The assembled output stream, for popping
    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }

    /// Push an in-order run to the output, then absorb any buffered runs the
    /// advancing prefix has reached.
    fn deliver(&mut self, data: &[u8]) {
        let pushed = self.output.push(data);
        self.next_index += pushed as u64;

        while let Some(entry) = self.segments.first_entry() {
            if *entry.key() > self.next_index {
                break; // gap
            }
            let (seg_start, seg) = entry.remove_entry();
            let overlap = (self.next_index - seg_start) as usize;
            if overlap < seg.len() {
                let pushed = self.output.push(&seg[overlap..]);
                self.next_index += pushed as u64;
            }
        }
    }

    /// Buffer a run that cannot be delivered yet, merging it with any runs it
    /// touches or overlaps so the map stays disjoint and non-adjacent.
    fn buffer_segment(&mut self, start: u64, data: &[u8]) {
        let mut start = start;
        let mut merged = data.to_vec();

        // A predecessor run can absorb the front of the new one
        if let Some((&prev_start, prev)) = self.segments.range(..=start).next_back() {
            let prev_end = prev_start + prev.len() as u64;
            if prev_end >= start {
                let mut combined = prev.clone();
                if start + merged.len() as u64 > prev_end {
                    let keep = (prev_end - start) as usize;
                    combined.extend_from_slice(&merged[keep..]);
                }
                self.segments.remove(&prev_start);
                start = prev_start;
                merged = combined;
            }
        }

        // Successor runs within reach get folded into the tail
        let mut end = start + merged.len() as u64;
        while let Some((&seg_start, seg)) = self.segments.range(start..).next() {
            if seg_start > end {
                break;
            }
            let seg_end = seg_start + seg.len() as u64;
            if seg_end > end {
                let keep = (end - seg_start) as usize;
                merged.extend_from_slice(&seg[keep..]);
                end = seg_end;
            }
            self.segments.remove(&seg_start);
        }

        self.segments.insert(start, merged);
    }
}

impl Read for Reassembler {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, RngCore};
    use std::io::Read;

    fn create_reassembler(capacity: usize) -> Reassembler {
        Reassembler::new(ByteStream::new(capacity))
    }

    fn read_all_as_string(reassembler: &mut Reassembler) -> String {
        let mut buf = vec![];
        reassembler.read_to_end(&mut buf).unwrap();
        std::str::from_utf8(&buf).unwrap().to_owned()
    }

    // -- Test insert and capacity --

    #[test]
    fn test_insert_empty_data() {
        let mut ra = create_reassembler(32);
        ra.insert(0, b"", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert!(!ra.output().is_finished());
    }

    #[test]
    fn test_insert_in_order_with_eof() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"abc", false);
        assert_eq!(ra.output().bytes_pushed(), 3);
        assert_eq!(ra.count_bytes_pending(), 0);

        ra.insert(3, b"de", true);
        assert_eq!(ra.output().bytes_pushed(), 5);
        assert_eq!(ra.count_bytes_pending(), 0);

        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcde", actual);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_insert_within_capacity() {
        let mut ra = create_reassembler(5);

        // Insert first
        ra.insert(0, b"Hello", false);
        assert_eq!(ra.output().bytes_pushed(), 5);
        assert_eq!(ra.next_index(), 5);
        assert_eq!(ra.count_bytes_pending(), 0);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("Hello", actual);

        // Insert second
        ra.insert(5, b"World", false);
        assert_eq!(ra.output().bytes_pushed(), 10);
        assert_eq!(ra.next_index(), 10);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("World", actual);

        // Insert third
        ra.insert(10, b"Honda", true);
        assert_eq!(ra.output().bytes_pushed(), 15);
        assert_eq!(ra.next_index(), 15);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("Honda", actual);

        assert!(ra.output().is_closed());
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_insert_beyond_capacity() {
        let mut ra = create_reassembler(5);

        // Insert first
        ra.insert(0, b"Hello", false);
        assert_eq!(ra.output().bytes_pushed(), 5);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Insert second; no-op because capacity exceeded
        ra.insert(5, b"World", true);
        assert_eq!(ra.output().bytes_pushed(), 5);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Read out all data
        let actual = read_all_as_string(&mut ra);
        assert_eq!("Hello", actual);

        // Insert third; success
        ra.insert(5, b"World", true);
        assert_eq!(ra.output().bytes_pushed(), 10);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Read out all data
        let actual = read_all_as_string(&mut ra);
        assert_eq!("World", actual);

        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_capacity_overlapping_inserts() {
        let mut ra = create_reassembler(1);

        // Insert first
        ra.insert(0, b"ab", false);
        assert_eq!(ra.output().bytes_pushed(), 1);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Insert second; no-op because capacity exceeded
        ra.insert(0, b"ab", false);
        assert_eq!(ra.output().bytes_pushed(), 1);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Read out all data
        let actual = read_all_as_string(&mut ra);
        assert_eq!(ra.output().bytes_popped(), 1);
        assert_eq!("a", actual);

        // Insert third
        ra.insert(0, b"abc", false);
        assert_eq!(ra.output().bytes_pushed(), 2);
        assert_eq!(ra.count_bytes_pending(), 0);

        // Read out all data
        let actual = read_all_as_string(&mut ra);
        assert_eq!(ra.output().bytes_popped(), 2);
        assert_eq!("b", actual);
    }

    #[test]
    fn test_insert_last_segment_beyond_capacity() {
        let mut ra = create_reassembler(2);

        ra.insert(1, b"bc", true);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 1);

        ra.insert(0, b"a", false);
        assert_eq!(ra.output().bytes_pushed(), 2);
        assert_eq!(ra.count_bytes_pending(), 0);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("ab", actual);

        ra.insert(1, b"bc", true);
        assert_eq!(ra.output().bytes_pushed(), 3);
        assert_eq!(ra.count_bytes_pending(), 0);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("c", actual);

        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_empty_last_substring_sets_eof() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"abcd", false);
        assert_eq!(ra.output().bytes_pushed(), 4);
        assert!(!ra.output().is_closed());

        ra.insert(4, b"", true);
        assert!(ra.output().is_closed());
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcd", actual);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_insert_junk_after_close() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"abcd", false);
        ra.insert(4, b"efgh", true);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcdefgh", actual);
        assert!(ra.output().is_finished());

        // Nothing gets delivered past the recorded end of stream
        ra.insert(8, b"zzz", false);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("", actual);
    }

    // -- Test sequential --

    #[test]
    fn test_sequential_combined() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"abcd", false);
        assert_eq!(ra.output().bytes_pushed(), 4);

        ra.insert(4, b"efgh", false);
        assert_eq!(ra.output().bytes_pushed(), 8);

        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcdefgh", actual);
    }

    #[test]
    fn test_sequential_immediate_read_loop() {
        let mut ra = create_reassembler(4096);

        for i in 0..100u64 {
            assert_eq!(ra.output().bytes_pushed(), 4 * i);
            ra.insert(4 * i, b"abcd", false);
            let actual = read_all_as_string(&mut ra);
            assert_eq!("abcd", actual);
        }
    }

    // -- Test duplicates --

    #[test]
    fn test_dup_at_same_index() {
        let mut ra = create_reassembler(32);

        // Insert new data
        ra.insert(0, b"abcd", false);
        assert_eq!(ra.output().bytes_pushed(), 4);

        // Read out data
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcd", actual);

        // Insert duplicate data at same index
        ra.insert(0, b"abcd", false);
        assert_eq!(ra.output().bytes_pushed(), 4);

        // Read out data, should be empty string
        let actual = read_all_as_string(&mut ra);
        assert_eq!("", actual);
    }

    #[test]
    fn test_dup_random_indexes() {
        let mut ra = create_reassembler(32);

        let data = b"abcdefgh";

        ra.insert(0, data, false);
        assert_eq!(ra.output().bytes_pushed(), 8);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcdefgh", actual);

        // Perform 1000 random insertions of already-delivered chunks
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let j = rng.gen_range(0..8);
            let k = rng.gen_range(j..8);

            ra.insert(j as u64, &data[j..k], false);
            assert_eq!(ra.output().bytes_pushed(), 8);

            let actual = read_all_as_string(&mut ra);
            assert_eq!("", actual);
            assert!(!ra.output().is_finished());
        }
    }

    #[test]
    fn test_dup_overlapping_segment_beyond_existing_data() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"abcd", false);
        assert_eq!(ra.output().bytes_pushed(), 4);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcd", actual);

        // Insert overlapping data that goes beyond existing data
        ra.insert(0, b"abcdef", false);
        assert_eq!(ra.output().bytes_pushed(), 6);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("ef", actual);
    }

    // -- Test holes --

    #[test]
    fn test_insert_with_initial_gap() {
        let mut ra = create_reassembler(32);

        ra.insert(1, b"b", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 1);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("", actual);
    }

    #[test]
    fn test_fill_gap_with_last() {
        let mut ra = create_reassembler(32);

        ra.insert(1, b"b", true);
        assert_eq!(ra.output().bytes_pushed(), 0);

        ra.insert(0, b"a", false);
        assert_eq!(ra.output().bytes_pushed(), 2);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("ab", actual);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_fill_multiple_gaps_with_chunks() {
        let mut ra = create_reassembler(32);

        ra.insert(1, b"b", false);
        assert_eq!(ra.output().bytes_pushed(), 0);

        ra.insert(3, b"d", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 2);

        ra.insert(0, b"abc", false);
        assert_eq!(ra.output().bytes_pushed(), 4);
        assert_eq!(ra.count_bytes_pending(), 0);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcd", actual);
    }

    // -- Test overlapping segments --

    #[test]
    fn test_overlap_fill_gap() {
        let mut ra = create_reassembler(8);

        ra.insert(0, b"ab", false);
        ra.insert(4, b"ef", false);
        assert_eq!(ra.output().bytes_pushed(), 2);
        assert_eq!(ra.count_bytes_pending(), 2);

        ra.insert(2, b"cdef", false);
        assert_eq!(ra.output().bytes_pushed(), 6);
        assert_eq!(ra.count_bytes_pending(), 0);

        ra.insert(6, b"gh", true);
        assert_eq!(ra.output().bytes_pushed(), 8);

        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcdefgh", actual);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_overlap_extend_after_read() {
        let mut ra = create_reassembler(32);

        ra.insert(0, b"Hello", false);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("Hello", actual);

        ra.insert(0, b"HelloWorld", false);
        assert_eq!(ra.output().bytes_pushed(), 10);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("World", actual);
    }

    #[test]
    fn test_overlap_between_two_pending() {
        let mut ra = create_reassembler(32);

        ra.insert(1, b"bc", false);
        ra.insert(4, b"ef", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 4);

        ra.insert(2, b"cde", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 5);

        // _bc_ef
        // __cde_ (overlap in the middle between two pending)

        ra.insert(0, b"a", false);
        let actual = read_all_as_string(&mut ra);
        assert_eq!("abcdef", actual);
        assert_eq!(ra.output().bytes_pushed(), 6);
        assert_eq!(ra.count_bytes_pending(), 0);
    }

    #[test]
    fn test_overlap_many_pending() {
        let mut ra = create_reassembler(32);

        ra.insert(4, b"efgh", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 4);

        ra.insert(14, b"op", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 6);

        ra.insert(18, b"s", false);
        assert_eq!(ra.output().bytes_pushed(), 0);
        assert_eq!(ra.count_bytes_pending(), 7);

        ra.insert(0, b"a", false);
        assert_eq!(ra.output().bytes_pushed(), 1);
        assert_eq!(ra.count_bytes_pending(), 7);

        ra.insert(0, b"abcde", false);
        assert_eq!(ra.output().bytes_pushed(), 8);
        assert_eq!(ra.count_bytes_pending(), 3);

        ra.insert(14, b"opqrst", false);
        assert_eq!(ra.output().bytes_pushed(), 8);
        assert_eq!(ra.count_bytes_pending(), 6);

        ra.insert(14, b"op", false);
        assert_eq!(ra.output().bytes_pushed(), 8);
        assert_eq!(ra.count_bytes_pending(), 6);

        ra.insert(8, b"ijklmn", false);
        assert_eq!(ra.output().bytes_pushed(), 20);
        assert_eq!(ra.count_bytes_pending(), 0);
    }

    #[test]
    fn test_random_shuffle() {
        let n_reps = 32;
        let n_segs = 128;
        let max_seg_len = 2048;
        let max_offset_shift = 1023; // Maximum shift to introduce overlaps

        let mut rng = rand::thread_rng();
        for _ in 0..n_reps {
            let capacity = n_segs * max_seg_len;
            let mut ra = create_reassembler(capacity);

            let mut segments: Vec<(usize, usize)> = Vec::with_capacity(n_segs);
            let mut total_len = 0;

            // Generate segments with possible overlaps
            for _ in 0..n_segs {
                let seg_len = 1 + rng.gen_range(0..max_seg_len - 1);
                let shift = total_len.min(1 + rng.gen_range(0..max_offset_shift));
                let start = total_len - shift;
                let seg_size = seg_len + shift;
                segments.push((start, seg_size));

                total_len += seg_len;
            }

            // Shuffle segments to simulate out of order receives
            segments.shuffle(&mut rng);

            // Generate random data
            let mut payload = vec![0u8; total_len];
            rng.fill_bytes(&mut payload);

            // Insert each shuffled segment into the Reassembler
            for (start, size) in segments {
                let slice = &payload[start..(start + size)];
                let is_last = start + size == total_len;
                ra.insert(start as u64, slice, is_last);
            }

            // Read out all data
            let mut buf = vec![];
            ra.read_to_end(&mut buf).expect("Read to end failed");
            assert_eq!(payload.len(), buf.len());
            assert_eq!(payload, buf);
        }
    }
}
