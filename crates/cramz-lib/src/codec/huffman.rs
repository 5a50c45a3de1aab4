//! Canonical Huffman coding over byte alphabets (CRAM HUFFMAN encoding).
//!
//! The code table is defined entirely by parallel `(value, bit_length)`
//! arrays: symbols are sorted by `(bit_length, value)` and codes assigned
//! consecutively, left-shifting on each length increase. Only the lengths
//! ever travel on the wire, as an ITF-8 serialized descriptor:
//! `[count][value bytes][count][itf8 lengths]`.
//!
//! This codec doubles as the byte-value coder for CHAR-type fragments
//! inside the name tokenizer.

use anyhow::Result;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::codec::primitives::{write_itf8, write_uint7, BitReader, BitWriter, ByteReader};
use crate::error::{invalid_params, malformed};

const MAX_CODE_LEN: u8 = 31;

/// One run of codes sharing a bit length, in canonical order.
#[derive(Debug, Clone, Copy)]
struct LenGroup {
    len: u8,
    first_code: u32,
    first_index: usize,
    count: u32,
}

/// A canonical Huffman code table over byte symbols.
pub struct CanonicalHuffman {
    /// Symbols sorted by `(bit_length, value)`.
    values: Vec<u8>,
    /// Bit lengths parallel to `values`, non-decreasing.
    lengths: Vec<u8>,
    groups: Vec<LenGroup>,
    /// Per-byte `(code, len)`; `len == 0` marks a symbol not in the table.
    enc: Box<[(u32, u8); 256]>,
}

impl CanonicalHuffman {
    /// Build a table from parallel `(values, bit_lengths)` arrays, one entry
    /// per distinct symbol. Fails fast on mismatched arrays, duplicate
    /// symbols, zero/oversized lengths, or a length set whose canonical
    /// assignment overflows (not prefix-decodable).
    pub fn new(values: &[u8], bit_lengths: &[u8]) -> Result<Self> {
        if values.is_empty() {
            return Err(invalid_params("huffman", "empty symbol alphabet"));
        }
        if values.len() != bit_lengths.len() {
            return Err(invalid_params(
                "huffman",
                format!(
                    "{} values but {} bit lengths",
                    values.len(),
                    bit_lengths.len()
                ),
            ));
        }

        let mut pairs: Vec<(u8, u8)> = bit_lengths
            .iter()
            .zip(values.iter())
            .map(|(&l, &v)| (l, v))
            .collect();
        pairs.sort_unstable();

        let mut enc = Box::new([(0u32, 0u8); 256]);
        let mut sorted_values = Vec::with_capacity(pairs.len());
        let mut sorted_lengths = Vec::with_capacity(pairs.len());
        let mut groups: Vec<LenGroup> = Vec::new();
        let mut code: u64 = 0;

        for (i, &(len, value)) in pairs.iter().enumerate() {
            if len == 0 || len > MAX_CODE_LEN {
                return Err(invalid_params(
                    "huffman",
                    format!("bit length {len} for symbol {value} out of range"),
                ));
            }
            if enc[value as usize].1 != 0 {
                return Err(invalid_params(
                    "huffman",
                    format!("duplicate symbol {value}"),
                ));
            }
            if i > 0 {
                let prev_len = pairs[i - 1].0;
                code = (code + 1) << (len - prev_len);
            }
            if code >= 1u64 << len {
                return Err(invalid_params(
                    "huffman",
                    format!("code overflow at symbol {value} (length {len})"),
                ));
            }
            match groups.last_mut() {
                Some(g) if g.len == len => g.count += 1,
                _ => groups.push(LenGroup {
                    len,
                    first_code: code as u32,
                    first_index: i,
                    count: 1,
                }),
            }
            enc[value as usize] = (code as u32, len);
            sorted_values.push(value);
            sorted_lengths.push(len);
        }

        Ok(Self {
            values: sorted_values,
            lengths: sorted_lengths,
            groups,
            enc,
        })
    }

    /// Build the optimal table for `data` (every distinct byte present).
    pub fn from_data(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(invalid_params("huffman", "cannot build table from empty data"));
        }
        let mut counts = [0u64; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        loop {
            let lengths = tree_code_lengths(&counts);
            if lengths.iter().all(|&(_, l)| l <= MAX_CODE_LEN) {
                let values: Vec<u8> = lengths.iter().map(|&(v, _)| v).collect();
                let lens: Vec<u8> = lengths.iter().map(|&(_, l)| l).collect();
                return Self::new(&values, &lens);
            }
            // Pathologically skewed counts can push the tree past the code
            // length bound; halving flattens the distribution until it fits.
            for c in counts.iter_mut() {
                if *c > 0 {
                    *c = (*c + 1) >> 1;
                }
            }
        }
    }

    /// Encode `data` into an MSB-first bit stream, zero-padded to a byte
    /// boundary. The symbol count is not framed here; callers record it.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut w = BitWriter::new();
        for &b in data {
            let (code, len) = self.enc[b as usize];
            if len == 0 {
                return Err(invalid_params(
                    "huffman",
                    format!("symbol {b} not present in code table"),
                ));
            }
            w.write_bits(code as u64, len as u32);
        }
        Ok(w.finish())
    }

    /// Decode exactly `count` symbols from an MSB-first bit stream.
    pub fn decode(&self, data: &[u8], count: usize) -> Result<Vec<u8>> {
        let mut r = BitReader::for_codec(data, "huffman");
        // Each symbol costs at least one bit; reject counts the stream
        // cannot possibly hold before allocating for them.
        if count > data.len() * 8 {
            return Err(malformed(
                "huffman",
                format!("{count} symbols cannot fit in {} bytes", data.len()),
            ));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.decode_one(&mut r)?);
        }
        Ok(out)
    }

    fn decode_one(&self, r: &mut BitReader<'_>) -> Result<u8> {
        let mut code = 0u32;
        let mut len = 0u8;
        for g in &self.groups {
            code = (code << (g.len - len)) | r.read_bits((g.len - len) as u32)? as u32;
            len = g.len;
            if code >= g.first_code && code - g.first_code < g.count {
                return Ok(self.values[g.first_index + (code - g.first_code) as usize]);
            }
        }
        Err(malformed("huffman", "bit pattern matches no code"))
    }

    /// Serialize the `(values, bit_lengths)` descriptor:
    /// `[itf8 count][value bytes][itf8 count][itf8 lengths]`.
    pub fn to_serialized_params(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.values.len() * 2);
        write_itf8(&mut out, self.values.len() as i32);
        out.extend_from_slice(&self.values);
        write_itf8(&mut out, self.lengths.len() as i32);
        for &l in &self.lengths {
            write_itf8(&mut out, l as i32);
        }
        out
    }

    /// Inverse of [`to_serialized_params`]; the whole buffer must be
    /// consumed.
    ///
    /// [`to_serialized_params`]: CanonicalHuffman::to_serialized_params
    pub fn from_serialized_params(data: &[u8]) -> Result<Self> {
        let mut rd = ByteReader::new(data, "huffman");
        let table = Self::read_params(&mut rd)?;
        if rd.remaining() != 0 {
            return Err(malformed("huffman", "trailing bytes after parameters"));
        }
        Ok(table)
    }

    pub(crate) fn read_params(rd: &mut ByteReader<'_>) -> Result<Self> {
        let n_values = rd.itf8()?;
        if !(1..=256).contains(&n_values) {
            return Err(malformed(
                "huffman",
                format!("symbol count {n_values} out of range"),
            ));
        }
        let values = rd.take(n_values as usize)?.to_vec();
        let n_lengths = rd.itf8()?;
        if n_lengths != n_values {
            return Err(malformed(
                "huffman",
                format!("{n_values} values but {n_lengths} lengths"),
            ));
        }
        let mut lengths = Vec::with_capacity(n_lengths as usize);
        for _ in 0..n_lengths {
            let l = rd.itf8()?;
            if !(1..=MAX_CODE_LEN as i32).contains(&l) {
                return Err(malformed("huffman", format!("bit length {l} out of range")));
            }
            lengths.push(l as u8);
        }
        Self::new(&values, &lengths)
    }
}

/// Huffman tree code lengths via a min-heap of merge nodes; returns
/// `(value, length)` pairs for every symbol with a nonzero count. A single
/// distinct symbol gets a one-bit code.
fn tree_code_lengths(counts: &[u64; 256]) -> Vec<(u8, u8)> {
    enum Node {
        Leaf(u8),
        Internal(usize, usize),
    }

    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    let mut nodes: Vec<Node> = Vec::new();
    for b in 0..256 {
        if counts[b] > 0 {
            nodes.push(Node::Leaf(b as u8));
            heap.push(Reverse((counts[b], nodes.len() - 1)));
        }
    }
    if heap.len() == 1 {
        if let Some(Reverse((_, id))) = heap.pop() {
            if let Node::Leaf(v) = nodes[id] {
                return vec![(v, 1)];
            }
        }
    }
    while heap.len() > 1 {
        if let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) {
            nodes.push(Node::Internal(a, b));
            heap.push(Reverse((fa + fb, nodes.len() - 1)));
        }
    }

    let mut out = Vec::new();
    let root = match heap.pop() {
        Some(Reverse((_, id))) => id,
        None => return out,
    };
    let mut stack = vec![(root, 0u8)];
    while let Some((id, depth)) = stack.pop() {
        match nodes[id] {
            Node::Leaf(v) => out.push((v, depth.max(1))),
            Node::Internal(a, b) => {
                stack.push((a, depth + 1));
                stack.push((b, depth + 1));
            }
        }
    }
    out.sort_unstable();
    out
}

// ── block façade framing ───────────────────────────────────────────────────

/// Compress a block: `[uint7 raw_len][serialized table][bit payload]`,
/// building the optimal table from the data itself.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() + 16);
    write_uint7(&mut out, data.len() as u32);
    if data.is_empty() {
        return Ok(out);
    }
    let table = CanonicalHuffman::from_data(data)?;
    out.extend_from_slice(&table.to_serialized_params());
    out.extend_from_slice(&table.encode(data)?);
    Ok(out)
}

/// Inverse of [`compress`].
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut rd = ByteReader::new(data, "huffman");
    let raw_len = rd.uint7()? as usize;
    if raw_len == 0 {
        return Ok(Vec::new());
    }
    let table = CanonicalHuffman::read_params(&mut rd)?;
    let bits = rd.take(rd.remaining())?;
    table.decode(bits, raw_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_alphabet_scenario() {
        // 'A' -> 0, 'B' -> 10, 'C' -> 11.
        let table = CanonicalHuffman::new(&[65, 66, 67], &[1, 2, 2]).unwrap();
        let data = b"ABCAABBCC";
        let bits = table.encode(data).unwrap();
        // 1 + 2 + 2 + 1 + 1 + 2 + 2 + 2 + 2 = 15 bits.
        assert_eq!(bits.len(), 2);
        assert_eq!(table.decode(&bits, data.len()).unwrap(), data);
    }

    #[test]
    fn codes_are_prefix_free() {
        let table =
            CanonicalHuffman::new(&[10, 20, 30, 40, 50, 60], &[2, 2, 3, 4, 4, 4]).unwrap();
        let codes: Vec<(u32, u8)> = table
            .values
            .iter()
            .map(|&v| table.enc[v as usize])
            .collect();
        for (i, &(ci, li)) in codes.iter().enumerate() {
            for (j, &(cj, lj)) in codes.iter().enumerate() {
                if i == j {
                    continue;
                }
                if li <= lj {
                    assert_ne!(ci, cj >> (lj - li), "code {i} prefixes code {j}");
                }
            }
        }
    }

    #[test]
    fn overflowing_lengths_are_rejected() {
        // Three one-bit codes cannot exist.
        assert!(CanonicalHuffman::new(&[1, 2, 3], &[1, 1, 1]).is_err());
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        assert!(CanonicalHuffman::new(&[1, 2], &[1]).is_err());
        assert!(CanonicalHuffman::new(&[], &[]).is_err());
        assert!(CanonicalHuffman::new(&[1, 1], &[1, 2]).is_err());
    }

    #[test]
    fn symbol_missing_from_table_is_an_error() {
        let table = CanonicalHuffman::new(&[65, 66], &[1, 2]).unwrap();
        assert!(table.encode(b"ABX").is_err());
    }

    #[test]
    fn serialized_params_roundtrip() {
        let table = CanonicalHuffman::new(&[7, 200, 33, 90], &[2, 2, 2, 2]).unwrap();
        let params = table.to_serialized_params();
        let back = CanonicalHuffman::from_serialized_params(&params).unwrap();
        let data = [7u8, 200, 33, 90, 7, 7];
        assert_eq!(
            back.decode(&table.encode(&data).unwrap(), data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn from_data_roundtrips() {
        let data = b"abracadabra, a cadaver in abra";
        let table = CanonicalHuffman::from_data(data).unwrap();
        let bits = table.encode(data).unwrap();
        assert_eq!(table.decode(&bits, data.len()).unwrap(), data);
    }

    #[test]
    fn single_symbol_data() {
        let data = b"zzzzzz";
        let table = CanonicalHuffman::from_data(data).unwrap();
        let bits = table.encode(data).unwrap();
        assert_eq!(table.decode(&bits, data.len()).unwrap(), data);
    }

    #[test]
    fn block_framing_roundtrip() {
        for data in [&b""[..], b"q", b"the rain in spain falls mainly on the plain"] {
            let compressed = compress(data).unwrap();
            assert_eq!(uncompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn truncated_block_is_rejected() {
        let compressed = compress(b"some huffman coded payload bytes").unwrap();
        assert!(uncompress(&compressed[..compressed.len() - 2]).is_err());
    }
}
