//! Read-name tokenizer/detokenizer (CRAM block method 7).
//!
//! A batch of read names is decomposed into typed fragments at digit /
//! non-digit boundaries. Each (position, token-type) pair owns an
//! independent byte sub-stream, individually entropy coded; names that are
//! byte-identical to an earlier name collapse to a DUP back-reference, and
//! sub-streams that are byte-identical to an earlier sub-stream are stored
//! as a (position, type) back-reference instead of a second copy.
//!
//! Outer framing:
//!
//! ```text
//! [name_count:i32 LE] [uncompressed_len:i32 LE] [use_arith:u8]
//! then per sub-stream, ordered by (position, type):
//!   [tag:u8 = type | 0x80 (first stream of a new position) | 0x40 (dup)]
//!   dup:        [pos:u8] [type:u8]
//!   otherwise:  [len:uint7] [method:u8] [stream bytes]
//! ```
//!
//! ENDIANNESS HAZARD, LOAD-BEARING: the outer prefix (`name_count`,
//! `uncompressed_len`) is little-endian while everything inside the token
//! streams is big-endian (uint7 lengths, u32 distances and digit values).
//! This asymmetry is part of the on-disk format consumed by existing CRAM
//! files and must never be "fixed".

use anyhow::Result;
use rustc_hash::FxHashMap;
use std::io::Write;
use tracing::debug;

use crate::codec::primitives::{write_uint7, ByteReader};
use crate::codec::{huffman, range, rans};
use crate::error::{invalid_params, malformed};

const N_TYPES: usize = 13;

const TAG_NEW_POSITION: u8 = 0x80;
const TAG_DUP_STREAM: u8 = 0x40;
const TAG_TYPE_MASK: u8 = 0x3f;

/// Per-sub-stream storage methods.
const STORE_RAW: u8 = 0;
const STORE_RANS: u8 = 1;
const STORE_RANGE: u8 = 2;
const STORE_HUFFMAN: u8 = 3;

/// Streams shorter than this never win from entropy coding.
const PACK_THRESHOLD: usize = 16;

/// Digit runs longer than this cannot be held in a u32 and fall back to
/// STRING fragments.
const MAX_DIGIT_RUN: usize = 9;

/// Token types of the name-tokenization format. DUP/DIFF carry only a
/// back-reference distance, END and TYPE carry no value, every other kind
/// carries an actual value (and DELTA/DELTA0 a value relative to the
/// referenced name's fragment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    /// Per-slot type selector stream.
    Type = 0,
    /// Arbitrary text fragment, NUL-terminated in its stream.
    String = 1,
    /// Single byte fragment.
    Char = 2,
    /// Zero-padded digit run; its width lives in the DzLen stream.
    Digits0 = 3,
    /// Width stream for Digits0 fragments.
    DzLen = 4,
    /// Whole name is a copy of an earlier name.
    Dup = 5,
    /// Name is coded fragment-by-fragment against an earlier name.
    Diff = 6,
    /// Digit run without leading zeros, stored as u32.
    Digits = 7,
    /// Small non-negative difference from the referenced digit fragment.
    Delta = 8,
    /// Like Delta for zero-padded digits; width comes from the reference.
    Delta0 = 9,
    /// Fragment identical to the referenced name's fragment.
    Match = 10,
    /// Padding token, no payload.
    Nop = 11,
    /// Terminates a name's fragment list.
    End = 12,
}

impl TokenKind {
    fn from_u8(v: u8) -> Option<Self> {
        use TokenKind::*;
        Some(match v {
            0 => Type,
            1 => String,
            2 => Char,
            3 => Digits0,
            4 => DzLen,
            5 => Dup,
            6 => Diff,
            7 => Digits,
            8 => Delta,
            9 => Delta0,
            10 => Match,
            11 => Nop,
            12 => End,
            _ => return None,
        })
    }
}

// ── encoder ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct DigitRun {
    value: u32,
    width: u8,
    padded: bool,
}

#[derive(Debug, Clone)]
struct EncFrag<'a> {
    bytes: &'a [u8],
    digits: Option<DigitRun>,
}

/// Split a name at digit/non-digit transitions. Digit runs short enough
/// for a u32 become numeric fragments; anything else is kept as text.
fn split_fragments(name: &[u8]) -> Vec<EncFrag<'_>> {
    let mut frags = Vec::new();
    let mut i = 0;
    while i < name.len() {
        let start = i;
        let is_digit = name[i].is_ascii_digit();
        while i < name.len() && name[i].is_ascii_digit() == is_digit {
            i += 1;
        }
        let bytes = &name[start..i];
        let digits = if is_digit && bytes.len() <= MAX_DIGIT_RUN {
            let value = bytes.iter().fold(0u32, |v, &d| v * 10 + (d - b'0') as u32);
            Some(DigitRun {
                value,
                width: bytes.len() as u8,
                padded: bytes[0] == b'0' && bytes.len() > 1,
            })
        } else {
            None
        };
        frags.push(EncFrag { bytes, digits });
    }
    frags
}

struct StreamBuilder {
    streams: Vec<[Vec<u8>; N_TYPES]>,
}

impl StreamBuilder {
    fn new() -> Self {
        Self {
            streams: Vec::new(),
        }
    }

    fn push(&mut self, pos: usize, kind: TokenKind, byte: u8) {
        self.slot(pos)[kind as usize].push(byte);
    }

    fn push_u32_be(&mut self, pos: usize, kind: TokenKind, value: u32) {
        self.slot(pos)[kind as usize].extend_from_slice(&value.to_be_bytes());
    }

    fn slot(&mut self, pos: usize) -> &mut [Vec<u8>; N_TYPES] {
        while self.streams.len() <= pos {
            self.streams.push(std::array::from_fn(|_| Vec::new()));
        }
        &mut self.streams[pos]
    }
}

/// Tokenize and serialize a batch of names. `use_arith` selects the range
/// coder instead of rANS for sub-stream entropy coding.
pub fn encode_names(names: &[&[u8]], use_arith: bool) -> Result<Vec<u8>> {
    let raw_len: usize = names.iter().map(|n| n.len() + 1).sum();
    encode_names_with_len(names, raw_len, use_arith)
}

fn encode_names_with_len(names: &[&[u8]], raw_len: usize, use_arith: bool) -> Result<Vec<u8>> {
    if names.len() > i32::MAX as usize || raw_len > i32::MAX as usize {
        return Err(invalid_params("name-tok", "batch exceeds i32 framing range"));
    }

    let mut b = StreamBuilder::new();
    let mut frag_tables: Vec<Vec<EncFrag<'_>>> = Vec::with_capacity(names.len());
    let mut dup_map: FxHashMap<&[u8], usize> = FxHashMap::default();

    for (n_idx, &name) in names.iter().enumerate() {
        if name.contains(&0) {
            return Err(invalid_params("name-tok", "names must not contain NUL"));
        }

        if let Some(&prev) = dup_map.get(name) {
            b.push(0, TokenKind::Type, TokenKind::Dup as u8);
            b.push_u32_be(0, TokenKind::Dup, (n_idx - prev) as u32);
            frag_tables.push(frag_tables[prev].clone());
            dup_map.insert(name, n_idx);
            continue;
        }

        let dist: u32 = if n_idx == 0 { 0 } else { 1 };
        b.push(0, TokenKind::Type, TokenKind::Diff as u8);
        b.push_u32_be(0, TokenKind::Diff, dist);

        let frags = split_fragments(name);
        if frags.len() + 1 > 255 {
            return Err(invalid_params(
                "name-tok",
                format!("name with {} fragments exceeds the position range", frags.len()),
            ));
        }
        let ref_frags = if dist == 0 {
            None
        } else {
            Some(&frag_tables[n_idx - dist as usize])
        };

        for (fi, frag) in frags.iter().enumerate() {
            let slot = fi + 1;
            let rf = ref_frags.and_then(|r| r.get(fi));
            encode_fragment(&mut b, slot, frag, rf);
        }
        b.push(frags.len() + 1, TokenKind::Type, TokenKind::End as u8);

        frag_tables.push(frags);
        dup_map.insert(name, n_idx);
    }

    serialize_streams(&b.streams, names.len(), raw_len, use_arith)
}

fn encode_fragment(b: &mut StreamBuilder, slot: usize, frag: &EncFrag<'_>, rf: Option<&EncFrag<'_>>) {
    use TokenKind::*;

    if let Some(rf) = rf {
        if rf.bytes == frag.bytes {
            b.push(slot, Type, Match as u8);
            return;
        }
        if let (Some(d), Some(rd)) = (frag.digits, rf.digits) {
            let small_delta = d.value >= rd.value && d.value - rd.value <= 255;
            if !d.padded && !rd.padded && small_delta {
                b.push(slot, Type, Delta as u8);
                b.push(slot, Delta, (d.value - rd.value) as u8);
                return;
            }
            if d.padded && rd.padded && d.width == rd.width && small_delta {
                b.push(slot, Type, Delta0 as u8);
                b.push(slot, Delta0, (d.value - rd.value) as u8);
                return;
            }
        }
    }

    match frag.digits {
        Some(d) if d.padded => {
            b.push(slot, Type, Digits0 as u8);
            b.push_u32_be(slot, Digits0, d.value);
            b.push(slot, DzLen, d.width);
        }
        Some(d) => {
            b.push(slot, Type, Digits as u8);
            b.push_u32_be(slot, Digits, d.value);
        }
        None if frag.bytes.len() == 1 && !frag.bytes[0].is_ascii_digit() => {
            b.push(slot, Type, Char as u8);
            b.push(slot, Char, frag.bytes[0]);
        }
        None => {
            b.push(slot, Type, String as u8);
            b.slot(slot)[String as usize].extend_from_slice(frag.bytes);
            b.push(slot, String, 0);
        }
    }
}

fn serialize_streams(
    streams: &[[Vec<u8>; N_TYPES]],
    n_names: usize,
    raw_len: usize,
    use_arith: bool,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw_len / 2 + 64);
    // Outer prefix is little-endian; everything below it is big-endian.
    out.extend_from_slice(&(n_names as i32).to_le_bytes());
    out.extend_from_slice(&(raw_len as i32).to_le_bytes());
    out.push(use_arith as u8);

    let mut seen: FxHashMap<Vec<u8>, (u8, u8)> = FxHashMap::default();
    let mut n_streams = 0usize;
    let mut n_shared = 0usize;
    for (pos, slots) in streams.iter().enumerate() {
        let mut first = true;
        for (t, stream) in slots.iter().enumerate() {
            if stream.is_empty() {
                continue;
            }
            let mut tag = t as u8;
            if first {
                tag |= TAG_NEW_POSITION;
                first = false;
            }
            n_streams += 1;
            if let Some(&(dp, dt)) = seen.get(stream) {
                out.push(tag | TAG_DUP_STREAM);
                out.push(dp);
                out.push(dt);
                n_shared += 1;
            } else {
                out.push(tag);
                let payload = pack_stream(stream, use_arith, t as u8)?;
                write_uint7(&mut out, payload.len() as u32);
                out.extend_from_slice(&payload);
                seen.insert(stream.clone(), (pos as u8, t as u8));
            }
        }
    }
    debug!(
        names = n_names,
        streams = n_streams,
        shared = n_shared,
        bytes = out.len(),
        "name-tok encode"
    );
    Ok(out)
}

/// Pick a storage method for one sub-stream: raw when entropy coding does
/// not pay, rANS (or the range coder under `use_arith`) otherwise. CHAR
/// streams also try the canonical Huffman byte coder.
fn pack_stream(data: &[u8], use_arith: bool, kind: u8) -> Result<Vec<u8>> {
    let mut best = Vec::with_capacity(data.len() + 1);
    best.push(STORE_RAW);
    best.extend_from_slice(data);
    if data.len() < PACK_THRESHOLD {
        return Ok(best);
    }

    let (method, coded) = if use_arith {
        (STORE_RANGE, range::compress(data)?)
    } else {
        let o0 = rans::compress(data, rans::Order::Zero)?;
        let o1 = rans::compress(data, rans::Order::One)?;
        (STORE_RANS, if o1.len() < o0.len() { o1 } else { o0 })
    };
    if coded.len() + 1 < best.len() {
        best.clear();
        best.push(method);
        best.extend_from_slice(&coded);
    }

    if kind == TokenKind::Char as u8 {
        let coded = huffman::compress(data)?;
        if coded.len() + 1 < best.len() {
            best.clear();
            best.push(STORE_HUFFMAN);
            best.extend_from_slice(&coded);
        }
    }
    Ok(best)
}

// ── decoder ────────────────────────────────────────────────────────────────

fn unpack_stream(payload: &[u8]) -> Result<Vec<u8>> {
    let mut rd = ByteReader::new(payload, "name-tok");
    let method = rd.u8()?;
    let rest = rd.take(rd.remaining())?;
    match method {
        STORE_RAW => Ok(rest.to_vec()),
        STORE_RANS => rans::uncompress(rest),
        STORE_RANGE => range::uncompress(rest),
        STORE_HUFFMAN => huffman::uncompress(rest),
        other => Err(malformed(
            "name-tok",
            format!("unknown sub-stream storage method {other}"),
        )),
    }
}

/// Decoded sub-streams with independent read cursors.
struct StreamSet {
    streams: Vec<[Vec<u8>; N_TYPES]>,
    cursors: Vec<[usize; N_TYPES]>,
}

impl StreamSet {
    fn stream(&mut self, pos: usize, kind: TokenKind) -> Result<(&[u8], &mut usize)> {
        if pos >= self.streams.len() {
            return Err(malformed(
                "name-tok",
                format!("token position {pos} out of range"),
            ));
        }
        Ok((
            &self.streams[pos][kind as usize],
            &mut self.cursors[pos][kind as usize],
        ))
    }

    fn u8(&mut self, pos: usize, kind: TokenKind) -> Result<u8> {
        let (data, cur) = self.stream(pos, kind)?;
        let b = *data.get(*cur).ok_or_else(|| {
            malformed(
                "name-tok",
                format!("sub-stream ({pos}, {kind:?}) exhausted"),
            )
        })?;
        *cur += 1;
        Ok(b)
    }

    // In-stream numeric values are big-endian; see the module-level
    // endianness note.
    fn u32_be(&mut self, pos: usize, kind: TokenKind) -> Result<u32> {
        let (data, cur) = self.stream(pos, kind)?;
        let end = *cur + 4;
        if end > data.len() {
            return Err(malformed(
                "name-tok",
                format!("sub-stream ({pos}, {kind:?}) exhausted"),
            ));
        }
        let v = u32::from_be_bytes([data[*cur], data[*cur + 1], data[*cur + 2], data[*cur + 3]]);
        *cur = end;
        Ok(v)
    }

    fn nul_string(&mut self, pos: usize, kind: TokenKind) -> Result<Vec<u8>> {
        let (data, cur) = self.stream(pos, kind)?;
        let rel = data[*cur..].iter().position(|&b| b == 0).ok_or_else(|| {
            malformed(
                "name-tok",
                format!("unterminated string in sub-stream ({pos}, {kind:?})"),
            )
        })?;
        let out = data[*cur..*cur + rel].to_vec();
        *cur += rel + 1;
        Ok(out)
    }
}

/// One reconstructed fragment, kept for DELTA/MATCH references from later
/// names. The sum type makes "a DELTA against a text fragment" and similar
/// illegal states unrepresentable rather than checked at access time.
#[derive(Debug, Clone)]
enum DecFrag {
    Digits(u32),
    Digits0 { value: u32, width: u8 },
    Text(Vec<u8>),
}

impl DecFrag {
    fn append_to(&self, name: &mut Vec<u8>) -> Result<()> {
        match self {
            DecFrag::Digits(v) => write!(name, "{v}")?,
            DecFrag::Digits0 { value, width } => {
                write!(name, "{:0width$}", value, width = *width as usize)?
            }
            DecFrag::Text(bytes) => name.extend_from_slice(bytes),
        }
        Ok(())
    }
}

/// Detokenize a serialized batch back into names.
pub fn decode_names(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(decode_names_full(data)?.0)
}

fn decode_names_full(data: &[u8]) -> Result<(Vec<Vec<u8>>, usize)> {
    let mut rd = ByteReader::new(data, "name-tok");
    let n_names = rd.i32_le()?;
    let raw_len = rd.i32_le()?;
    if n_names < 0 || raw_len < 0 {
        return Err(malformed("name-tok", "negative count in header"));
    }
    let n_names = n_names as usize;
    let _use_arith = rd.u8()?; // storage methods are self-describing

    let mut streams: Vec<[Vec<u8>; N_TYPES]> = Vec::new();
    let mut pos: isize = -1;
    while rd.remaining() > 0 {
        let tag = rd.u8()?;
        let t = (tag & TAG_TYPE_MASK) as usize;
        if t >= N_TYPES {
            return Err(malformed("name-tok", format!("token type {t} out of range")));
        }
        if tag & TAG_NEW_POSITION != 0 {
            pos += 1;
            if pos > 255 {
                return Err(malformed("name-tok", "more than 256 token positions"));
            }
            streams.push(std::array::from_fn(|_| Vec::new()));
        }
        if pos < 0 {
            return Err(malformed("name-tok", "sub-stream before first position"));
        }
        let p = pos as usize;
        if tag & TAG_DUP_STREAM != 0 {
            let dp = rd.u8()? as usize;
            let dt = rd.u8()? as usize;
            if dt >= N_TYPES || dp >= streams.len() || (dp == p && dt >= t) {
                return Err(malformed(
                    "name-tok",
                    format!("dup sub-stream reference ({dp}, {dt}) invalid"),
                ));
            }
            let shared = streams[dp][dt].clone();
            streams[p][t] = shared;
        } else {
            let len = rd.uint7()? as usize;
            let payload = rd.take(len)?;
            streams[p][t] = unpack_stream(payload)?;
        }
    }

    let cursors = vec![[0usize; N_TYPES]; streams.len()];
    let mut ss = StreamSet { streams, cursors };

    // Capacity capped so a corrupt count cannot demand a giant allocation
    // up front; the vectors still grow to the real size.
    let cap = n_names.min(1 << 20);
    let mut names: Vec<Vec<u8>> = Vec::with_capacity(cap);
    let mut frag_tables: Vec<Vec<DecFrag>> = Vec::with_capacity(cap);

    for i in 0..n_names {
        let t0 = read_kind(&mut ss, 0)?;
        match t0 {
            TokenKind::Dup => {
                let dist = ss.u32_be(0, TokenKind::Dup)? as usize;
                if dist == 0 || dist > i {
                    return Err(malformed(
                        "name-tok",
                        format!("DUP distance {dist} out of range for name {i}"),
                    ));
                }
                let src = i - dist;
                let name = names[src].clone();
                let frags = frag_tables[src].clone();
                names.push(name);
                frag_tables.push(frags);
            }
            TokenKind::Diff => {
                let dist = ss.u32_be(0, TokenKind::Diff)? as usize;
                if dist > i {
                    return Err(malformed(
                        "name-tok",
                        format!("DIFF distance {dist} out of range for name {i}"),
                    ));
                }
                let ref_idx = if dist == 0 { None } else { Some(i - dist) };
                let (name, frags) = decode_diff_name(&mut ss, ref_idx, &frag_tables)?;
                names.push(name);
                frag_tables.push(frags);
            }
            other => {
                return Err(malformed(
                    "name-tok",
                    format!("name {i} starts with {other:?}, expected DUP or DIFF"),
                ));
            }
        }
    }
    Ok((names, raw_len as usize))
}

fn read_kind(ss: &mut StreamSet, pos: usize) -> Result<TokenKind> {
    let b = ss.u8(pos, TokenKind::Type)?;
    TokenKind::from_u8(b)
        .ok_or_else(|| malformed("name-tok", format!("unknown token kind byte {b}")))
}

fn decode_diff_name(
    ss: &mut StreamSet,
    ref_idx: Option<usize>,
    frag_tables: &[Vec<DecFrag>],
) -> Result<(Vec<u8>, Vec<DecFrag>)> {
    use TokenKind::*;

    let mut name = Vec::new();
    let mut frags: Vec<DecFrag> = Vec::new();
    let mut slot = 1usize;
    loop {
        let kind = read_kind(ss, slot)?;
        if kind == End {
            break;
        }
        let rf = ref_idx.and_then(|r| frag_tables[r].get(slot - 1));
        let frag = match kind {
            Char => DecFrag::Text(vec![ss.u8(slot, Char)?]),
            String => DecFrag::Text(ss.nul_string(slot, String)?),
            Digits => DecFrag::Digits(ss.u32_be(slot, Digits)?),
            Digits0 => DecFrag::Digits0 {
                value: ss.u32_be(slot, Digits0)?,
                width: ss.u8(slot, DzLen)?,
            },
            Delta => {
                let d = ss.u8(slot, Delta)? as u32;
                match rf {
                    Some(DecFrag::Digits(v)) => DecFrag::Digits(v.checked_add(d).ok_or_else(
                        || malformed("name-tok", "DELTA overflows the digit value"),
                    )?),
                    _ => {
                        return Err(malformed(
                            "name-tok",
                            format!("DELTA at slot {slot} has no digit reference"),
                        ))
                    }
                }
            }
            Delta0 => {
                let d = ss.u8(slot, Delta0)? as u32;
                match rf {
                    Some(DecFrag::Digits0 { value, width }) => DecFrag::Digits0 {
                        value: value.checked_add(d).ok_or_else(|| {
                            malformed("name-tok", "DELTA0 overflows the digit value")
                        })?,
                        width: *width,
                    },
                    _ => {
                        return Err(malformed(
                            "name-tok",
                            format!("DELTA0 at slot {slot} has no padded-digit reference"),
                        ))
                    }
                }
            }
            Match => match rf {
                Some(f) => f.clone(),
                None => {
                    return Err(malformed(
                        "name-tok",
                        format!("MATCH at slot {slot} has no reference fragment"),
                    ))
                }
            },
            Nop => DecFrag::Text(Vec::new()),
            Type | DzLen | Dup | Diff | End => {
                return Err(malformed(
                    "name-tok",
                    format!("token kind {kind:?} invalid in fragment slot {slot}"),
                ))
            }
        };
        frag.append_to(&mut name)?;
        frags.push(frag);
        slot += 1;
    }
    Ok((name, frags))
}

// ── block façade: NUL-separated name blocks ────────────────────────────────

/// Compress a block of NUL-separated names (trailing NUL optional; the
/// original byte length is recorded so it is restored exactly).
pub fn compress_block(data: &[u8], use_arith: bool) -> Result<Vec<u8>> {
    let names: Vec<&[u8]> = if data.is_empty() {
        Vec::new()
    } else {
        let body = data.strip_suffix(&[0]).unwrap_or(data);
        body.split(|&b| b == 0).collect()
    };
    encode_names_with_len(&names, data.len(), use_arith)
}

/// Inverse of [`compress_block`]: names joined with NUL terminators,
/// trimmed back to the recorded original length.
pub fn uncompress_block(data: &[u8]) -> Result<Vec<u8>> {
    let (names, raw_len) = decode_names_full(data)?;
    let mut out = Vec::with_capacity((raw_len + 1).min(1 << 24));
    for name in &names {
        out.extend_from_slice(name);
        out.push(0);
    }
    if out.len() == raw_len + 1 {
        out.pop();
    }
    if out.len() != raw_len {
        return Err(malformed(
            "name-tok",
            format!(
                "reconstructed {} bytes but header claims {raw_len}",
                out.len()
            ),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(names: &[&str], use_arith: bool) {
        let byte_names: Vec<&[u8]> = names.iter().map(|s| s.as_bytes()).collect();
        let encoded = encode_names(&byte_names, use_arith).unwrap();
        let decoded = decode_names(&encoded).unwrap();
        assert_eq!(decoded.len(), names.len());
        for (got, want) in decoded.iter().zip(names.iter()) {
            assert_eq!(got, want.as_bytes());
        }
    }

    #[test]
    fn representative_batch() {
        roundtrip(&["read1", "read2", "read2", "read10", "read100"], false);
        roundtrip(&["read1", "read2", "read2", "read10", "read100"], true);
    }

    #[test]
    fn zero_padded_widths_survive() {
        // "read001" must not come back as "read1".
        roundtrip(&["read001", "read002", "read010", "read100"], false);
        roundtrip(&["q007", "q007", "q008"], false);
    }

    #[test]
    fn illumina_style_names() {
        roundtrip(
            &[
                "machine:1:flowcell:2101:10000:1000",
                "machine:1:flowcell:2101:10001:1001",
                "machine:1:flowcell:2101:10002:1002",
                "machine:1:flowcell:2101:10002:1002",
                "machine:1:flowcell:2101:10500:990",
            ],
            false,
        );
    }

    #[test]
    fn awkward_shapes() {
        roundtrip(&[""], false);
        roundtrip(&["", ""], false);
        roundtrip(&["x"], false);
        roundtrip(&["123", "abc", "12345678901234567890", "0"], false);
        roundtrip(&["a1b2c3", "a1b2c3d4", "a1b2"], false);
    }

    #[test]
    fn empty_batch() {
        let encoded = encode_names(&[], false).unwrap();
        assert!(decode_names(&encoded).unwrap().is_empty());
    }

    #[test]
    fn large_batch_uses_entropy_coding() {
        let names: Vec<String> = (0..2000).map(|i| format!("sample.{}", i * 3 + 7)).collect();
        let refs: Vec<&[u8]> = names.iter().map(|s| s.as_bytes()).collect();
        for use_arith in [false, true] {
            let encoded = encode_names(&refs, use_arith).unwrap();
            let total: usize = names.iter().map(|n| n.len()).sum();
            assert!(encoded.len() < total, "no compression achieved");
            let decoded = decode_names(&encoded).unwrap();
            assert_eq!(decoded.len(), names.len());
            for (got, want) in decoded.iter().zip(names.iter()) {
                assert_eq!(got, want.as_bytes());
            }
        }
    }

    // Pins the wire format byte-for-byte: little-endian outer prefix,
    // big-endian in-stream values, DUP name back-reference, and a shared
    // (duplicate) sub-stream. Deliberately strict; the asymmetric byte
    // order is required by existing files.
    #[test]
    fn golden_wire_format() {
        let encoded = encode_names(&[b"read1", b"read1"], false).unwrap();
        let expected: Vec<u8> = vec![
            // name_count=2 LE, uncompressed_len=12 LE, use_arith=0
            0x02, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x00,
            // pos 0, TYPE (new position): raw [DIFF, DUP]
            0x80, 0x03, 0x00, 0x06, 0x05,
            // pos 0, DUP: raw, distance 1 big-endian
            0x05, 0x05, 0x00, 0x00, 0x00, 0x00, 0x01,
            // pos 0, DIFF: raw, distance 0 big-endian
            0x06, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
            // pos 1, TYPE: raw [STRING]
            0x80, 0x02, 0x00, 0x01,
            // pos 1, STRING: raw "read\0"
            0x01, 0x06, 0x00, 0x72, 0x65, 0x61, 0x64, 0x00,
            // pos 2, TYPE: raw [DIGITS]
            0x80, 0x02, 0x00, 0x07,
            // pos 2, DIGITS: shared with (pos 0, DUP) - both are 00 00 00 01
            0x47, 0x00, 0x05,
            // pos 3, TYPE: raw [END]
            0x80, 0x02, 0x00, 0x0c,
        ];
        assert_eq!(encoded, expected);
        let decoded = decode_names(&encoded).unwrap();
        assert_eq!(decoded, vec![b"read1".to_vec(), b"read1".to_vec()]);
    }

    #[test]
    fn block_roundtrip_with_and_without_trailing_nul() {
        for data in [
            &b"read1\0read2\0read10\0"[..],
            b"read1\0read2\0read10",
            b"single",
            b"\0",
            b"",
        ] {
            let compressed = compress_block(data, false).unwrap();
            assert_eq!(uncompress_block(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn nul_in_name_is_rejected() {
        assert!(encode_names(&[b"bad\0name"], false).is_err());
    }

    #[test]
    fn malformed_streams_are_rejected() {
        let encoded = encode_names(&[b"read1", b"read2"], false).unwrap();
        // Truncation mid-stream.
        assert!(decode_names(&encoded[..encoded.len() - 3]).is_err());
        // Type byte outside the enum.
        let mut bad = encoded.clone();
        let last = bad.len() - 1;
        bad[last] = 63; // inside the END stream payload
        assert!(decode_names(&bad).is_err());
    }
}
