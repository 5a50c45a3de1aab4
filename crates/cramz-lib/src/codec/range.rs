//! Adaptive range coder (CRAM block method 6, "adaptive arithmetic").
//!
//! LZMA-style carry-less range coder: 32-bit range, 64-bit low with a
//! cache byte for carry propagation, byte-wise renormalization at
//! `RC_TOP`. Symbol statistics are adaptive cumulative-frequency models
//! over the byte alphabet, either global (order-0) or conditioned on the
//! previous byte (order-1).
//!
//! Wire format: `[flags:u8] [raw_len:uint7] [payload]`. The flag byte is
//! embedded in the stream so compress and decompress can never disagree on
//! the coder variant. Supported bits: `0x01` = order-1 contexts, `0x20` =
//! CAT (payload stored verbatim). The remaining bits of the adaptive
//! arithmetic format (EXT 0x04, STRIPE 0x08, NOSZ 0x10, RLE 0x40, PACK
//! 0x80) are recognized and reported as unsupported, which keeps "this
//! variant isn't built" distinct from "this stream is broken".

use anyhow::Result;
use tracing::debug;

use crate::codec::primitives::{write_uint7, ByteReader};
use crate::error::{malformed, unsupported};

/// Order-1 context modelling.
pub const FLAG_ORDER1: u8 = 0x01;
/// Payload is stored uncompressed.
pub const FLAG_CAT: u8 = 0x20;

const FLAG_EXT: u8 = 0x04;
const FLAG_STRIPE: u8 = 0x08;
const FLAG_NOSZ: u8 = 0x10;
const FLAG_RLE: u8 = 0x40;
const FLAG_PACK: u8 = 0x80;

const RC_TOP: u32 = 1 << 24;

/// Adaptive model increment per observed symbol.
const MODEL_STEP: u32 = 32;
/// Halve all model frequencies once the total reaches this bound; keeps
/// `range / total` well above zero.
const MODEL_RESCALE: u32 = 1 << 16;

/// Entropy coding below this size cannot recover the model warm-up cost.
const CAT_THRESHOLD: usize = 32;

// ── range coder core ───────────────────────────────────────────────────────

struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u32,
    output: Vec<u8>,
}

impl RangeEncoder {
    fn new() -> Self {
        Self {
            low: 0,
            range: 0xffff_ffff,
            cache: 0,
            cache_size: 1,
            output: Vec::new(),
        }
    }

    #[inline(always)]
    fn shift_low(&mut self) {
        let low_hi = (self.low >> 32) as u8;
        if low_hi != 0 || (self.low as u32) < 0xff00_0000 {
            let mut byte = self.cache;
            loop {
                self.output.push(byte.wrapping_add(low_hi));
                byte = 0xff;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = ((self.low >> 24) & 0xff) as u8;
        }
        self.cache_size += 1;
        self.low = ((self.low as u32) << 8) as u64;
    }

    #[inline(always)]
    fn encode(&mut self, cum: u32, freq: u32, total: u32) {
        let r = self.range / total;
        self.low += cum as u64 * r as u64;
        if cum + freq < total {
            self.range = r * freq;
        } else {
            self.range -= r * cum;
        }
        while self.range < RC_TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.output
    }
}

struct RangeDecoder<'a> {
    range: u32,
    code: u32,
    input: &'a [u8],
    pos: usize,
}

impl<'a> RangeDecoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        let mut dec = Self {
            range: 0xffff_ffff,
            code: 0,
            input,
            pos: 0,
        };
        // The encoder's initial cache always lands a leading 0x00 byte.
        if !input.is_empty() {
            dec.pos = 1;
        }
        for _ in 0..4 {
            dec.code = (dec.code << 8) | dec.next_byte() as u32;
        }
        dec
    }

    #[inline(always)]
    fn next_byte(&mut self) -> u8 {
        if self.pos < self.input.len() {
            let b = self.input[self.pos];
            self.pos += 1;
            b
        } else {
            0
        }
    }

    #[inline(always)]
    fn decode(&mut self, cum_freqs: &[u32], total: u32) -> usize {
        let r = self.range / total;
        let offset = (self.code / r).min(total - 1);

        let mut sym = 0;
        while sym + 2 < cum_freqs.len() && cum_freqs[sym + 1] <= offset {
            sym += 1;
        }

        let cum = cum_freqs[sym];
        let freq = cum_freqs[sym + 1] - cum;

        self.code -= cum * r;
        if cum + freq < total {
            self.range = r * freq;
        } else {
            self.range -= r * cum;
        }
        while self.range < RC_TOP {
            self.code = (self.code << 8) | self.next_byte() as u32;
            self.range <<= 8;
        }
        sym
    }
}

// ── adaptive byte model ────────────────────────────────────────────────────

struct AdaptiveModel {
    /// 257 entries, `cum_freqs[0] == 0`, `cum_freqs[256] == total`.
    cum_freqs: Vec<u32>,
    total: u32,
}

impl AdaptiveModel {
    fn new() -> Self {
        Self {
            cum_freqs: (0..=256u32).collect(),
            total: 256,
        }
    }

    #[inline(always)]
    fn encode(&mut self, enc: &mut RangeEncoder, sym: usize) {
        let cum = self.cum_freqs[sym];
        let freq = self.cum_freqs[sym + 1] - cum;
        enc.encode(cum, freq, self.total);
        self.update(sym);
    }

    #[inline(always)]
    fn decode(&mut self, dec: &mut RangeDecoder) -> usize {
        let sym = dec.decode(&self.cum_freqs, self.total);
        self.update(sym);
        sym
    }

    #[inline(always)]
    fn update(&mut self, sym: usize) {
        for c in &mut self.cum_freqs[sym + 1..] {
            *c += MODEL_STEP;
        }
        self.total += MODEL_STEP;
        if self.total >= MODEL_RESCALE {
            self.rescale();
        }
    }

    fn rescale(&mut self) {
        let mut cum = 0u32;
        for i in 0..256 {
            let freq = self.cum_freqs[i + 1] - self.cum_freqs[i];
            let new_freq = (freq >> 1).max(1);
            self.cum_freqs[i] = cum;
            cum += new_freq;
        }
        self.cum_freqs[256] = cum;
        self.total = cum;
    }
}

// ── public API ─────────────────────────────────────────────────────────────

/// Compress, choosing the cheapest of CAT / order-0 / order-1 and embedding
/// the choice in the flag byte.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < CAT_THRESHOLD {
        return compress_with_flags(data, FLAG_CAT);
    }
    let o0 = compress_with_flags(data, 0)?;
    let o1 = compress_with_flags(data, FLAG_ORDER1)?;
    let best = if o1.len() < o0.len() { o1 } else { o0 };
    if best.len() >= data.len() + 2 {
        return compress_with_flags(data, FLAG_CAT);
    }
    debug!(
        flags = best[0],
        raw = data.len(),
        compressed = best.len(),
        "range compress"
    );
    Ok(best)
}

/// Compress with an explicit flag byte (`FLAG_ORDER1` and/or `FLAG_CAT`).
pub fn compress_with_flags(data: &[u8], flags: u8) -> Result<Vec<u8>> {
    check_flags(flags)?;
    let mut out = Vec::with_capacity(data.len() + 16);
    out.push(flags);
    write_uint7(&mut out, data.len() as u32);
    if flags & FLAG_CAT != 0 || data.is_empty() {
        // Normalize: an empty payload is always stored as CAT.
        out[0] = FLAG_CAT;
        out.extend_from_slice(data);
        return Ok(out);
    }

    let mut enc = RangeEncoder::new();
    if flags & FLAG_ORDER1 != 0 {
        let mut models: Vec<AdaptiveModel> = (0..256).map(|_| AdaptiveModel::new()).collect();
        let mut ctx = 0usize;
        for &b in data {
            models[ctx].encode(&mut enc, b as usize);
            ctx = b as usize;
        }
    } else {
        let mut model = AdaptiveModel::new();
        for &b in data {
            model.encode(&mut enc, b as usize);
        }
    }
    out.extend_from_slice(&enc.finish());
    Ok(out)
}

/// Decompress a stream produced by [`compress`]; the coder variant is read
/// from the embedded flag byte.
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut rd = ByteReader::new(data, "range");
    let flags = rd.u8()?;
    check_flags(flags)?;
    let raw_len = rd.uint7()? as usize;
    if raw_len == 0 {
        return Ok(Vec::new());
    }

    if flags & FLAG_CAT != 0 {
        return Ok(rd.take(raw_len)?.to_vec());
    }

    let payload = rd.take(rd.remaining())?;
    // Leading cache byte plus the four code bytes is the minimum any
    // non-empty range-coded payload can occupy.
    if payload.len() < 5 {
        return Err(malformed("range", "payload shorter than coder preamble"));
    }
    // The adaptive model floors symbol cost near 0.005 bits, so a ratio
    // past 4096x cannot come from this encoder. Bounds the work and the
    // allocation a corrupt header can demand.
    if raw_len / 4096 > payload.len() {
        return Err(malformed(
            "range",
            format!("claimed length {raw_len} implausible for {} payload bytes", payload.len()),
        ));
    }
    let mut dec = RangeDecoder::new(payload);
    let mut out = Vec::with_capacity(raw_len);
    if flags & FLAG_ORDER1 != 0 {
        let mut models: Vec<AdaptiveModel> = (0..256).map(|_| AdaptiveModel::new()).collect();
        let mut ctx = 0usize;
        for _ in 0..raw_len {
            let sym = models[ctx].decode(&mut dec);
            out.push(sym as u8);
            ctx = sym;
        }
    } else {
        let mut model = AdaptiveModel::new();
        for _ in 0..raw_len {
            out.push(model.decode(&mut dec) as u8);
        }
    }
    Ok(out)
}

fn check_flags(flags: u8) -> Result<()> {
    let unimplemented = [
        (FLAG_EXT, "EXT"),
        (FLAG_STRIPE, "STRIPE"),
        (FLAG_NOSZ, "NOSZ"),
        (FLAG_RLE, "RLE"),
        (FLAG_PACK, "PACK"),
    ];
    for (bit, name) in unimplemented {
        if flags & bit != 0 {
            return Err(unsupported(format!("range coder flag {name} (0x{bit:02x})")));
        }
    }
    Ok(())
}
