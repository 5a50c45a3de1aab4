//! Golomb / Golomb-Rice coding (legacy CRAM GOLOMB encoding).
//!
//! Splits `value + offset` into a unary-coded quotient (1-bits terminated
//! by a 0-bit) and a truncated-binary remainder: with `b = ceil(log2 m)`
//! and `cutoff = 2^b - m`, remainders below the cutoff take `b - 1` bits,
//! the rest are stored as `r + cutoff` in `b` bits. When `m` is a power of
//! two the cutoff is zero and this degenerates to plain Rice coding.
//!
//! This encoding is retained for backward compatibility with old CRAM
//! files; new writers should prefer the entropy coders. It must stay
//! bit-exact regardless.

use anyhow::Result;

use crate::codec::primitives::{write_itf8, write_uint7, BitReader, BitWriter, ByteReader};
use crate::error::{invalid_params, malformed};

/// Decode guard: a unary quotient beyond this is corruption, not data.
const MAX_QUOTIENT: i64 = 1 << 32;

/// A `(m, offset)`-parameterized Golomb codec over signed 64-bit values.
/// Parameters are fixed at construction; instances are immutable and safe
/// to share across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GolombCodec {
    m: i64,
    offset: i64,
    ceil_bits: u32,
    cutoff: i64,
}

impl GolombCodec {
    /// Create a codec with divisor `m >= 2` and value shift `offset`.
    pub fn new(m: i64, offset: i64) -> Result<Self> {
        if m < 2 {
            return Err(invalid_params("golomb", format!("m must be >= 2, got {m}")));
        }
        if m > i32::MAX as i64 {
            return Err(invalid_params(
                "golomb",
                format!("m {m} exceeds the serializable (ITF-8) range"),
            ));
        }
        let ceil_bits = 64 - ((m - 1) as u64).leading_zeros();
        Ok(Self {
            m,
            offset,
            ceil_bits,
            cutoff: (1i64 << ceil_bits) - m,
        })
    }

    /// Divisor `m`.
    pub fn m(&self) -> i64 {
        self.m
    }

    /// Value shift applied before encoding.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Encode one value, returning the number of bits written.
    pub fn write(&self, w: &mut BitWriter, value: i64) -> Result<u32> {
        let n = self.shifted(value)?;
        let q = self.quotient(n)?;
        let r = n % self.m;
        for _ in 0..q {
            w.write_bit(true);
        }
        w.write_bit(false);
        let mut bits = q as u32 + 1;
        if r < self.cutoff {
            w.write_bits(r as u64, self.ceil_bits - 1);
            bits += self.ceil_bits - 1;
        } else {
            w.write_bits((r + self.cutoff) as u64, self.ceil_bits);
            bits += self.ceil_bits;
        }
        Ok(bits)
    }

    /// Decode one value.
    pub fn read(&self, r: &mut BitReader<'_>) -> Result<i64> {
        let mut q: i64 = 0;
        while r.read_bit()? {
            q += 1;
            if q > MAX_QUOTIENT {
                return Err(malformed("golomb", "unary quotient exceeds sanity bound"));
            }
        }
        let head = r.read_bits(self.ceil_bits - 1)? as i64;
        let rem = if head < self.cutoff {
            head
        } else {
            head * 2 + r.read_bit()? as i64 - self.cutoff
        };
        q.checked_mul(self.m)
            .and_then(|v| v.checked_add(rem))
            .and_then(|v| v.checked_sub(self.offset))
            .ok_or_else(|| malformed("golomb", "decoded value overflows i64"))
    }

    /// Exact bit cost of encoding `value`, matching [`GolombCodec::write`].
    pub fn number_of_bits(&self, value: i64) -> Result<u32> {
        let n = self.shifted(value)?;
        let q = self.quotient(n)? as u32;
        let r = n % self.m;
        Ok(q + 1 + if r < self.cutoff {
            self.ceil_bits - 1
        } else {
            self.ceil_bits
        })
    }

    fn quotient(&self, n: i64) -> Result<i64> {
        let q = n / self.m;
        if q > 1 << 30 {
            return Err(invalid_params(
                "golomb",
                format!("unary quotient {q} too large; m {} is a poor fit", self.m),
            ));
        }
        Ok(q)
    }

    fn shifted(&self, value: i64) -> Result<i64> {
        let n = value.checked_add(self.offset).ok_or_else(|| {
            invalid_params("golomb", format!("value {value} + offset overflows"))
        })?;
        if n < 0 {
            return Err(invalid_params(
                "golomb",
                format!("value {value} + offset {} is negative", self.offset),
            ));
        }
        Ok(n)
    }

    /// Serialize `(offset, m)` as two ITF-8 values, the descriptor order of
    /// the CRAM GOLOMB encoding.
    pub fn to_serialized_params(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10);
        write_itf8(&mut out, self.offset as i32);
        write_itf8(&mut out, self.m as i32);
        out
    }

    /// Inverse of [`GolombCodec::to_serialized_params`]; the whole buffer
    /// must be consumed.
    pub fn from_serialized_params(data: &[u8]) -> Result<Self> {
        let mut rd = ByteReader::new(data, "golomb");
        let codec = Self::read_params(&mut rd)?;
        if rd.remaining() != 0 {
            return Err(malformed("golomb", "trailing bytes after parameters"));
        }
        Ok(codec)
    }

    pub(crate) fn read_params(rd: &mut ByteReader<'_>) -> Result<Self> {
        let offset = rd.itf8()? as i64;
        let m = rd.itf8()? as i64;
        Self::new(m, offset)
    }
}

// ── block façade framing ───────────────────────────────────────────────────

/// Compress a block of byte values:
/// `[itf8 offset][itf8 m][uint7 raw_len][bit payload]`.
pub fn compress(data: &[u8], m: i64, offset: i64) -> Result<Vec<u8>> {
    let codec = GolombCodec::new(m, offset)?;
    let mut out = codec.to_serialized_params();
    write_uint7(&mut out, data.len() as u32);
    let mut w = BitWriter::new();
    for &b in data {
        codec.write(&mut w, b as i64)?;
    }
    out.extend_from_slice(&w.finish());
    Ok(out)
}

/// Inverse of [`compress`].
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut rd = ByteReader::new(data, "golomb");
    let codec = GolombCodec::read_params(&mut rd)?;
    let raw_len = rd.uint7()? as usize;
    let bits = rd.take(rd.remaining())?;
    // Every value costs at least one bit; reject counts the payload
    // cannot possibly hold before allocating for them.
    if raw_len > bits.len() * 8 {
        return Err(malformed(
            "golomb",
            format!("{raw_len} values cannot fit in {} bytes", bits.len()),
        ));
    }
    let mut r = BitReader::for_codec(bits, "golomb");
    let mut out = Vec::with_capacity(raw_len);
    for _ in 0..raw_len {
        let v = codec.read(&mut r)?;
        if !(0..=255).contains(&v) {
            return Err(malformed(
                "golomb",
                format!("decoded value {v} is not a byte"),
            ));
        }
        out.push(v as u8);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_m4_value7() {
        let codec = GolombCodec::new(4, 0).unwrap();
        let mut w = BitWriter::new();
        let bits = codec.write(&mut w, 7).unwrap();
        assert_eq!(bits, codec.number_of_bits(7).unwrap());
        // quotient 1 (unary "10") + remainder 3 in 2 bits.
        assert_eq!(bits, 4);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(codec.read(&mut r).unwrap(), 7);
    }

    #[test]
    fn roundtrip_across_divisors() {
        for m in [2i64, 3, 5, 8, 16] {
            let codec = GolombCodec::new(m, 0).unwrap();
            let values: Vec<i64> = (0..200).chain([1000, 65535, 1 << 20]).collect();
            let mut w = BitWriter::new();
            let mut expected_bits = 0u32;
            for &v in &values {
                expected_bits += codec.write(&mut w, v).unwrap();
                let mut probe = BitWriter::new();
                let probe_bits = codec.write(&mut probe, v).unwrap();
                assert_eq!(
                    codec.number_of_bits(v).unwrap(),
                    probe_bits,
                    "bit count mismatch for m={m} v={v}"
                );
            }
            let bytes = w.finish();
            assert!(bytes.len() * 8 >= expected_bits as usize);
            let mut r = BitReader::new(&bytes);
            for &v in &values {
                assert_eq!(codec.read(&mut r).unwrap(), v, "m={m} v={v}");
            }
        }
    }

    #[test]
    fn offset_shifts_the_value_range() {
        let codec = GolombCodec::new(5, 10).unwrap();
        let mut w = BitWriter::new();
        for v in [-10i64, -3, 0, 42] {
            codec.write(&mut w, v).unwrap();
        }
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        for v in [-10i64, -3, 0, 42] {
            assert_eq!(codec.read(&mut r).unwrap(), v);
        }
        // Below -offset the shifted value is negative.
        assert!(codec.write(&mut BitWriter::new(), -11).is_err());
    }

    #[test]
    fn m_below_two_is_rejected() {
        assert!(GolombCodec::new(1, 0).is_err());
        assert!(GolombCodec::new(0, 0).is_err());
        assert!(GolombCodec::new(-4, 0).is_err());
    }

    #[test]
    fn serialized_params_roundtrip() {
        let codec = GolombCodec::new(37, -5).unwrap();
        let back = GolombCodec::from_serialized_params(&codec.to_serialized_params()).unwrap();
        assert_eq!(back, codec);
    }

    #[test]
    fn block_framing_roundtrip() {
        let data: Vec<u8> = (0..=255).collect();
        let compressed = compress(&data, 16, 0).unwrap();
        assert_eq!(uncompress(&compressed).unwrap(), data);

        let compressed = compress(b"", 4, 0).unwrap();
        assert_eq!(uncompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn truncated_bits_are_rejected() {
        let compressed = compress(b"golomb coded block", 8, 0).unwrap();
        assert!(uncompress(&compressed[..compressed.len() - 4]).is_err());
    }
}
