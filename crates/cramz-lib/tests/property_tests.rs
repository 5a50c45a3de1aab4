use cramz_lib::codec::{golomb, huffman, name_tok, range, rans};
use cramz_lib::codec::primitives::{BitReader, BitWriter};
use cramz_lib::{compress, uncompress, BlockMethod};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rans_order0_roundtrip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let compressed = rans::compress(&data, rans::Order::Zero).unwrap();
        prop_assert_eq!(rans::uncompress(&compressed).unwrap(), data);
    }

    #[test]
    fn rans_order1_roundtrip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let compressed = rans::compress(&data, rans::Order::One).unwrap();
        prop_assert_eq!(rans::uncompress(&compressed).unwrap(), data);
    }

    #[test]
    fn range_roundtrip(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let compressed = range::compress(&data).unwrap();
        prop_assert_eq!(range::uncompress(&compressed).unwrap(), data);
    }

    #[test]
    fn range_order1_roundtrip(data in prop::collection::vec(any::<u8>(), 1..2048)) {
        let compressed = range::compress_with_flags(&data, range::FLAG_ORDER1).unwrap();
        prop_assert_eq!(range::uncompress(&compressed).unwrap(), data);
    }

    #[test]
    fn huffman_roundtrip(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let compressed = huffman::compress(&data).unwrap();
        prop_assert_eq!(huffman::uncompress(&compressed).unwrap(), data);
    }

    #[test]
    fn golomb_value_roundtrip(
        values in prop::collection::vec(0i64..1_000_000, 1..200),
        m in 2i64..64,
    ) {
        let codec = golomb::GolombCodec::new(m, 0).unwrap();
        let mut w = BitWriter::new();
        let mut total_bits = 0u64;
        for &v in &values {
            let written = codec.write(&mut w, v).unwrap();
            prop_assert_eq!(written, codec.number_of_bits(v).unwrap());
            total_bits += written as u64;
        }
        let bytes = w.finish();
        prop_assert_eq!(bytes.len(), total_bits.div_ceil(8) as usize);
        let mut r = BitReader::new(&bytes);
        for &v in &values {
            prop_assert_eq!(codec.read(&mut r).unwrap(), v);
        }
    }

    #[test]
    fn name_batch_roundtrip(
        names in prop::collection::vec("[a-z]{1,4}[0-9]{0,6}(:[0-9]{1,5})?", 1..40),
        use_arith in any::<bool>(),
    ) {
        let refs: Vec<&[u8]> = names.iter().map(|s| s.as_bytes()).collect();
        let encoded = name_tok::encode_names(&refs, use_arith).unwrap();
        let decoded = name_tok::decode_names(&encoded).unwrap();
        prop_assert_eq!(decoded.len(), names.len());
        for (got, want) in decoded.iter().zip(names.iter()) {
            prop_assert_eq!(got.as_slice(), want.as_bytes());
        }
    }

    #[test]
    fn facade_methods_roundtrip(
        data in prop::collection::vec(any::<u8>(), 0..1024),
        method_idx in 0usize..5,
    ) {
        let method = [
            BlockMethod::Raw,
            BlockMethod::Gzip,
            BlockMethod::Bzip2,
            BlockMethod::Rans,
            BlockMethod::Range,
        ][method_idx];
        let compressed = compress(method, &data).unwrap();
        prop_assert_eq!(uncompress(method, &compressed).unwrap(), data);
    }

    // Decoders must fail cleanly (never panic) on arbitrary garbage.
    #[test]
    fn decoders_survive_garbage(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = rans::uncompress(&data);
        let _ = range::uncompress(&data);
        let _ = huffman::uncompress(&data);
        let _ = golomb::uncompress(&data);
        let _ = name_tok::uncompress_block(&data);
    }
}
