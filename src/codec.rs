// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::enc::write::Writer;

/// Upper bound for a single encoded value. Nothing the chain serialises
/// legitimately exceeds this; hitting the limit is treated as malformed
/// input rather than a resource error.
pub const CODEC_BYTES_LIMIT: usize = 4_000_000;

fn wire_config(
) -> bincode::config::Configuration<
    bincode::config::LittleEndian,
    bincode::config::Varint,
    bincode::config::Limit<CODEC_BYTES_LIMIT>,
> {
    bincode::config::standard()
        .with_little_endian()
        .with_variable_int_encoding()
        .with_limit::<CODEC_BYTES_LIMIT>()
}

pub fn encode_to_vec<T: bincode::Encode>(val: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(val, wire_config())
}

pub fn encode<W: Writer, T: bincode::Encode>(
    writer: W,
    val: &T,
) -> Result<(), bincode::error::EncodeError> {
    bincode::encode_into_writer(val, writer, wire_config())
}

pub fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, bincode::error::DecodeError> {
    bincode::decode_from_slice(bytes, wire_config()).map(|r| r.0)
}

/// Encoded byte size of a value, as counted against block and bandwidth
/// limits.
pub fn encoded_size<T: bincode::Encode>(val: &T) -> Result<u64, bincode::error::EncodeError> {
    encode_to_vec(val).map(|v| v.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_tuple() {
        let val = (42u64, String::from("amber"), vec![1u8, 2, 3]);
        let bytes = encode_to_vec(&val).unwrap();
        let decoded: (u64, String, Vec<u8>) = decode(&bytes).unwrap();
        assert_eq!(val, decoded);
    }

    #[test]
    fn varint_is_compact() {
        let bytes = encode_to_vec(&1u64).unwrap();
        assert_eq!(bytes.len(), 1);
    }

    #[test]
    fn rejects_oversized_payloads() {
        let blob = vec![0u8; CODEC_BYTES_LIMIT + 1];
        assert!(encode_to_vec(&blob).is_err());
    }
}
