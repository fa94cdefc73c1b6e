//! A strict ITU-T X.690 codec for the Canonical and Distinguished Encoding
//! Rules (CER/DER): Tag-Length-Value framing, one value codec per universal
//! tag, and the canonicalization rules that reject the non-minimal forms
//! Basic Encoding Rules (BER) tolerates. CER/DER exist so that a given
//! abstract value has exactly one valid encoding; this crate enforces that
//! as rigorously on decode as it produces it on encode.
//!
//! The top-level [`encode`]/[`decode`] functions are the common entry
//! points. Lower-level access to the element tree ([`ASN1Node`]) is
//! available through [`decode_element`] and [`decode_all`], and each
//! universal type lives in [`types`] behind the [`der::DERParseable`] /
//! [`der::DERSerializable`] (strict) and [`ber::BERParseable`] /
//! [`ber::BERSerializable`] (lenient, also CER's segmented-reassembly path)
//! trait pairs.

pub mod asn1;
pub mod ber;
pub mod cer;
pub mod config;
pub mod der;
pub mod errors;
pub mod types;

pub use asn1::{ASN1Node, EncodingRules};
pub use ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
pub use config::{DecoderConfig, EncoderConfig};
pub use der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
pub use errors::{ASN1Error, ErrorKind};

use bytes::Bytes;

/// Encodes `value` under the given profile using default encoder
/// preferences (REAL binary base 2).
pub fn encode<T: DERSerializable>(value: &T, rules: EncodingRules) -> Result<Vec<u8>, ASN1Error> {
    encode_with_config(value, rules, &EncoderConfig::default())
}

pub fn encode_with_config<T: DERSerializable>(
    value: &T,
    rules: EncodingRules,
    config: &EncoderConfig,
) -> Result<Vec<u8>, ASN1Error> {
    let mut serializer = Serializer::with_config(rules, config);
    value.serialize(&mut serializer)?;
    Ok(serializer.serialized_bytes().to_vec())
}

/// Decodes a single top-level value from `data`, requiring the entire
/// buffer be exactly that one element.
pub fn decode<T: BERParseable>(data: &[u8], rules: EncodingRules) -> Result<T, ASN1Error> {
    decode_with_config(data, rules, &DecoderConfig::default())
}

pub fn decode_with_config<T: BERParseable>(
    data: &[u8],
    rules: EncodingRules,
    config: &DecoderConfig,
) -> Result<T, ASN1Error> {
    let node = parse_root(data, rules, config)?;
    T::from_ber_node(node)
}

fn parse_root(data: &[u8], rules: EncodingRules, config: &DecoderConfig) -> Result<ASN1Node, ASN1Error> {
    match rules {
        EncodingRules::Der => der::parse_with_config(data, config),
        EncodingRules::Cer => cer::parse(data, config),
        EncodingRules::Ber => ber::parse_with_config(data, config),
    }
}

/// Parses exactly one top-level element starting at `offset`, returning it
/// along with the number of bytes it consumed. Unlike [`decode`], trailing
/// bytes after the element are not an error — callers walk a buffer holding
/// more than one concatenated top-level element this way.
pub fn decode_element(
    data: &[u8],
    offset: usize,
    rules: EncodingRules,
    config: &DecoderConfig,
) -> Result<(ASN1Node, usize), ASN1Error> {
    let slice = data
        .get(offset..)
        .ok_or_else(|| crate::asn1_err!(ErrorKind::Truncation, "decode_element offset {} is beyond the end of the buffer", offset))?;
    let mut bytes = Bytes::copy_from_slice(slice);
    let result = asn1::ParseResult::parse_one(&mut bytes, rules, config)?;
    let node = der::single_root(result)?;
    let consumed = node.encoded_bytes.len();
    Ok((node, consumed))
}

/// Parses every top-level element in `data`, in order, requiring the whole
/// buffer to be consumed by the sequence of elements found.
pub fn decode_all(data: &[u8], rules: EncodingRules, config: &DecoderConfig) -> Result<Vec<ASN1Node>, ASN1Error> {
    let mut elements = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (node, consumed) = decode_element(data, offset, rules, config)?;
        offset += consumed;
        elements.push(node);
    }
    Ok(elements)
}
