use bytes::Bytes;
use cerder::config::DecoderConfig;
use cerder::der::{DERParseable, DERSerializable, Serializer};
use cerder::types::bit_string::ASN1BitString;
use cerder::types::boolean::ASN1Boolean;
use cerder::types::integer::{ASN1Enumerated, ASN1Integer};
use cerder::types::null::ASN1Null;
use cerder::types::object_identifier::ASN1ObjectIdentifier;
use cerder::types::octet_string::ASN1OctetString;
use cerder::types::real::ASN1Real;
use cerder::types::strings::{ASN1IA5String, ASN1PrintableString, ASN1UTF8String};
use cerder::types::time::{GeneralizedTime, UTCTime};
use cerder::{decode, decode_all, encode, EncodingRules};
use chrono::{TimeZone, Utc};
use num_bigint::BigInt;

#[test]
fn test_boolean_roundtrip() {
    let value = ASN1Boolean(true);
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    assert_eq!(bytes, vec![0x01, 0x01, 0xFF]);
    let decoded: ASN1Boolean = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_integer_roundtrip_negative() {
    let value = ASN1Integer::from(BigInt::from(-129));
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1Integer = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_enumerated_roundtrip() {
    let value = ASN1Enumerated::from(7i64);
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1Enumerated = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_null_roundtrip() {
    let bytes = encode(&ASN1Null, EncodingRules::Der).unwrap();
    assert_eq!(bytes, vec![0x05, 0x00]);
    let _: ASN1Null = decode(&bytes, EncodingRules::Der).unwrap();
}

#[test]
fn test_octet_string_roundtrip() {
    let value = ASN1OctetString(Bytes::from_static(b"hello"));
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1OctetString = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_bit_string_roundtrip() {
    let value = ASN1BitString::new(Bytes::from_static(&[0b1010_0000]), 5).unwrap();
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1BitString = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_object_identifier_roundtrip() {
    let value = ASN1ObjectIdentifier::new(&[1, 2, 840, 113549, 1, 1, 11]).unwrap();
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1ObjectIdentifier = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded.oid_components().unwrap(), vec![1, 2, 840, 113549, 1, 1, 11]);
}

#[test]
fn test_real_roundtrip_binary_and_zero() {
    for value in [0.0f64, 1.5, -1.5, 100.25, -0.0] {
        let real = ASN1Real::from(value);
        let bytes = encode(&real, EncodingRules::Der).unwrap();
        let decoded: ASN1Real = decode(&bytes, EncodingRules::Der).unwrap();
        assert_eq!(f64::from(decoded).to_bits(), value.to_bits());
    }
}

#[test]
fn test_real_zero_and_negative_zero_encode_differently() {
    let zero_bytes = encode(&ASN1Real::from(0.0), EncodingRules::Der).unwrap();
    let neg_zero_bytes = encode(&ASN1Real::from(-0.0), EncodingRules::Der).unwrap();
    assert_ne!(zero_bytes, neg_zero_bytes);
    assert_eq!(zero_bytes, vec![0x09, 0x00]);
    assert_eq!(neg_zero_bytes, vec![0x09, 0x01, 0x43]);
}

#[test]
fn test_printable_string_roundtrip() {
    let value = ASN1PrintableString::new(Bytes::from_static(b"Test User 1")).unwrap();
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1PrintableString = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_ia5_string_roundtrip() {
    let value = ASN1IA5String::new(Bytes::from_static(b"user@example.com")).unwrap();
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1IA5String = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_utf8_string_roundtrip() {
    let value = ASN1UTF8String("héllo wörld".to_string());
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    let decoded: ASN1UTF8String = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_generalized_time_roundtrip() {
    let value = GeneralizedTime(Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap());
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    assert_eq!(&bytes[2..], b"20240314092653Z");
    let decoded: GeneralizedTime = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_utc_time_roundtrip() {
    let value = UTCTime(Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap());
    let bytes = encode(&value, EncodingRules::Der).unwrap();
    assert_eq!(&bytes[2..], b"240314092653Z");
    let decoded: UTCTime = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_sequence_of_integers_roundtrip() {
    let values: Vec<ASN1Integer> = vec![1i64.into(), 2i64.into(), 3i64.into()];
    let bytes = encode(&values, EncodingRules::Der).unwrap();
    let decoded: Vec<ASN1Integer> = decode(&bytes, EncodingRules::Der).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_decode_all_walks_concatenated_top_level_elements() {
    let mut data = Vec::new();
    data.extend(encode(&ASN1Boolean(true), EncodingRules::Der).unwrap());
    data.extend(encode(&ASN1Integer::from(9i64), EncodingRules::Der).unwrap());
    data.extend(encode(&ASN1Null, EncodingRules::Der).unwrap());

    let nodes = decode_all(&data, EncodingRules::Der, &DecoderConfig::default()).unwrap();
    assert_eq!(nodes.len(), 3);
}

#[test]
fn test_der_rejects_indefinite_length() {
    // SEQUENCE with indefinite length (0x80) is forbidden outside CER.
    let data = vec![0x30, 0x80, 0x00, 0x00];
    let res: Result<Vec<ASN1Integer>, _> = decode(&data, EncodingRules::Der);
    assert!(res.is_err());
}

#[test]
fn test_manual_serializer_matches_top_level_encode() {
    let value = ASN1Integer::from(42i64);
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer).unwrap();
    assert_eq!(serializer.serialized_bytes(), encode(&value, EncodingRules::Der).unwrap());
}
