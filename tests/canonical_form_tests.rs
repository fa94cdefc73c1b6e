use cerder::config::DecoderConfig;
use cerder::der::DERParseable;
use cerder::types::boolean::ASN1Boolean;
use cerder::types::integer::ASN1Integer;
use cerder::types::object_identifier::ASN1ObjectIdentifier;
use cerder::{decode, decode_all, ErrorKind};
use cerder::EncodingRules;

#[test]
fn test_der_rejects_non_canonical_boolean_true() {
    // Any non-zero byte means true under BER, but DER/CER mandate 0xFF.
    let res = ASN1Boolean::from_der_bytes(&[0x01, 0x01, 0x01]);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::ValuePadding);
}

#[test]
fn test_der_accepts_canonical_boolean_true() {
    assert_eq!(ASN1Boolean::from_der_bytes(&[0x01, 0x01, 0xFF]).unwrap(), ASN1Boolean(true));
}

#[test]
fn test_der_rejects_non_minimal_integer_encoding() {
    // 0x00 0x01 is padding: 1 fits in a single byte, so two bytes is non-minimal.
    let res = ASN1Integer::from_der_bytes(&[0x02, 0x02, 0x00, 0x01]);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::ValuePadding);
}

#[test]
fn test_der_rejects_reserved_0xff_length() {
    let res: Result<ASN1Integer, _> = decode(&[0x02, 0xFF], EncodingRules::Der);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::LengthViolation);
}

#[test]
fn test_der_rejects_non_minimal_long_form_length() {
    // Long-form length claiming 1 length octet, which the short form could express.
    let res: Result<ASN1Integer, _> = decode(&[0x02, 0x81, 0x01, 0x05], EncodingRules::Der);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::LengthViolation);
}

#[test]
fn test_der_rejects_non_minimal_oid_subidentifier() {
    // Subidentifier 0x80 0x01 is a padded encoding of the value 1.
    let res = ASN1ObjectIdentifier::from_der_bytes(&[0x06, 0x02, 0x80, 0x01]);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::ValuePadding);
}

#[test]
fn test_der_rejects_truncated_buffer() {
    let res: Result<ASN1Integer, _> = decode(&[0x02, 0x02, 0x05], EncodingRules::Der);
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::Truncation);
}

#[test]
fn test_recursion_guard_rejects_beyond_default_max_depth() {
    // 6 nested SEQUENCEs, one past the default max_depth of 5.
    let data = vec![
        0x30, 0x0C, 0x30, 0x0A, 0x30, 0x08, 0x30, 0x06, 0x30, 0x04, 0x30, 0x02, 0x02, 0x00,
    ];
    let res = decode_all(&data, EncodingRules::Der, &DecoderConfig::default());
    assert!(res.is_err());
    assert_eq!(res.unwrap_err().kind(), ErrorKind::Recursion);
}

#[test]
fn test_recursion_guard_accepts_at_configured_depth() {
    let data = vec![
        0x30, 0x0C, 0x30, 0x0A, 0x30, 0x08, 0x30, 0x06, 0x30, 0x04, 0x30, 0x02, 0x02, 0x00,
    ];
    let config = DecoderConfig::new(6);
    let res = decode_all(&data, EncodingRules::Der, &config);
    assert!(res.is_ok());
}
