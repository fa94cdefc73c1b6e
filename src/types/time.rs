use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneralizedTime(pub DateTime<Utc>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UTCTime(pub DateTime<Utc>);

impl From<DateTime<Utc>> for GeneralizedTime {
    fn from(dt: DateTime<Utc>) -> Self {
        GeneralizedTime(dt)
    }
}

impl From<DateTime<Utc>> for UTCTime {
    fn from(dt: DateTime<Utc>) -> Self {
        UTCTime(dt)
    }
}

fn decode_utf8_time(bytes: &[u8]) -> Result<String, ASN1Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Time value is not valid UTF-8"))
}

/// Parses the `YYYYMMDDHHMMSS[.frac]Z` grammar. The fixed-width prefix is
/// always 14 digits; anything between it and the trailing `Z` must be a
/// single `.` followed by one or more digits with no trailing zero.
fn parse_generalized_time(s: &str) -> Result<DateTime<Utc>, ASN1Error> {
    if !s.ends_with('Z') {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime must end with Z"));
    }
    let body = &s[..s.len() - 1];
    if body.len() < 14 {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime is shorter than the minimum YYYYMMDDHHMMSS form"));
    }
    let (fixed, frac) = body.split_at(14);
    if !fixed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime date/time digits must be ASCII digits"));
    }

    let naive_date = NaiveDate::parse_from_str(&fixed[..8], "%Y%m%d")
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime calendar date"))?;
    let hour: u32 = fixed[8..10].parse().map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime hour"))?;
    let minute: u32 = fixed[10..12].parse().map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime minute"))?;
    let second: u32 = fixed[12..14].parse().map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime second"))?;

    let mut naive = naive_date
        .and_hms_opt(hour, minute, second)
        .ok_or_else(|| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime time of day"))?;

    if !frac.is_empty() {
        if frac.as_bytes()[0] != b'.' {
            return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime fractional separator must be '.'"));
        }
        let digits = &frac[1..];
        if digits.is_empty() {
            return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime has a '.' with no fractional digits"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(asn1_err!(ErrorKind::ValueCharacters, "GeneralizedTime fractional part must be digits"));
        }
        if digits.ends_with('0') {
            return Err(asn1_err!(ErrorKind::ValuePadding, "GeneralizedTime fractional part has a trailing zero"));
        }
        let nanos = fractional_digits_to_nanos(digits)?;
        naive = naive
            .with_nanosecond(nanos)
            .ok_or_else(|| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime fractional seconds"))?;
    }

    Ok(Utc.from_utc_datetime(&naive))
}

fn fractional_digits_to_nanos(digits: &str) -> Result<u32, ASN1Error> {
    let mut padded = digits.to_string();
    if padded.len() > 9 {
        return Err(asn1_err!(ErrorKind::ValueSize, "GeneralizedTime fractional part exceeds nanosecond precision"));
    }
    while padded.len() < 9 {
        padded.push('0');
    }
    padded
        .parse()
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid GeneralizedTime fractional digits"))
}

fn format_generalized_time(dt: &DateTime<Utc>) -> String {
    let base = dt.format("%Y%m%d%H%M%S").to_string();
    let nanos = dt.nanosecond();
    if nanos == 0 {
        return format!("{}Z", base);
    }
    let mut frac = format!("{:09}", nanos);
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{}.{}Z", base, frac)
}

impl DERParseable for GeneralizedTime {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, GeneralizedTime::default_identifier())
    }
}

impl DERSerializable for GeneralizedTime {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let s = format_generalized_time(&self.0);
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for GeneralizedTime {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::GENERALIZED_TIME
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => {
                let s = decode_utf8_time(&bytes)?;
                parse_generalized_time(&s).map(GeneralizedTime)
            }
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "GeneralizedTime must be primitive")),
        }
    }
}

impl BERParseable for GeneralizedTime {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
}
impl BERSerializable for GeneralizedTime {}
impl BERImplicitlyTaggable for GeneralizedTime {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

/// Parses `YYMMDDHHMMSSZ`, windowing the two-digit year per X.690: 00-49
/// maps to 2000-2049, 50-99 maps to 1950-1999.
fn parse_utc_time(s: &str) -> Result<DateTime<Utc>, ASN1Error> {
    if !s.ends_with('Z') {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "UTCTime must end with Z"));
    }
    let body = &s[..s.len() - 1];
    if body.len() != 12 {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "UTCTime must be exactly YYMMDDHHMMSS before Z"));
    }
    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(asn1_err!(ErrorKind::ValueCharacters, "UTCTime digits must be ASCII digits"));
    }

    let naive = NaiveDateTime::parse_from_str(body, "%y%m%d%H%M%S")
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "Invalid UTCTime format"))?;

    let year_val: i32 = body[0..2].parse().expect("validated as ASCII digits above");
    let full_year = if year_val >= 50 { 1900 + year_val } else { 2000 + year_val };
    let corrected = naive
        .with_year(full_year)
        .ok_or_else(|| asn1_err!(ErrorKind::ValueCharacters, "Invalid UTCTime year"))?;

    Ok(Utc.from_utc_datetime(&corrected))
}

impl DERParseable for UTCTime {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, UTCTime::default_identifier())
    }
}

impl DERSerializable for UTCTime {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let s = self.0.format("%y%m%d%H%M%SZ").to_string();
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for UTCTime {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::UTC_TIME
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => {
                let s = decode_utf8_time(&bytes)?;
                parse_utc_time(&s).map(UTCTime)
            }
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "UTCTime must be primitive")),
        }
    }
}

impl BERParseable for UTCTime {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
}
impl BERSerializable for UTCTime {}
impl BERImplicitlyTaggable for UTCTime {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_from(bytes: &[u8]) -> ASN1Node {
        crate::der::parse(bytes).unwrap()
    }

    fn generalized_time_tlv(content: &[u8]) -> Vec<u8> {
        let mut tlv = vec![0x18];
        tlv.extend_from_slice(&crate::der::encode_length(content.len()));
        tlv.extend_from_slice(content);
        tlv
    }

    #[test]
    fn test_generalized_time_roundtrip_no_fraction() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 13, 45, 9).unwrap();
        let value = GeneralizedTime(dt);
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        assert_eq!(&bytes[2..], b"20240305134509Z");

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(GeneralizedTime::from_der_node(node).unwrap(), value);
    }

    #[test]
    fn test_generalized_time_roundtrip_with_fraction() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 13, 45, 9).unwrap().with_nanosecond(250_000_000).unwrap();
        let value = GeneralizedTime(dt);
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        assert_eq!(&bytes[2..], b"20240305134509.25Z");

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(GeneralizedTime::from_der_node(node).unwrap(), value);
    }

    #[test]
    fn test_generalized_time_rejects_trailing_zero_fraction() {
        let tlv = generalized_time_tlv(b"20240305134509.50Z");
        let node = node_from(&tlv);
        let err = GeneralizedTime::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValuePadding);
    }

    #[test]
    fn test_generalized_time_rejects_bare_dot() {
        let tlv = generalized_time_tlv(b"20240305134509.Z");
        let node = node_from(&tlv);
        let err = GeneralizedTime::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueCharacters);
    }

    #[test]
    fn test_generalized_time_rejects_missing_z() {
        let tlv = generalized_time_tlv(b"20240305134509");
        let node = node_from(&tlv);
        let err = GeneralizedTime::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueCharacters);
    }

    #[test]
    fn test_utc_time_windowing() {
        assert_eq!(parse_utc_time("240305134509Z").unwrap().year(), 2024);
        assert_eq!(parse_utc_time("700305134509Z").unwrap().year(), 1970);
    }

    #[test]
    fn test_utc_time_roundtrip() {
        let dt = Utc.with_ymd_and_hms(1998, 11, 30, 23, 59, 0).unwrap();
        let value = UTCTime(dt);
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        assert_eq!(&bytes[2..], b"981130235900Z");

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(UTCTime::from_der_node(node).unwrap(), value);
    }
}
