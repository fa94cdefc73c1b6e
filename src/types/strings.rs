use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::cer;
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::Bytes;

/// Restricted byte-oriented character strings: content is raw octets, each
/// validated against a per-type character-class predicate, CER-segmented
/// like OCTET STRING above the 1000-octet threshold.
macro_rules! impl_byte_string_type {
    ($name:ident, $tag:expr, $predicate:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub Bytes);

        impl $name {
            pub fn new(bytes: Bytes) -> Result<Self, ASN1Error> {
                validate_bytes::<fn(u8) -> bool>(&bytes, $predicate, stringify!($name))?;
                Ok($name(bytes))
            }
        }

        impl From<$name> for Vec<u8> {
            fn from(val: $name) -> Self {
                val.0.to_vec()
            }
        }

        impl DERParseable for $name {
            fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                Self::from_der_node_with_identifier(node, $name::default_identifier())
            }
        }

        impl DERSerializable for $name {
            fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
                let threshold = serializer.rules().octet_segmentation_threshold();
                cer::write_segmented(serializer, Self::default_identifier(), &self.0, threshold)
            }
        }

        impl DERImplicitlyTaggable for $name {
            fn default_identifier() -> ASN1Identifier {
                $tag
            }

            fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                crate::der::check_identifier(&node, identifier)?;
                match node.content {
                    Content::Primitive(bytes) => {
                        validate_bytes::<fn(u8) -> bool>(&bytes, $predicate, stringify!($name))?;
                        Ok($name(bytes))
                    }
                    Content::Constructed(_) => {
                        Err(asn1_err!(ErrorKind::Construction, concat!(stringify!($name), " must be primitive under DER")))
                    }
                }
            }
        }

        impl BERParseable for $name {
            fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                Self::from_ber_node_with_identifier(node, $name::default_identifier())
            }
        }

        impl BERSerializable for $name {}

        impl BERImplicitlyTaggable for $name {
            fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                let bytes = cer::reassemble(node, identifier)?;
                validate_bytes::<fn(u8) -> bool>(&bytes, $predicate, stringify!($name))?;
                Ok($name(bytes))
            }
        }
    };
}

fn validate_bytes<F: Fn(u8) -> bool>(bytes: &[u8], predicate: F, type_name: &str) -> Result<(), ASN1Error> {
    if bytes.iter().all(|&b| predicate(b)) {
        Ok(())
    } else {
        Err(asn1_err!(ErrorKind::ValueCharacters, "Invalid content byte for {}", type_name))
    }
}

fn is_printable_string_char(b: u8) -> bool {
    (b as char).is_ascii_alphanumeric()
        || matches!(b, b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?')
}

fn is_numeric_string_char(b: u8) -> bool {
    b.is_ascii_digit() || b == b' '
}

fn is_graphic_or_visible_char(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

fn is_seven_bit_ascii(b: u8) -> bool {
    b < 0x80
}

fn any_byte(_b: u8) -> bool {
    true
}

impl_byte_string_type!(ASN1PrintableString, ASN1Identifier::PRINTABLE_STRING, is_printable_string_char);
impl_byte_string_type!(ASN1IA5String, ASN1Identifier::IA5_STRING, is_seven_bit_ascii);
impl_byte_string_type!(ASN1NumericString, ASN1Identifier::NUMERIC_STRING, is_numeric_string_char);
impl_byte_string_type!(ASN1GraphicString, ASN1Identifier::GRAPHIC_STRING, is_graphic_or_visible_char);
impl_byte_string_type!(ASN1VisibleString, ASN1Identifier::VISIBLE_STRING, is_graphic_or_visible_char);
impl_byte_string_type!(ASN1GeneralString, ASN1Identifier::GENERAL_STRING, is_seven_bit_ascii);
impl_byte_string_type!(ASN1TeletexString, ASN1Identifier::TELETEX_STRING, any_byte);
impl_byte_string_type!(ASN1VideotexString, ASN1Identifier::VIDEOTEX_STRING, any_byte);
// ObjectDescriptor is GraphicString-shaped: same predicate and segmentation
// behavior, under its own universal tag.
impl_byte_string_type!(ASN1ObjectDescriptor, ASN1Identifier::OBJECT_DESCRIPTOR, is_graphic_or_visible_char);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1UTF8String(pub String);

impl From<ASN1UTF8String> for String {
    fn from(val: ASN1UTF8String) -> Self {
        val.0
    }
}

impl DERParseable for ASN1UTF8String {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1UTF8String::default_identifier())
    }
}

impl DERSerializable for ASN1UTF8String {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let threshold = serializer.rules().octet_segmentation_threshold();
        cer::write_segmented(serializer, Self::default_identifier(), self.0.as_bytes(), threshold)
    }
}

impl DERImplicitlyTaggable for ASN1UTF8String {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::UTF8_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => decode_utf8(&bytes),
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "UTF8String must be primitive under DER")),
        }
    }
}

impl BERParseable for ASN1UTF8String {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1UTF8String::default_identifier())
    }
}

impl BERSerializable for ASN1UTF8String {}

impl BERImplicitlyTaggable for ASN1UTF8String {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        let bytes = cer::reassemble(node, identifier)?;
        decode_utf8(&bytes)
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<ASN1UTF8String, ASN1Error> {
    String::from_utf8(bytes.to_vec())
        .map(ASN1UTF8String)
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "UTF8String content is not valid UTF-8"))
}

/// Fixed-width string codec shared by UniversalString (UTF-32BE, 4-byte
/// units) and BMPString (UTF-16BE, 2-byte units): content length must be a
/// multiple of the unit width, and CER segments above a per-unit-width
/// threshold rather than a flat octet count.
macro_rules! impl_fixed_width_string_type {
    ($name:ident, $tag:expr, $unit_bytes:expr, $decode_unit:expr, $encode_char:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl DERParseable for $name {
            fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                Self::from_der_node_with_identifier(node, $name::default_identifier())
            }
        }

        impl DERSerializable for $name {
            fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
                let mut content = Vec::new();
                for c in self.0.chars() {
                    $encode_char(c, &mut content);
                }
                let threshold = serializer.rules().unit_segmentation_threshold($unit_bytes);
                cer::write_segmented(serializer, Self::default_identifier(), &content, threshold)
            }
        }

        impl DERImplicitlyTaggable for $name {
            fn default_identifier() -> ASN1Identifier {
                $tag
            }

            fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                crate::der::check_identifier(&node, identifier)?;
                match node.content {
                    Content::Primitive(bytes) => decode_fixed_width(&bytes, $unit_bytes, $decode_unit),
                    Content::Constructed(_) => {
                        Err(asn1_err!(ErrorKind::Construction, concat!(stringify!($name), " must be primitive under DER")))
                    }
                }
            }
        }

        impl BERParseable for $name {
            fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                Self::from_ber_node_with_identifier(node, $name::default_identifier())
            }
        }

        impl BERSerializable for $name {}

        impl BERImplicitlyTaggable for $name {
            fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                let bytes = cer::reassemble(node, identifier)?;
                decode_fixed_width(&bytes, $unit_bytes, $decode_unit)
            }
        }
    };
}

fn decode_fixed_width(
    bytes: &[u8],
    unit_bytes: usize,
    decode_unit: fn(&[u8]) -> Result<char, ASN1Error>,
) -> Result<String, ASN1Error> {
    if bytes.len() % unit_bytes != 0 {
        return Err(asn1_err!(ErrorKind::ValueSize, "Content length is not a multiple of the {}-byte unit width", unit_bytes));
    }
    let mut out = String::with_capacity(bytes.len() / unit_bytes);
    for chunk in bytes.chunks(unit_bytes) {
        out.push(decode_unit(chunk)?);
    }
    Ok(out)
}

fn decode_utf32be_unit(chunk: &[u8]) -> Result<char, ASN1Error> {
    let code = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    char::from_u32(code).ok_or_else(|| asn1_err!(ErrorKind::ValueCharacters, "UniversalString contains an invalid Unicode scalar value"))
}

fn decode_utf16be_unit(chunk: &[u8]) -> Result<char, ASN1Error> {
    let unit = u16::from_be_bytes([chunk[0], chunk[1]]);
    char::from_u32(unit as u32).ok_or_else(|| asn1_err!(ErrorKind::ValueCharacters, "BMPString contains a surrogate or invalid code unit"))
}

fn encode_utf32be_char(c: char, out: &mut Vec<u8>) {
    out.extend_from_slice(&(c as u32).to_be_bytes());
}

fn encode_utf16be_char(c: char, out: &mut Vec<u8>) {
    out.extend_from_slice(&(c as u32 as u16).to_be_bytes());
}

impl_fixed_width_string_type!(ASN1UniversalString, ASN1Identifier::UNIVERSAL_STRING, 4, decode_utf32be_unit, encode_utf32be_char);
impl_fixed_width_string_type!(ASN1BmpString, ASN1Identifier::BMP_STRING, 2, decode_utf16be_unit, encode_utf16be_char);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::EncodingRules;

    #[test]
    fn test_printable_string_rejects_invalid_char() {
        assert!(ASN1PrintableString::new(Bytes::from_static(b"hello!")).is_err());
        assert!(ASN1PrintableString::new(Bytes::from_static(b"hello")).is_ok());
    }

    #[test]
    fn test_numeric_string_rejects_letters() {
        assert!(ASN1NumericString::new(Bytes::from_static(b"123 456")).is_ok());
        assert!(ASN1NumericString::new(Bytes::from_static(b"12a")).is_err());
    }

    #[test]
    fn test_ia5_rejects_high_bit() {
        assert!(ASN1IA5String::new(Bytes::from_static(&[0xFF])).is_err());
    }

    #[test]
    fn test_utf8_roundtrip() {
        let value = ASN1UTF8String("héllo".to_string());
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(ASN1UTF8String::from_der_node(node).unwrap(), value);
    }

    #[test]
    fn test_cer_segments_printable_string_above_threshold() {
        let content = Bytes::from(vec![b'A'; 1500]);
        let value = ASN1PrintableString::new(content.clone()).unwrap();
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        value.serialize(&mut serializer).unwrap();
        let out = serializer.serialized_bytes();
        assert_eq!(out[0], 0x33); // constructed PrintableString (0x13 | 0x20)

        let node = crate::ber::parse(&out).unwrap();
        let reassembled = ASN1PrintableString::from_ber_node(node).unwrap();
        assert_eq!(reassembled.0, content);
    }

    #[test]
    fn test_bmp_string_roundtrip() {
        let value = ASN1BmpString("hi".to_string());
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        assert_eq!(&bytes[2..], &[0x00, b'h', 0x00, b'i']);

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(ASN1BmpString::from_der_node(node).unwrap(), value);
    }

    #[test]
    fn test_universal_string_roundtrip() {
        let value = ASN1UniversalString("€".to_string());
        let mut serializer = Serializer::new();
        value.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(ASN1UniversalString::from_der_node(node).unwrap(), value);
    }

    #[test]
    fn test_fixed_width_rejects_misaligned_length() {
        let node = crate::der::parse(&[0x1E, 0x03, 0x00, 0x68, 0x00]).unwrap();
        let err = ASN1BmpString::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueSize);
    }
}
