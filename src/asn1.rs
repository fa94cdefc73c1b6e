use crate::config::DecoderConfig;
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::{ASN1Identifier, TagClass};
use crate::asn1_err;
use bytes::Bytes;
use std::ops::Range;
use std::sync::Arc;

/// Which of the three X.690 encodings governs parsing and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingRules {
    /// Basic Encoding Rules: permissive parent, accepts indefinite length and
    /// non-minimal length/value encodings.
    Ber,
    /// Canonical Encoding Rules: definite or indefinite length per type,
    /// mandatory segmentation of large primitive strings.
    Cer,
    /// Distinguished Encoding Rules: always definite length, never segments.
    Der,
}

fn minimal_octet_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let significant_bits = 64 - value.leading_zeros();
    ((significant_bits + 7) / 8) as usize
}

impl EncodingRules {
    pub fn indefinite_length_allowed(&self) -> bool {
        !matches!(self, EncodingRules::Der)
    }

    pub fn non_minimal_encoded_lengths_allowed(&self) -> bool {
        matches!(self, EncodingRules::Ber)
    }

    /// Octet threshold above which OCTET STRING-shaped primitives (OCTET
    /// STRING, ObjectDescriptor, the 8-bit restricted character strings)
    /// must be segmented on encode. `None` means "never segments".
    pub fn octet_segmentation_threshold(&self) -> Option<usize> {
        match self {
            EncodingRules::Cer => Some(1000),
            _ => None,
        }
    }

    /// Bit threshold above which BIT STRING must be segmented on encode.
    pub fn bit_segmentation_threshold(&self) -> Option<usize> {
        match self {
            EncodingRules::Cer => Some(1000),
            _ => None,
        }
    }

    /// Unit threshold above which a fixed-width string (BMPString: 500
    /// 16-bit units, UniversalString: 250 32-bit units) must be segmented.
    pub fn unit_segmentation_threshold(&self, unit_width_bytes: usize) -> Option<usize> {
        match self {
            EncodingRules::Cer if unit_width_bytes == 2 => Some(500),
            EncodingRules::Cer if unit_width_bytes == 4 => Some(250),
            _ => None,
        }
    }

    /// Whether REAL's decimal (character) form is restricted to NR3 only
    /// (CER); DER and BER permit NR1/NR2/NR3.
    pub fn real_decimal_nr3_only(&self) -> bool {
        matches!(self, EncodingRules::Cer)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParserNode {
    pub identifier: ASN1Identifier,
    pub depth: usize,
    pub is_constructed: bool,
    pub encoded_bytes: Bytes,
    pub data_bytes: Option<Bytes>,
    pub rules: EncodingRules,
}

impl ParserNode {
    pub fn is_end_marker(&self) -> bool {
        self.identifier.tag_class == TagClass::Universal
            && self.identifier.tag_number == 0
            && !self.is_constructed
            && self.encoded_bytes.len() == 2
            && self.encoded_bytes.as_ref() == [0x00, 0x00]
    }
}

#[derive(Debug)]
pub(crate) struct ParseResult {
    pub nodes: Vec<ParserNode>,
}

impl ParseResult {
    pub fn parse(
        data: Bytes,
        rules: EncodingRules,
        config: &DecoderConfig,
    ) -> Result<ParseResult, ASN1Error> {
        let mut nodes = Vec::with_capacity(16);
        let mut current_data = data;

        Self::_parse_node(&mut current_data, rules, config, 1, &mut nodes)?;

        if !current_data.is_empty() {
            return Err(asn1_err!(
                ErrorKind::LengthViolation,
                "Trailing unparsed data is present"
            ));
        }

        Ok(ParseResult { nodes })
    }

    /// Parses exactly one top-level element from the front of `data`,
    /// leaving any trailing bytes in place. Used by callers that walk a
    /// buffer containing more than one concatenated top-level element
    /// (`decode_element`/`decode_all`), unlike `parse`, which demands the
    /// entire buffer be exactly one element.
    pub(crate) fn parse_one(
        data: &mut Bytes,
        rules: EncodingRules,
        config: &DecoderConfig,
    ) -> Result<ParseResult, ASN1Error> {
        let mut nodes = Vec::with_capacity(16);
        Self::_parse_node(data, rules, config, 1, &mut nodes)?;
        Ok(ParseResult { nodes })
    }

    fn _parse_node(
        data: &mut Bytes,
        rules: EncodingRules,
        config: &DecoderConfig,
        depth: usize,
        nodes: &mut Vec<ParserNode>,
    ) -> Result<(), ASN1Error> {
        if depth > config.max_depth {
            return Err(asn1_err!(
                ErrorKind::Recursion,
                "Nesting depth {} exceeds configured limit {}",
                depth,
                config.max_depth
            ));
        }

        if data.is_empty() {
            return Err(asn1_err!(ErrorKind::Truncation, "No data for identifier octet"));
        }

        let original_data = data.clone();
        let raw_identifier = data.split_to(1)[0];

        let constructed = (raw_identifier & 0x20) != 0;
        let identifier: ASN1Identifier;

        if (raw_identifier & 0x1f) == 0x1f {
            let tag_class = TagClass::from_top_byte(raw_identifier);
            let (tag_number, _bytes_read) = read_asn1_discipline_uint(data)?;
            if tag_number < 0x1f {
                return Err(asn1_err!(
                    ErrorKind::TagPadding,
                    "ASN.1 tag incorrectly encoded in long form: {}",
                    tag_number
                ));
            }
            identifier = ASN1Identifier::new(tag_number, tag_class);
        } else {
            identifier = ASN1Identifier::from_short_identifier(raw_identifier);
        }

        let wide_length = _read_asn1_length(data, !rules.non_minimal_encoded_lengths_allowed())?;

        match wide_length {
            ASN1Length::Definite(length) => {
                let length_usize = length as usize;
                if data.len() < length_usize {
                    return Err(asn1_err!(ErrorKind::Truncation, "Value shorter than declared length"));
                }

                let sub_data = data.split_to(length_usize);
                let total_len = original_data.len() - data.len();
                let encoded_bytes = original_data.slice(0..total_len);

                if constructed {
                    nodes.push(ParserNode {
                        identifier,
                        depth,
                        is_constructed: true,
                        encoded_bytes,
                        data_bytes: None,
                        rules,
                    });

                    let mut check_sub = sub_data;
                    while !check_sub.is_empty() {
                        Self::_parse_node(&mut check_sub, rules, config, depth + 1, nodes)?;
                    }
                } else {
                    nodes.push(ParserNode {
                        identifier,
                        depth,
                        is_constructed: false,
                        encoded_bytes,
                        data_bytes: Some(sub_data),
                        rules,
                    });
                }
            }
            ASN1Length::Indefinite => {
                if !rules.indefinite_length_allowed() {
                    return Err(asn1_err!(
                        ErrorKind::LengthViolation,
                        "Indefinite form of field length not supported under this profile"
                    ));
                }
                if !constructed {
                    return Err(asn1_err!(
                        ErrorKind::Construction,
                        "Indefinite-length field must have constructed identifier"
                    ));
                }

                nodes.push(ParserNode {
                    identifier,
                    depth,
                    is_constructed: true,
                    encoded_bytes: Bytes::new(),
                    data_bytes: None,
                    rules,
                });
                let last_index = nodes.len() - 1;

                loop {
                    if data.is_empty() {
                        return Err(asn1_err!(
                            ErrorKind::Truncation,
                            "Indefinite-length field missing end-of-content marker"
                        ));
                    }
                    Self::_parse_node(data, rules, config, depth + 1, nodes)?;
                    let found_end_marker =
                        matches!(nodes.last(), Some(node) if node.is_end_marker());
                    if found_end_marker {
                        nodes.pop();
                        break;
                    }
                }

                let consumed = original_data.len() - data.len();
                let encoded_bytes = original_data.slice(0..consumed);
                nodes[last_index].encoded_bytes = encoded_bytes;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ASN1Length {
    Indefinite,
    Definite(u64),
}

fn _read_asn1_length(data: &mut Bytes, minimal_encoding: bool) -> Result<ASN1Length, ASN1Error> {
    if data.is_empty() {
        return Err(asn1_err!(ErrorKind::Truncation, "No data for length octet"));
    }
    let first_byte = data.split_to(1)[0];

    if first_byte == 0x80 {
        return Ok(ASN1Length::Indefinite);
    }

    if first_byte == 0xFF {
        return Err(asn1_err!(ErrorKind::LengthViolation, "Length octet 0xFF is reserved"));
    }

    if (first_byte & 0x80) == 0x80 {
        let field_length = (first_byte & 0x7F) as usize;
        if data.len() < field_length {
            return Err(asn1_err!(ErrorKind::Truncation, "Long-form length octets truncated"));
        }
        let length_bytes = data.split_to(field_length);
        let mut length: u64 = 0;
        for &b in length_bytes.iter() {
            length = length.checked_mul(256).ok_or_else(|| {
                asn1_err!(ErrorKind::ValueSize, "Field length exceeds supported range")
            })?;
            length += b as u64;
        }

        if minimal_encoding {
            if length < 128 {
                return Err(asn1_err!(
                    ErrorKind::LengthViolation,
                    "Field length encoded in long form, but this profile requires short form"
                ));
            }
            let required_bytes = minimal_octet_len(length);
            if field_length > required_bytes {
                return Err(asn1_err!(
                    ErrorKind::LengthViolation,
                    "Field length encoded in excessive number of bytes"
                ));
            }
        }

        Ok(ASN1Length::Definite(length))
    } else {
        Ok(ASN1Length::Definite(first_byte as u64))
    }
}

fn read_asn1_discipline_uint(data: &mut Bytes) -> Result<(u64, usize), ASN1Error> {
    let mut value: u64 = 0;
    let mut read = 0;
    loop {
        if data.is_empty() {
            return Err(asn1_err!(ErrorKind::Truncation, "Truncated base-128 tag number"));
        }
        let byte = data.split_to(1)[0];
        if read == 0 && byte == 0x80 {
            return Err(asn1_err!(
                ErrorKind::TagPadding,
                "Long-form tag number encoded with a non-minimal leading byte"
            ));
        }
        read += 1;
        let chunk = u64::from(byte & 0x7F);
        value = value
            .checked_mul(128)
            .and_then(|v| v.checked_add(chunk))
            .ok_or_else(|| asn1_err!(ErrorKind::TagOverflow, "Base-128 tag number exceeds u64 range"))?;
        if (byte & 0x80) == 0 {
            break;
        }
    }
    Ok((value, read))
}

#[derive(Debug, Clone)]
pub struct ASN1NodeCollection {
    nodes: Arc<Vec<ParserNode>>,
    range: Range<usize>,
    depth: usize,
}

impl ASN1NodeCollection {
    pub(crate) fn new(nodes: Arc<Vec<ParserNode>>, range: Range<usize>, depth: usize) -> Self {
        ASN1NodeCollection { nodes, range, depth }
    }
}

impl IntoIterator for ASN1NodeCollection {
    type Item = ASN1Node;
    type IntoIter = ASN1NodeCollectionIterator;

    fn into_iter(self) -> Self::IntoIter {
        ASN1NodeCollectionIterator {
            nodes: self.nodes,
            range: self.range,
            _depth: self.depth,
        }
    }
}

pub struct ASN1NodeCollectionIterator {
    nodes: Arc<Vec<ParserNode>>,
    range: Range<usize>,
    _depth: usize,
}

impl ASN1NodeCollectionIterator {
    pub fn peek(&self) -> Option<ASN1Node> {
        if self.range.start >= self.range.end {
            return None;
        }
        let index = self.range.start;
        let end_index = self.subtree_end_index(index);
        Some(self.clone_node(index, end_index))
    }

    fn subtree_end_index(&self, index: usize) -> usize {
        let node_depth = self.nodes[index].depth;
        let mut search_index = index + 1;
        while search_index < self.range.end {
            if self.nodes[search_index].depth <= node_depth {
                break;
            }
            search_index += 1;
        }
        search_index
    }

    fn clone_node(&self, index: usize, end_index: usize) -> ASN1Node {
        let node = &self.nodes[index];
        if node.is_constructed {
            let collection =
                ASN1NodeCollection::new(self.nodes.clone(), (index + 1)..end_index, node.depth);
            ASN1Node {
                identifier: node.identifier,
                content: Content::Constructed(collection),
                encoded_bytes: node.encoded_bytes.clone(),
                rules: node.rules,
            }
        } else {
            ASN1Node {
                identifier: node.identifier,
                content: Content::Primitive(node.data_bytes.clone().unwrap()),
                encoded_bytes: node.encoded_bytes.clone(),
                rules: node.rules,
            }
        }
    }
}

impl Iterator for ASN1NodeCollectionIterator {
    type Item = ASN1Node;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }
        let index = self.range.start;
        let end_index = self.subtree_end_index(index);
        self.range.start = end_index;
        Some(self.clone_node(index, end_index))
    }
}

#[derive(Debug, Clone)]
pub struct ASN1Node {
    pub identifier: ASN1Identifier,
    pub content: Content,
    pub encoded_bytes: Bytes,
    /// Which profile this node was parsed under. CER's segmented-
    /// reassembly decode path reuses BER's lenient machinery but still
    /// needs to know whether canonical segmentation shape applies, since
    /// BER itself imposes no such constraint.
    pub rules: EncodingRules,
}

impl ASN1Node {
    pub fn is_constructed(&self) -> bool {
        matches!(self.content, Content::Constructed(_))
    }
}

#[derive(Debug, Clone)]
pub enum Content {
    Constructed(ASN1NodeCollection),
    Primitive(Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn parse(data: Bytes, rules: EncodingRules) -> Result<ParseResult, ASN1Error> {
        ParseResult::parse(data, rules, &DecoderConfig::default())
    }

    #[test]
    fn test_parse_empty_data() {
        let res = parse(Bytes::from(vec![]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_truncated_tag() {
        let res = parse(Bytes::from(vec![0x1F]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_truncated_length() {
        let res = parse(Bytes::from(vec![0x02]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_truncated_value() {
        let res = parse(Bytes::from(vec![0x02, 0x01]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_long_form_tag_number_too_small_rejected() {
        let res = parse(Bytes::from(vec![0x1F, 0x1E, 0x00]), EncodingRules::Der);
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().kind(), ErrorKind::TagPadding);
    }

    #[test]
    fn test_parse_long_form_tag_number_boundary_ok() {
        let res = parse(Bytes::from(vec![0x1F, 0x1F, 0x00]), EncodingRules::Der);
        assert!(res.is_ok());
    }

    #[test]
    fn test_der_rejects_non_minimal_length_encoding() {
        let res = parse(Bytes::from(vec![0x02, 0x81, 0x01, 0x00]), EncodingRules::Der);
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().kind(), ErrorKind::LengthViolation);
    }

    #[test]
    fn test_ber_allows_non_minimal_length_encoding() {
        let res = parse(Bytes::from(vec![0x02, 0x81, 0x01, 0x00]), EncodingRules::Ber);
        assert!(res.is_ok());
    }

    #[test]
    fn test_reserved_length_0xff_rejected() {
        let res = parse(Bytes::from(vec![0x02, 0xFF]), EncodingRules::Ber);
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().kind(), ErrorKind::LengthViolation);
    }

    #[test]
    fn test_parse_extra_data() {
        let res = parse(Bytes::from(vec![0x02, 0x01, 0x00, 0xFF]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_huge_length() {
        let res = parse(Bytes::from(vec![0x02, 0x84, 0xFF, 0xFF, 0xFF, 0xFF]), EncodingRules::Der);
        assert!(res.is_err());
    }

    #[test]
    fn test_recursion_default_limit_boundary_ok() {
        // default max_depth is 5; 4 nested sequences puts the innermost
        // leaf at depth 5, which must be accepted.
        let data = vec![
            0x30, 0x08, // depth 1
            0x30, 0x06, // depth 2
            0x30, 0x04, // depth 3
            0x30, 0x02, // depth 4
            0x02, 0x00, // depth 5 leaf
        ];
        let res = parse(Bytes::from(data), EncodingRules::Der);
        assert!(res.is_ok());
    }

    #[test]
    fn test_recursion_default_limit_exceeded_errors() {
        let data = vec![
            0x30, 0x0A,
            0x30, 0x08,
            0x30, 0x06,
            0x30, 0x04,
            0x30, 0x02,
            0x02, 0x00,
        ];
        let res = parse(Bytes::from(data), EncodingRules::Der);
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().kind(), ErrorKind::Recursion);
    }

    #[test]
    fn test_is_end_marker() {
        let node = ParserNode {
            identifier: ASN1Identifier::new(0, TagClass::Universal),
            depth: 0,
            is_constructed: false,
            encoded_bytes: Bytes::from(vec![0x00, 0x00]),
            data_bytes: Some(Bytes::from(vec![])),
            rules: EncodingRules::Ber,
        };
        assert!(node.is_end_marker());

        let node2 = ParserNode {
            identifier: ASN1Identifier::new(1, TagClass::Universal),
            depth: 0,
            is_constructed: false,
            encoded_bytes: Bytes::from(vec![0x00, 0x00]),
            data_bytes: Some(Bytes::from(vec![])),
            rules: EncodingRules::Ber,
        };
        assert!(!node2.is_end_marker());
    }

    #[test]
    fn test_indefinite_constructed_encoded_bytes_matches_input() {
        let data = vec![
            0x30, 0x80, // SEQUENCE, indefinite length
            0x02, 0x01, 0x00, // INTEGER (0)
            0x00, 0x00, // EOC
        ];

        let res = parse(Bytes::from(data.clone()), EncodingRules::Ber).unwrap();
        assert!(!res.nodes.is_empty());
        assert!(res.nodes[0].is_constructed);
        assert_eq!(res.nodes[0].encoded_bytes.as_ref(), data.as_slice());
    }

    #[test]
    fn test_der_rejects_indefinite_length_encoding() {
        let data = vec![0x30, 0x80, 0x00, 0x00];
        let err = parse(Bytes::from(data), EncodingRules::Der).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthViolation);
    }

    #[test]
    fn test_indefinite_length_missing_end_marker_rejected() {
        let data = vec![0x30, 0x80, 0x02, 0x01, 0x00];
        let err = parse(Bytes::from(data), EncodingRules::Ber).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncation);
    }

    #[test]
    fn test_read_asn1_length_long_form_with_exact_bytes() {
        let mut data = Bytes::from(vec![0x82, 0x01, 0x02]);
        let result = super::_read_asn1_length(&mut data, false).unwrap();
        match result {
            super::ASN1Length::Definite(value) => assert_eq!(value, 0x0102),
            super::ASN1Length::Indefinite => panic!("expected definite length"),
        }
        assert!(data.is_empty());
    }

    #[test]
    fn test_read_asn1_length_rejects_excessive_length_bytes() {
        let mut data = Bytes::from(vec![0x83, 0x00, 0x01, 0x02]);
        let err = super::_read_asn1_length(&mut data, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthViolation);
    }

    #[test]
    fn test_der_allows_long_form_for_length_128() {
        let mut payload = BytesMut::from(&[0x04, 0x81, 0x80][..]);
        payload.extend_from_slice(&vec![0u8; 128]);
        assert!(parse(payload.freeze(), EncodingRules::Der).is_ok());
    }

    #[test]
    fn test_read_asn1_discipline_uint_multi_byte() {
        let mut data = Bytes::from(vec![0x81, 0x01]);
        let (value, read) = super::read_asn1_discipline_uint(&mut data).unwrap();
        assert_eq!(value, 129);
        assert_eq!(read, 2);
        assert!(data.is_empty());
    }

    #[test]
    fn test_read_asn1_discipline_uint_rejects_leading_zero_continuation_byte() {
        // 0x80 0x81 0x01 would decode to 129 if the leading 0x80 byte were
        // tolerated, but a literal leading continuation byte of 0x80 is a
        // non-minimal encoding regardless of the final magnitude.
        let mut data = Bytes::from(vec![0x80, 0x81, 0x01]);
        let err = super::read_asn1_discipline_uint(&mut data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TagPadding);
    }

    #[test]
    fn test_parse_rejects_long_form_tag_with_leading_zero_continuation_byte() {
        // Identifier octet 0x1F selects long form; 0x80 0x81 0x01 is the
        // tag number, which must be rejected before its magnitude (129) is
        // ever considered.
        let data = Bytes::from(vec![0x1F, 0x80, 0x81, 0x01, 0x00]);
        let err = parse(data, EncodingRules::Der).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TagPadding);
    }

    #[test]
    fn test_minimal_octet_len_values() {
        assert_eq!(super::minimal_octet_len(0), 1);
        assert_eq!(super::minimal_octet_len(1), 1);
        assert_eq!(super::minimal_octet_len(0x80), 1);
        assert_eq!(super::minimal_octet_len(u64::MAX), 8);
    }

    #[test]
    fn test_node_collection_iterator_yields_children_in_order() {
        fn bytes(data: &[u8]) -> Bytes {
            Bytes::from(data.to_vec())
        }

        let nodes = Arc::new(vec![
            ParserNode {
                identifier: ASN1Identifier::SEQUENCE,
                depth: 1,
                is_constructed: true,
                encoded_bytes: bytes(&[0x30, 0x06]),
                data_bytes: None,
                rules: EncodingRules::Der,
            },
            ParserNode {
                identifier: ASN1Identifier::INTEGER,
                depth: 2,
                is_constructed: false,
                encoded_bytes: bytes(&[0x02, 0x01, 0x01]),
                data_bytes: Some(bytes(&[0x01])),
                rules: EncodingRules::Der,
            },
            ParserNode {
                identifier: ASN1Identifier::SEQUENCE,
                depth: 2,
                is_constructed: true,
                encoded_bytes: bytes(&[0x30, 0x03]),
                data_bytes: None,
                rules: EncodingRules::Der,
            },
            ParserNode {
                identifier: ASN1Identifier::INTEGER,
                depth: 3,
                is_constructed: false,
                encoded_bytes: bytes(&[0x02, 0x01, 0x02]),
                data_bytes: Some(bytes(&[0x02])),
                rules: EncodingRules::Der,
            },
        ]);

        let collection = ASN1NodeCollection::new(nodes.clone(), 1..nodes.len(), 1);
        let mut iter = collection.into_iter();

        let first = iter.next().expect("first child");
        match first.content {
            Content::Primitive(bytes) => assert_eq!(bytes.as_ref(), &[0x01]),
            Content::Constructed(_) => panic!("expected primitive child"),
        }

        let second = iter.next().expect("second child");
        match second.content {
            Content::Constructed(child_collection) => {
                let mut child_iter = child_collection.into_iter();
                let grandchild = child_iter.next().expect("grandchild");
                match grandchild.content {
                    Content::Primitive(bytes) => assert_eq!(bytes.as_ref(), &[0x02]),
                    Content::Constructed(_) => panic!("expected primitive grandchild"),
                }
                assert!(child_iter.next().is_none());
            }
            Content::Primitive(_) => panic!("expected constructed child"),
        }

        assert!(iter.next().is_none());
    }
}
