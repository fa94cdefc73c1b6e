use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1BitString {
    pub bytes: Bytes,
    pub padding_bits: u8,
}

impl ASN1BitString {
    pub fn new(bytes: Bytes, padding_bits: u8) -> Result<Self, ASN1Error> {
        if padding_bits > 7 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "BIT STRING padding bits must be 0..=7"));
        }
        if bytes.is_empty() && padding_bits != 0 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "Empty BIT STRING must have 0 padding bits"));
        }
        Ok(ASN1BitString { bytes, padding_bits })
    }

    fn check_unused_bits_zero(&self) -> Result<(), ASN1Error> {
        if let Some(&last) = self.bytes.last() {
            let mask = if self.padding_bits == 0 { 0 } else { (1u8 << self.padding_bits) - 1 };
            if last & mask != 0 {
                return Err(asn1_err!(ErrorKind::ValuePadding, "BIT STRING unused bits must be zero"));
            }
        }
        Ok(())
    }

    fn decode_leaf(bytes: Bytes) -> Result<Self, ASN1Error> {
        if bytes.is_empty() {
            return Err(asn1_err!(ErrorKind::ValueSize, "Empty BIT STRING content (missing padding byte)"));
        }
        let padding_bits = bytes[0];
        if padding_bits > 7 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "Invalid padding bits in BIT STRING"));
        }
        let data = bytes.slice(1..);
        if data.is_empty() && padding_bits != 0 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "Empty BIT STRING with non-zero padding"));
        }
        let value = ASN1BitString { bytes: data, padding_bits };
        value.check_unused_bits_zero()?;
        Ok(value)
    }
}

impl DERParseable for ASN1BitString {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1BitString::default_identifier())
    }
}

impl DERSerializable for ASN1BitString {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        write_segmented(serializer, Self::default_identifier(), self)
    }
}

impl DERImplicitlyTaggable for ASN1BitString {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::BIT_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => Self::decode_leaf(bytes),
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "DER BIT STRING must be primitive")),
        }
    }
}

impl BERParseable for ASN1BitString {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1BitString::default_identifier())
    }
}

impl BERSerializable for ASN1BitString {}

impl BERImplicitlyTaggable for ASN1BitString {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        let rules = node.rules;
        match node.content {
            Content::Primitive(bytes) => {
                if bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "Empty BIT STRING content"));
                }
                let padding_bits = bytes[0];
                if padding_bits > 7 {
                    return Err(asn1_err!(ErrorKind::ValuePadding, "Invalid padding bits"));
                }
                let data = bytes.slice(1..);
                if let Some(limit_bits) = rules.bit_segmentation_threshold() {
                    if data.len() * 8 > limit_bits {
                        return Err(asn1_err!(
                            ErrorKind::Construction,
                            "CER requires segmentation above {} bits, but a primitive BIT STRING of {} bits was not segmented",
                            limit_bits,
                            data.len() * 8
                        ));
                    }
                }
                Ok(ASN1BitString { bytes: data, padding_bits })
            }
            Content::Constructed(collection) => reassemble_segments(collection, identifier, rules),
        }
    }
}

/// Reassembles a constructed BIT STRING's segments. Every child but the
/// last must carry 0 padding bits (only the final chunk is allowed to be
/// short); the reassembled value's padding bits come from the last child.
///
/// Under `EncodingRules::Cer`, every child but the last must also be a
/// full 125-octet (1000-bit) chunk, and the reassembled value's total bit
/// length must actually exceed the threshold — otherwise segmentation was
/// unnecessary and the shape is non-canonical.
pub(crate) fn reassemble_segments(
    collection: crate::asn1::ASN1NodeCollection,
    identifier: ASN1Identifier,
    rules: crate::asn1::EncodingRules,
) -> Result<ASN1BitString, ASN1Error> {
    let children: Vec<ASN1Node> = collection.into_iter().collect();
    if children.is_empty() {
        return Err(asn1_err!(ErrorKind::ValueSize, "Constructed BIT STRING has no segments"));
    }

    let threshold_bits = rules.bit_segmentation_threshold();
    let limit_bytes = threshold_bits.map(|bits| bits / 8);
    let mut out = BytesMut::new();
    let mut final_padding = 0u8;
    let last_index = children.len() - 1;

    for (i, child) in children.into_iter().enumerate() {
        if child.identifier != identifier {
            return Err(asn1_err!(ErrorKind::TagNumber, "Segmented BIT STRING contains a child with a different tag"));
        }
        let leaf = match child.content {
            Content::Primitive(bytes) => ASN1BitString::decode_leaf(bytes)?,
            Content::Constructed(_) => {
                return Err(asn1_err!(ErrorKind::Construction, "Segmented BIT STRING's children must themselves be primitive"));
            }
        };
        if i != last_index && leaf.padding_bits != 0 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "Only the final BIT STRING segment may have padding bits"));
        }
        if let Some(limit) = limit_bytes {
            if i != last_index && leaf.bytes.len() != limit {
                return Err(asn1_err!(
                    ErrorKind::ValueSize,
                    "CER BIT STRING segment {} has {} octets, expected a full {}-octet chunk",
                    i,
                    leaf.bytes.len(),
                    limit
                ));
            }
        }
        out.extend_from_slice(&leaf.bytes);
        final_padding = leaf.padding_bits;
    }

    if let Some(limit_bits) = threshold_bits {
        if out.len() * 8 <= limit_bits {
            return Err(asn1_err!(
                ErrorKind::Construction,
                "CER BIT STRING of {} bits did not need segmentation above {}",
                out.len() * 8,
                limit_bits
            ));
        }
    }

    ASN1BitString::new(out.freeze(), final_padding)
}

/// CER requires segments of at most 1000 bits (125 octets) each, wrapped in
/// a constructed indefinite-length value; every segment but the last is a
/// full 125-octet chunk with 0 padding bits.
pub(crate) fn write_segmented(serializer: &mut Serializer, identifier: ASN1Identifier, value: &ASN1BitString) -> Result<(), ASN1Error> {
    let threshold_bits = serializer.rules().bit_segmentation_threshold();
    let total_bits = value.bytes.len() * 8;

    match threshold_bits {
        Some(limit_bits) if total_bits > limit_bits => {
            let limit_bytes = limit_bits / 8;
            let mut children = BytesMut::new();
            let chunks: Vec<&[u8]> = value.bytes.chunks(limit_bytes).collect();
            let last_index = chunks.len() - 1;

            for (i, chunk) in chunks.into_iter().enumerate() {
                let chunk_padding = if i == last_index { value.padding_bits } else { 0 };
                let mut chunk_serializer = Serializer::with_rules(serializer.rules());
                chunk_serializer.append_primitive_node(identifier, |buf| {
                    buf.push(chunk_padding);
                    buf.extend_from_slice(chunk);
                    Ok(())
                })?;
                children.extend_from_slice(chunk_serializer.serialized_bytes().as_ref());
            }
            serializer.append_indefinite_constructed(identifier, &children);
            Ok(())
        }
        _ => serializer.append_primitive_node(identifier, |buf| {
            buf.push(value.padding_bits);
            buf.extend_from_slice(&value.bytes);
            Ok(())
        }),
    }
}
