//! CER segmentation: the one framing behavior that is neither BER's laxity
//! nor DER's strictness. Primitive string-shaped values above a per-type
//! threshold are encoded as a constructed, indefinite-length wrapper around
//! maximal-size primitive chunks, terminated by EOC; decoding accepts either
//! a single primitive leaf or that wrapper form and reassembles the bytes
//! before the type's own value codec runs.

use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::der::Serializer;
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::{Bytes, BytesMut};

/// Encodes `content` under `identifier`, segmenting into indefinite-length
/// chunks of at most `threshold` bytes each if the serializer's rules call
/// for segmentation and `content` exceeds it. The final chunk may be
/// shorter than `threshold`; CER requires this last chunk be written even
/// if empty is not produced (a zero-length final chunk is not emitted).
pub(crate) fn write_segmented(
    serializer: &mut Serializer,
    identifier: ASN1Identifier,
    content: &[u8],
    threshold: Option<usize>,
) -> Result<(), ASN1Error> {
    match threshold {
        Some(limit) if content.len() > limit => {
            let mut children = BytesMut::new();
            for chunk in content.chunks(limit) {
                let mut child = Vec::new();
                {
                    let mut chunk_serializer = Serializer::with_rules(serializer.rules());
                    chunk_serializer.append_primitive_node(identifier, |buf| {
                        buf.extend_from_slice(chunk);
                        Ok(())
                    })?;
                    child.extend_from_slice(chunk_serializer.serialized_bytes().as_ref());
                }
                children.extend_from_slice(&child);
            }
            serializer.append_indefinite_constructed(identifier, &children);
            Ok(())
        }
        _ => serializer.append_primitive_node(identifier, |buf| {
            buf.extend_from_slice(content);
            Ok(())
        }),
    }
}

/// Reassembles a node's content into a single contiguous byte buffer.
/// Accepts a primitive leaf as-is, or a constructed indefinite wrapper whose
/// every child is a primitive leaf with the same identifier — the shape
/// CER's segmentation engine produces. Any other constructed shape
/// (nested constructed children, mismatched identifiers) is rejected.
///
/// Under `EncodingRules::Cer`, a constructed wrapper must also be the
/// canonical shape: it may only appear when the reassembled content
/// actually exceeds the threshold, and every child but the last must be a
/// full-threshold chunk. A primitive leaf longer than the threshold is
/// rejected too, since CER requires it to have been segmented.
pub(crate) fn reassemble(node: ASN1Node, identifier: ASN1Identifier) -> Result<Bytes, ASN1Error> {
    crate::der::check_identifier(&node, identifier)?;
    let rules = node.rules;
    let threshold = rules.octet_segmentation_threshold();
    match node.content {
        Content::Primitive(bytes) => {
            if let Some(limit) = threshold {
                if bytes.len() > limit {
                    return Err(asn1_err!(
                        ErrorKind::Construction,
                        "CER requires segmentation above {} octets, but a primitive value of {} octets was not segmented",
                        limit,
                        bytes.len()
                    ));
                }
            }
            Ok(bytes)
        }
        Content::Constructed(collection) => {
            let children: Vec<ASN1Node> = collection.into_iter().collect();
            if children.is_empty() {
                return Err(asn1_err!(ErrorKind::ValueSize, "Segmented value has no segments"));
            }
            let last_index = children.len() - 1;
            let mut out = BytesMut::new();
            for (i, child) in children.into_iter().enumerate() {
                if child.identifier != identifier {
                    return Err(asn1_err!(
                        ErrorKind::TagNumber,
                        "Segmented value contains a child with a different tag"
                    ));
                }
                let bytes = match child.content {
                    Content::Primitive(bytes) => bytes,
                    Content::Constructed(_) => {
                        return Err(asn1_err!(
                            ErrorKind::Construction,
                            "Segmented value's children must themselves be primitive"
                        ));
                    }
                };
                if let Some(limit) = threshold {
                    if i != last_index && bytes.len() != limit {
                        return Err(asn1_err!(
                            ErrorKind::ValueSize,
                            "CER segment {} has {} octets, expected a full {}-octet chunk",
                            i,
                            bytes.len(),
                            limit
                        ));
                    }
                }
                out.extend_from_slice(&bytes);
            }
            if let Some(limit) = threshold {
                if out.len() <= limit {
                    return Err(asn1_err!(
                        ErrorKind::Construction,
                        "CER value of {} octets did not need segmentation above {}",
                        out.len(),
                        limit
                    ));
                }
            }
            Ok(out.freeze())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::EncodingRules;

    #[test]
    fn test_write_segmented_below_threshold_stays_primitive() {
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        write_segmented(&mut serializer, ASN1Identifier::OCTET_STRING, &[1, 2, 3], Some(1000)).unwrap();
        let out = serializer.serialized_bytes();
        assert_eq!(out[0], 0x04);
        assert_eq!(out[1], 0x03);
    }

    #[test]
    fn test_write_segmented_above_threshold_wraps_indefinite() {
        let content = vec![0xAB; 1500];
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        write_segmented(&mut serializer, ASN1Identifier::OCTET_STRING, &content, Some(1000)).unwrap();
        let out = serializer.serialized_bytes();

        // Constructed OCTET STRING tag (0x24), indefinite length (0x80).
        assert_eq!(out[0], 0x24);
        assert_eq!(out[1], 0x80);
        // First chunk: 04 82 03 E8 <1000 bytes>
        assert_eq!(&out[2..6], &[0x04, 0x82, 0x03, 0xE8]);
        // Final chunk starts at offset 2+4+1000 = 1006: 04 82 01 F4 <500 bytes>
        assert_eq!(&out[1006..1010], &[0x04, 0x82, 0x01, 0xF4]);
        // Trailing EOC.
        let len = out.len();
        assert_eq!(&out[len - 2..], &[0x00, 0x00]);
    }

    #[test]
    fn test_reassemble_primitive_passthrough() {
        let node = ASN1Node {
            identifier: ASN1Identifier::OCTET_STRING,
            content: Content::Primitive(Bytes::from_static(&[1, 2, 3])),
            encoded_bytes: Bytes::new(),
            rules: EncodingRules::Cer,
        };
        let out = reassemble(node, ASN1Identifier::OCTET_STRING).unwrap();
        assert_eq!(out.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_reassemble_rejects_oversized_primitive_under_cer() {
        let content = vec![0x11; 1500];
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        serializer
            .append_primitive_node(ASN1Identifier::OCTET_STRING, |buf| {
                buf.extend_from_slice(&content);
                Ok(())
            })
            .unwrap();
        let encoded = serializer.serialized_bytes();

        let node = crate::cer::parse(&encoded, &crate::config::DecoderConfig::default()).unwrap();
        let err = reassemble(node, ASN1Identifier::OCTET_STRING).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_reassemble_rejects_non_full_non_final_chunk() {
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        let mut children = BytesMut::new();
        {
            let mut chunk_serializer = Serializer::with_rules(EncodingRules::Cer);
            chunk_serializer
                .append_primitive_node(ASN1Identifier::OCTET_STRING, |buf| {
                    buf.extend_from_slice(&vec![0xAA; 999]);
                    Ok(())
                })
                .unwrap();
            children.extend_from_slice(chunk_serializer.serialized_bytes().as_ref());
        }
        {
            let mut chunk_serializer = Serializer::with_rules(EncodingRules::Cer);
            chunk_serializer
                .append_primitive_node(ASN1Identifier::OCTET_STRING, |buf| {
                    buf.extend_from_slice(&vec![0xBB; 501]);
                    Ok(())
                })
                .unwrap();
            children.extend_from_slice(chunk_serializer.serialized_bytes().as_ref());
        }
        serializer.append_indefinite_constructed(ASN1Identifier::OCTET_STRING, &children);
        let encoded = serializer.serialized_bytes();

        let node = crate::cer::parse(&encoded, &crate::config::DecoderConfig::default()).unwrap();
        let err = reassemble(node, ASN1Identifier::OCTET_STRING).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueSize);
    }

    #[test]
    fn test_reassemble_rejects_unnecessary_segmentation() {
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        let mut children = BytesMut::new();
        {
            let mut chunk_serializer = Serializer::with_rules(EncodingRules::Cer);
            chunk_serializer
                .append_primitive_node(ASN1Identifier::OCTET_STRING, |buf| {
                    buf.extend_from_slice(&vec![0xCC; 10]);
                    Ok(())
                })
                .unwrap();
            children.extend_from_slice(chunk_serializer.serialized_bytes().as_ref());
        }
        serializer.append_indefinite_constructed(ASN1Identifier::OCTET_STRING, &children);
        let encoded = serializer.serialized_bytes();

        let node = crate::cer::parse(&encoded, &crate::config::DecoderConfig::default()).unwrap();
        let err = reassemble(node, ASN1Identifier::OCTET_STRING).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_roundtrip_through_cer_parse() {
        let content = vec![0x42; 2500];
        let mut serializer = Serializer::with_rules(EncodingRules::Cer);
        write_segmented(&mut serializer, ASN1Identifier::OCTET_STRING, &content, Some(1000)).unwrap();
        let encoded = serializer.serialized_bytes();

        let node = crate::cer::parse(&encoded, &crate::config::DecoderConfig::default()).unwrap();
        let out = reassemble(node, ASN1Identifier::OCTET_STRING).unwrap();
        assert_eq!(out.as_ref(), content.as_slice());
    }
}

pub fn parse(data: &[u8], config: &crate::config::DecoderConfig) -> Result<ASN1Node, ASN1Error> {
    let bytes = Bytes::copy_from_slice(data);
    let result = crate::asn1::ParseResult::parse(bytes, crate::asn1::EncodingRules::Cer, config)?;
    crate::der::single_root(result)
}
