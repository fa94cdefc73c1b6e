//! Context-switching types (EXTERNAL, EMBEDDED PDV, CHARACTER STRING) whose
//! identification is a restricted CHOICE under CER/DER: the presentation
//! layer's indirect-reference and context-negotiation forms that BER allows
//! are either rejected outright (EXTERNAL) or downgraded to `fixed` on
//! encode and rejected on decode (EMBEDDED PDV, CHARACTER STRING).

use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::cer;
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::bit_string::{self, ASN1BitString};
use crate::types::identifier::{ASN1Identifier, TagClass};
use crate::types::null::ASN1Null;
use crate::types::object_identifier::ASN1ObjectIdentifier;
use crate::types::octet_string::ASN1OctetString;
use crate::types::strings::ASN1ObjectDescriptor;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalEncoding {
    /// `[0] single-ASN1-type`: the already-encoded TLV of an arbitrary value,
    /// opaque to this codec (no schema is available to interpret it).
    SingleAsn1Value(Bytes),
    /// `[1] octet-aligned`: an implicitly-tagged OCTET STRING.
    OctetAligned(ASN1OctetString),
    /// `[2] arbitrary`: an implicitly-tagged BIT STRING.
    Arbitrary(ASN1BitString),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1External {
    pub direct_reference: ASN1ObjectIdentifier,
    pub data_value_descriptor: Option<ASN1ObjectDescriptor>,
    pub encoding: ExternalEncoding,
}

impl DERParseable for ASN1External {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        crate::der::sequence(node, Self::default_identifier(), |iter| {
            let direct_reference = ASN1ObjectIdentifier::from_der_iterator(iter)?;

            let data_value_descriptor = match iter.peek() {
                Some(n) if n.identifier == ASN1ObjectDescriptor::default_identifier() => {
                    iter.next();
                    Some(ASN1ObjectDescriptor::from_der_node(n)?)
                }
                _ => None,
            };

            let data_value_node = iter.next().ok_or_else(|| {
                asn1_err!(ErrorKind::Truncation, "EXTERNAL is missing its context-tagged data-value")
            })?;
            if data_value_node.identifier.tag_class != TagClass::ContextSpecific {
                return Err(asn1_err!(ErrorKind::TagClass, "EXTERNAL data-value must be context-specific"));
            }

            let encoding = match data_value_node.identifier.tag_number {
                0 => match data_value_node.content {
                    Content::Constructed(collection) => {
                        let mut children = collection.into_iter();
                        let inner = children.next().ok_or_else(|| {
                            asn1_err!(ErrorKind::Truncation, "EXTERNAL single-ASN1-value wraps no element")
                        })?;
                        if children.next().is_some() {
                            return Err(asn1_err!(ErrorKind::ValueSize, "EXTERNAL single-ASN1-value wraps more than one element"));
                        }
                        ExternalEncoding::SingleAsn1Value(inner.encoded_bytes)
                    }
                    Content::Primitive(_) => {
                        return Err(asn1_err!(ErrorKind::Construction, "EXTERNAL single-ASN1-value must be constructed"));
                    }
                },
                1 => ExternalEncoding::OctetAligned(ASN1OctetString(cer::reassemble(data_value_node, ASN1Identifier::context(1))?)),
                2 => ExternalEncoding::Arbitrary(ASN1BitString::from_ber_node_with_identifier(data_value_node, ASN1Identifier::context(2))?),
                _ => return Err(asn1_err!(ErrorKind::ValueUndefined, "EXTERNAL data-value tag must be 0, 1, or 2")),
            };

            Ok(ASN1External { direct_reference, data_value_descriptor, encoding })
        })
    }
}

impl DERSerializable for ASN1External {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_constructed_node(Self::default_identifier(), |seq| {
            seq.serialize(&self.direct_reference)?;
            seq.serialize(&self.data_value_descriptor)?;
            match &self.encoding {
                ExternalEncoding::SingleAsn1Value(raw) => {
                    seq.append_constructed_node(ASN1Identifier::context(0), |inner| {
                        inner.append_raw(raw);
                        Ok(())
                    })
                }
                ExternalEncoding::OctetAligned(octets) => {
                    let threshold = seq.rules().octet_segmentation_threshold();
                    cer::write_segmented(seq, ASN1Identifier::context(1), &octets.0, threshold)
                }
                ExternalEncoding::Arbitrary(bits) => bit_string::write_segmented(seq, ASN1Identifier::context(2), bits),
            }
        })
    }
}

impl DERImplicitlyTaggable for ASN1External {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::EXTERNAL
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        Self::from_der_node(ASN1Node { identifier, ..node })
    }
}

impl BERParseable for ASN1External {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
}
impl BERSerializable for ASN1External {}
impl BERImplicitlyTaggable for ASN1External {}

/// The identification CHOICE shared by EMBEDDED PDV and CHARACTER STRING.
/// `PresentationContextId` and `ContextNegotiation` are representable (BER
/// allows them) but an encoder silently downgrades them to `Fixed`; a
/// decoder never accepts tags 2 or 3 under CER/DER.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PdvIdentification {
    Syntaxes { abstract_syntax: ASN1ObjectIdentifier, transfer_syntax: ASN1ObjectIdentifier },
    Syntax(ASN1ObjectIdentifier),
    PresentationContextId(i64),
    ContextNegotiation { presentation_context_id: i64, transfer_syntax: ASN1ObjectIdentifier },
    TransferSyntax(ASN1ObjectIdentifier),
    Fixed,
}

fn decode_identification(node: ASN1Node) -> Result<PdvIdentification, ASN1Error> {
    if node.identifier.tag_class != TagClass::ContextSpecific {
        return Err(asn1_err!(ErrorKind::TagClass, "PDV identification must be context-specific"));
    }
    match node.identifier.tag_number {
        0 => match node.content {
            Content::Constructed(collection) => {
                let mut children = collection.into_iter();
                let abstract_syntax = ASN1ObjectIdentifier::from_der_node(children.next().ok_or_else(|| {
                    asn1_err!(ErrorKind::Truncation, "PDV syntaxes is missing its abstract-syntax OID")
                })?)?;
                let transfer_syntax = ASN1ObjectIdentifier::from_der_node(children.next().ok_or_else(|| {
                    asn1_err!(ErrorKind::Truncation, "PDV syntaxes is missing its transfer-syntax OID")
                })?)?;
                if children.next().is_some() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "PDV syntaxes has more than two OIDs"));
                }
                Ok(PdvIdentification::Syntaxes { abstract_syntax, transfer_syntax })
            }
            Content::Primitive(_) => Err(asn1_err!(ErrorKind::Construction, "PDV syntaxes must be constructed")),
        },
        1 => Ok(PdvIdentification::Syntax(ASN1ObjectIdentifier::from_der_node_with_identifier(node, ASN1Identifier::context(1))?)),
        4 => Ok(PdvIdentification::TransferSyntax(ASN1ObjectIdentifier::from_der_node_with_identifier(node, ASN1Identifier::context(4))?)),
        5 => {
            ASN1Null::from_der_node_with_identifier(node, ASN1Identifier::context(5))?;
            Ok(PdvIdentification::Fixed)
        }
        2 | 3 => Err(asn1_err!(ErrorKind::ValueUndefined, "presentation-context-id / context-negotiation identification is forbidden under CER/DER")),
        _ => Err(asn1_err!(ErrorKind::ValueUndefined, "PDV identification tag must be one of 0, 1, 4, 5")),
    }
}

fn encode_identification(identification: &PdvIdentification, seq: &mut Serializer) -> Result<(), ASN1Error> {
    match identification {
        PdvIdentification::Syntaxes { abstract_syntax, transfer_syntax } => {
            seq.append_constructed_node(ASN1Identifier::context(0), |inner| {
                inner.serialize(abstract_syntax)?;
                inner.serialize(transfer_syntax)
            })
        }
        PdvIdentification::Syntax(oid) => {
            let bytes = encode_oid_bytes(oid)?;
            seq.append_primitive_node(ASN1Identifier::context(1), |buf| {
                buf.extend_from_slice(&bytes);
                Ok(())
            })
        }
        PdvIdentification::TransferSyntax(oid) => {
            let bytes = encode_oid_bytes(oid)?;
            seq.append_primitive_node(ASN1Identifier::context(4), |buf| {
                buf.extend_from_slice(&bytes);
                Ok(())
            })
        }
        // Downgraded silently: BER permits these, CER/DER never produces them.
        PdvIdentification::PresentationContextId(_) | PdvIdentification::ContextNegotiation { .. } | PdvIdentification::Fixed => {
            seq.append_primitive_node(ASN1Identifier::context(5), |_| Ok(()))
        }
    }
}

fn encode_oid_bytes(oid: &ASN1ObjectIdentifier) -> Result<Vec<u8>, ASN1Error> {
    let mut serializer = Serializer::new();
    oid.serialize(&mut serializer)?;
    let full = serializer.serialized_bytes();
    let node = crate::der::parse(&full)?;
    match node.content {
        Content::Primitive(bytes) => Ok(bytes.to_vec()),
        Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "OBJECT IDENTIFIER must be primitive")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1EmbeddedPdv {
    pub identification: PdvIdentification,
    pub data_value: Bytes,
}

impl DERParseable for ASN1EmbeddedPdv {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        crate::der::sequence(node, Self::default_identifier(), |iter| {
            let id_node = iter.next().ok_or_else(|| asn1_err!(ErrorKind::Truncation, "EMBEDDED PDV is missing identification"))?;
            let identification = decode_identification(id_node)?;
            let value_node = iter.next().ok_or_else(|| asn1_err!(ErrorKind::Truncation, "EMBEDDED PDV is missing its data-value"))?;
            let data_value = cer::reassemble(value_node, ASN1Identifier::context(2))?;
            Ok(ASN1EmbeddedPdv { identification, data_value })
        })
    }
}

impl DERSerializable for ASN1EmbeddedPdv {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_constructed_node(Self::default_identifier(), |seq| {
            encode_identification(&self.identification, seq)?;
            let threshold = seq.rules().octet_segmentation_threshold();
            cer::write_segmented(seq, ASN1Identifier::context(2), &self.data_value, threshold)
        })
    }
}

impl DERImplicitlyTaggable for ASN1EmbeddedPdv {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::EMBEDDED_PDV
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        Self::from_der_node(ASN1Node { identifier, ..node })
    }
}

impl BERParseable for ASN1EmbeddedPdv {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
}
impl BERSerializable for ASN1EmbeddedPdv {}
impl BERImplicitlyTaggable for ASN1EmbeddedPdv {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1CharacterString {
    pub identification: PdvIdentification,
    pub string_value: String,
}

impl DERParseable for ASN1CharacterString {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        crate::der::sequence(node, Self::default_identifier(), |iter| {
            let id_node = iter.next().ok_or_else(|| asn1_err!(ErrorKind::Truncation, "CHARACTER STRING is missing identification"))?;
            let identification = decode_identification(id_node)?;
            let value_node = iter.next().ok_or_else(|| asn1_err!(ErrorKind::Truncation, "CHARACTER STRING is missing its string-value"))?;
            let bytes = cer::reassemble(value_node, ASN1Identifier::context(2))?;
            let string_value = String::from_utf8(bytes.to_vec())
                .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "CHARACTER STRING value is not valid UTF-8"))?;
            Ok(ASN1CharacterString { identification, string_value })
        })
    }
}

impl DERSerializable for ASN1CharacterString {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_constructed_node(Self::default_identifier(), |seq| {
            encode_identification(&self.identification, seq)?;
            let threshold = seq.rules().octet_segmentation_threshold();
            cer::write_segmented(seq, ASN1Identifier::context(2), self.string_value.as_bytes(), threshold)
        })
    }
}

impl DERImplicitlyTaggable for ASN1CharacterString {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::CHARACTER_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        Self::from_der_node(ASN1Node { identifier, ..node })
    }
}

impl BERParseable for ASN1CharacterString {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
}
impl BERSerializable for ASN1CharacterString {}
impl BERImplicitlyTaggable for ASN1CharacterString {}
