use crate::asn1::ASN1Node;
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use num_bigint::BigInt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1Integer {
    pub value: BigInt,
}

impl From<i64> for ASN1Integer {
    fn from(v: i64) -> Self {
        ASN1Integer { value: BigInt::from(v) }
    }
}

impl From<BigInt> for ASN1Integer {
    fn from(v: BigInt) -> Self {
        ASN1Integer { value: v }
    }
}

impl DERParseable for ASN1Integer {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1Integer::default_identifier())
    }
}

impl DERSerializable for ASN1Integer {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&self.value.to_signed_bytes_be());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1Integer {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::INTEGER
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;

        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                if bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "INTEGER with 0 content octets"));
                }

                if bytes.len() > 1 {
                    let first = bytes[0];
                    let second = bytes[1];
                    if first == 0x00 && (second & 0x80) == 0 {
                        return Err(asn1_err!(
                            ErrorKind::ValuePadding,
                            "INTEGER encoded with redundant leading zero byte"
                        ));
                    }
                    if first == 0xFF && (second & 0x80) == 0x80 {
                        return Err(asn1_err!(
                            ErrorKind::ValuePadding,
                            "INTEGER encoded with redundant leading 0xFF byte"
                        ));
                    }
                }

                Ok(ASN1Integer { value: BigInt::from_signed_bytes_be(&bytes) })
            }
            _ => Err(asn1_err!(ErrorKind::Construction, "INTEGER must be primitive")),
        }
    }
}

impl BERParseable for ASN1Integer {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1Integer::default_identifier())
    }
}

impl BERSerializable for ASN1Integer {}

impl BERImplicitlyTaggable for ASN1Integer {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;

        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                if bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "INTEGER with 0 content octets"));
                }
                Ok(ASN1Integer { value: BigInt::from_signed_bytes_be(&bytes) })
            }
            _ => Err(asn1_err!(ErrorKind::Construction, "INTEGER must be primitive")),
        }
    }
}

/// ENUMERATED shares INTEGER's minimal two's-complement encoding, but is
/// its own universal type (tag 10) and does not implicitly convert to/from
/// plain integers the way `ASN1Integer` does for the native int types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1Enumerated {
    pub value: BigInt,
}

impl From<i64> for ASN1Enumerated {
    fn from(v: i64) -> Self {
        ASN1Enumerated { value: BigInt::from(v) }
    }
}

impl DERParseable for ASN1Enumerated {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1Enumerated::default_identifier())
    }
}

impl DERSerializable for ASN1Enumerated {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&self.value.to_signed_bytes_be());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1Enumerated {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::ENUMERATED
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        let integer = ASN1Integer::from_der_node_with_identifier(
            ASN1Node { identifier: node.identifier, ..node },
            identifier,
        )?;
        Ok(ASN1Enumerated { value: integer.value })
    }
}

impl BERParseable for ASN1Enumerated {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1Enumerated::default_identifier())
    }
}

impl BERSerializable for ASN1Enumerated {}

impl BERImplicitlyTaggable for ASN1Enumerated {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        let integer = ASN1Integer::from_ber_node_with_identifier(node, identifier)?;
        Ok(ASN1Enumerated { value: integer.value })
    }
}
