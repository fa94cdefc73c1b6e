use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ASN1Null;

impl DERParseable for ASN1Null {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1Null::default_identifier())
    }
}

impl DERSerializable for ASN1Null {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |_| Ok(()))
    }
}

impl DERImplicitlyTaggable for ASN1Null {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::NULL
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => {
                if !bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "NULL must have 0 length"));
                }
                Ok(ASN1Null)
            }
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "NULL must be primitive")),
        }
    }
}

impl BERParseable for ASN1Null {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1Null::default_identifier())
    }
}

impl BERSerializable for ASN1Null {}

impl BERImplicitlyTaggable for ASN1Null {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_nonzero_length() {
        let node = crate::der::parse(&[0x05, 0x01, 0x00]).unwrap();
        let err = ASN1Null::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueSize);
    }

    #[test]
    fn test_roundtrip() {
        let mut serializer = Serializer::new();
        ASN1Null.serialize(&mut serializer).unwrap();
        let bytes = serializer.serialized_bytes();
        assert_eq!(bytes, vec![0x05, 0x00]);

        let node = crate::der::parse(&bytes).unwrap();
        assert_eq!(ASN1Null::from_der_node(node).unwrap(), ASN1Null);
    }
}
