use crate::asn1::ASN1Node;
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ASN1Boolean(pub bool);

impl From<bool> for ASN1Boolean {
    fn from(b: bool) -> Self {
        ASN1Boolean(b)
    }
}

impl From<ASN1Boolean> for bool {
    fn from(val: ASN1Boolean) -> Self {
        val.0
    }
}

impl DERParseable for ASN1Boolean {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1Boolean::default_identifier())
    }
}

impl DERSerializable for ASN1Boolean {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.push(if self.0 { 0xFF } else { 0x00 });
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1Boolean {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::BOOLEAN
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;

        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                if bytes.len() != 1 {
                    return Err(asn1_err!(ErrorKind::ValueSize, "BOOLEAN must have length 1"));
                }
                match bytes[0] {
                    0x00 => Ok(ASN1Boolean(false)),
                    0xFF => Ok(ASN1Boolean(true)),
                    _ => Err(asn1_err!(
                        ErrorKind::ValuePadding,
                        "BOOLEAN must be encoded as 0x00 or 0xFF under DER/CER"
                    )),
                }
            }
            _ => Err(asn1_err!(ErrorKind::Construction, "BOOLEAN must be primitive")),
        }
    }
}

impl BERParseable for ASN1Boolean {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1Boolean::default_identifier())
    }
}

impl BERSerializable for ASN1Boolean {}

impl BERImplicitlyTaggable for ASN1Boolean {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;

        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                if bytes.len() != 1 {
                    return Err(asn1_err!(ErrorKind::ValueSize, "BOOLEAN must have length 1"));
                }
                match bytes[0] {
                    0x00 => Ok(ASN1Boolean(false)),
                    _ => Ok(ASN1Boolean(true)),
                }
            }
            _ => Err(asn1_err!(ErrorKind::Construction, "BOOLEAN must be primitive")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_der_rejects_non_canonical_true() {
        let node = crate::der::parse(&[0x01, 0x01, 0x01]).unwrap();
        let err = ASN1Boolean::from_der_node(node).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValuePadding);
    }

    #[test]
    fn test_ber_accepts_any_nonzero_as_true() {
        let node = crate::ber::parse(&[0x01, 0x01, 0x01]).unwrap();
        let value = ASN1Boolean::from_ber_node(node).unwrap();
        assert!(value.0);
    }

    #[test]
    fn test_roundtrip_true_and_false() {
        for b in [true, false] {
            let mut serializer = Serializer::new();
            ASN1Boolean(b).serialize(&mut serializer).unwrap();
            let node = crate::der::parse(&serializer.serialized_bytes()).unwrap();
            assert_eq!(ASN1Boolean::from_der_node(node).unwrap().0, b);
        }
    }
}
