use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::cer;
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1OctetString(pub Bytes);

impl From<Vec<u8>> for ASN1OctetString {
    fn from(v: Vec<u8>) -> Self {
        ASN1OctetString(Bytes::from(v))
    }
}

impl From<&[u8]> for ASN1OctetString {
    fn from(v: &[u8]) -> Self {
        ASN1OctetString(Bytes::copy_from_slice(v))
    }
}

impl DERParseable for ASN1OctetString {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1OctetString::default_identifier())
    }
}

impl DERSerializable for ASN1OctetString {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let threshold = serializer.rules().octet_segmentation_threshold();
        cer::write_segmented(serializer, Self::default_identifier(), &self.0, threshold)
    }
}

impl DERImplicitlyTaggable for ASN1OctetString {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::OCTET_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => Ok(ASN1OctetString(bytes)),
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "DER OCTET STRING must be primitive")),
        }
    }
}

// BER and CER both allow constructed OCTET STRING, reassembled the same way.
impl BERParseable for ASN1OctetString {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1OctetString::default_identifier())
    }
}

impl BERSerializable for ASN1OctetString {}

impl BERImplicitlyTaggable for ASN1OctetString {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        cer::reassemble(node, identifier).map(ASN1OctetString)
    }
}
