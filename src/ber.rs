use crate::asn1::{ASN1Node, ASN1NodeCollection, ASN1NodeCollectionIterator, EncodingRules, ParseResult};
use crate::asn1_err;
use crate::config::DecoderConfig;
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::Bytes;

pub trait BERParseable: DERParseable {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }

    fn from_ber_iterator(iter: &mut ASN1NodeCollectionIterator) -> Result<Self, ASN1Error> {
        let node = iter.next().ok_or_else(|| {
            asn1_err!(
                ErrorKind::Truncation,
                "Unable to decode {}, no ASN.1 nodes to decode",
                std::any::type_name::<Self>()
            )
        })?;
        Self::from_ber_node(node)
    }
}

pub trait BERSerializable: DERSerializable {}

pub trait BERImplicitlyTaggable: BERParseable + BERSerializable + DERImplicitlyTaggable {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

pub fn parse(data: &[u8]) -> Result<ASN1Node, ASN1Error> {
    parse_with_config(data, &DecoderConfig::default())
}

pub fn parse_with_config(data: &[u8], config: &DecoderConfig) -> Result<ASN1Node, ASN1Error> {
    let bytes = Bytes::copy_from_slice(data);
    let result = ParseResult::parse(bytes, EncodingRules::Ber, config)?;
    crate::der::single_root(result)
}

pub fn sequence<T, F>(node: ASN1Node, identifier: ASN1Identifier, builder: F) -> Result<T, ASN1Error>
where
    F: FnOnce(&mut ASN1NodeCollectionIterator) -> Result<T, ASN1Error>,
{
    crate::der::sequence(node, identifier, builder)
}
