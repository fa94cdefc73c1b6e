use crate::asn1::{ASN1Node, Content};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1ObjectIdentifier {
    bytes: Bytes,
}

impl ASN1ObjectIdentifier {
    pub fn new(components: &[u64]) -> Result<Self, ASN1Error> {
        if components.len() < 2 {
            return Err(asn1_err!(ErrorKind::ValueSize, "OBJECT IDENTIFIER must have at least 2 components"));
        }

        let first = components[0];
        let second = components[1];

        if first > 2 {
            return Err(asn1_err!(ErrorKind::ValueCharacters, "First OID component must be 0, 1, or 2"));
        }
        if first < 2 && second > 39 {
            return Err(asn1_err!(ErrorKind::ValueCharacters, "Second OID component must be <= 39 when the first is 0 or 1"));
        }

        let mut buffer = Vec::new();
        write_oid_subidentifier(first * 40 + second, &mut buffer);
        for &c in &components[2..] {
            write_oid_subidentifier(c, &mut buffer);
        }

        Ok(ASN1ObjectIdentifier { bytes: Bytes::from(buffer) })
    }

    pub fn oid_components(&self) -> Result<Vec<u64>, ASN1Error> {
        decode_arc_components(&self.bytes).map(|mut arcs| {
            let (first, second) = split_first_subidentifier(arcs[0]);
            arcs[0] = second;
            arcs.insert(0, first);
            arcs
        })
    }
}

impl DERParseable for ASN1ObjectIdentifier {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1ObjectIdentifier::default_identifier())
    }
}

impl DERSerializable for ASN1ObjectIdentifier {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&self.bytes);
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1ObjectIdentifier {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::OBJECT_IDENTIFIER
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => {
                if bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "OBJECT IDENTIFIER has 0 content octets"));
                }
                validate_subidentifier_stream(&bytes)?;
                Ok(ASN1ObjectIdentifier { bytes })
            }
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "OBJECT IDENTIFIER must be primitive")),
        }
    }
}

impl BERParseable for ASN1ObjectIdentifier {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1ObjectIdentifier::default_identifier())
    }
}

impl BERSerializable for ASN1ObjectIdentifier {}

impl BERImplicitlyTaggable for ASN1ObjectIdentifier {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

/// A RELATIVE-OID: the same base-128 VLQ arc encoding as OBJECT IDENTIFIER,
/// but with no X.40(first)+second folding of the leading arc — every
/// subidentifier maps to exactly one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1RelativeOid {
    bytes: Bytes,
}

impl ASN1RelativeOid {
    pub fn new(components: &[u64]) -> Result<Self, ASN1Error> {
        if components.is_empty() {
            return Err(asn1_err!(ErrorKind::ValueSize, "RELATIVE-OID must have at least 1 component"));
        }
        let mut buffer = Vec::new();
        for &c in components {
            write_oid_subidentifier(c, &mut buffer);
        }
        Ok(ASN1RelativeOid { bytes: Bytes::from(buffer) })
    }

    pub fn oid_components(&self) -> Result<Vec<u64>, ASN1Error> {
        decode_arc_components(&self.bytes)
    }
}

impl DERParseable for ASN1RelativeOid {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1RelativeOid::default_identifier())
    }
}

impl DERSerializable for ASN1RelativeOid {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&self.bytes);
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1RelativeOid {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::RELATIVE_OID
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        match node.content {
            Content::Primitive(bytes) => {
                if bytes.is_empty() {
                    return Err(asn1_err!(ErrorKind::ValueSize, "RELATIVE-OID has 0 content octets"));
                }
                validate_subidentifier_stream(&bytes)?;
                Ok(ASN1RelativeOid { bytes })
            }
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "RELATIVE-OID must be primitive")),
        }
    }
}

impl BERParseable for ASN1RelativeOid {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1RelativeOid::default_identifier())
    }
}

impl BERSerializable for ASN1RelativeOid {}

impl BERImplicitlyTaggable for ASN1RelativeOid {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

/// Recovers X and Y from the first subidentifier's encoded value
/// `40*X + Y`. X is 0 or 1 when the value is below 80 (Y bounded to 0..=39
/// in that case by construction); any value 80 or above always means X=2,
/// with Y taking up the remainder, which is unbounded.
fn split_first_subidentifier(encoded: u64) -> (u64, u64) {
    if encoded < 80 {
        (encoded / 40, encoded % 40)
    } else {
        (2, encoded - 80)
    }
}

fn decode_arc_components(bytes: &Bytes) -> Result<Vec<u64>, ASN1Error> {
    if bytes.is_empty() {
        return Err(asn1_err!(ErrorKind::ValueSize, "Zero components in OID"));
    }
    let mut data = bytes.clone();
    let mut components = Vec::new();
    while !data.is_empty() {
        components.push(read_oid_subidentifier(&mut data)?);
    }
    Ok(components)
}

fn validate_subidentifier_stream(bytes: &Bytes) -> Result<(), ASN1Error> {
    let mut check = bytes.clone();
    while !check.is_empty() {
        read_oid_subidentifier(&mut check)?;
    }
    Ok(())
}

fn write_oid_subidentifier(mut value: u64, buf: &mut Vec<u8>) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut stack = Vec::with_capacity(10);
    loop {
        stack.push((value & 0x7F) as u8);
        value >>= 7;
        if value == 0 {
            break;
        }
    }

    for (index, byte) in stack.iter().rev().enumerate() {
        let mut out = *byte;
        if index + 1 < stack.len() {
            out |= 0x80;
        }
        buf.push(out);
    }
}

fn read_oid_subidentifier(data: &mut Bytes) -> Result<u64, ASN1Error> {
    let mut value: u64 = 0;
    let mut first_byte = true;
    loop {
        if data.is_empty() {
            return Err(asn1_err!(ErrorKind::Truncation, "OID subidentifier truncated"));
        }
        let byte = data.split_to(1)[0];

        if first_byte && byte == 0x80 {
            return Err(asn1_err!(ErrorKind::ValuePadding, "OID subidentifier encoded with a non-minimal leading byte"));
        }
        first_byte = false;

        let chunk = u64::from(byte & 0x7F);
        value = value
            .checked_mul(128)
            .and_then(|v| v.checked_add(chunk))
            .ok_or_else(|| asn1_err!(ErrorKind::ValueSize, "OID subidentifier exceeds u64 capacity"))?;

        if (byte & 0x80) == 0 {
            break;
        }
    }
    Ok(value)
}
