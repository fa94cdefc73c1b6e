use crate::asn1::{ASN1Node, ASN1NodeCollection, ASN1NodeCollectionIterator, EncodingRules, ParseResult};
use crate::asn1_err;
use crate::config::{DecoderConfig, EncoderConfig};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;
use crate::types::boolean::ASN1Boolean;
use crate::types::integer::ASN1Integer;
use crate::types::real::RealBase;
use crate::types::strings::ASN1UTF8String;
use bytes::{BufMut, Bytes, BytesMut};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Checks a node's identifier against what the caller expected, reporting
/// whether the tag class or the tag number is what differs.
pub(crate) fn check_identifier(node: &ASN1Node, expected: ASN1Identifier) -> Result<(), ASN1Error> {
    if node.identifier.tag_class != expected.tag_class {
        return Err(asn1_err!(
            ErrorKind::TagClass,
            "Expected {}, got {}",
            expected,
            node.identifier
        ));
    }
    if node.identifier.tag_number != expected.tag_number {
        return Err(asn1_err!(
            ErrorKind::TagNumber,
            "Expected {}, got {}",
            expected,
            node.identifier
        ));
    }
    Ok(())
}

pub trait DERParseable: Sized {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error>;

    fn from_der_iterator(iter: &mut ASN1NodeCollectionIterator) -> Result<Self, ASN1Error> {
        let node = iter.next().ok_or_else(|| {
            asn1_err!(
                ErrorKind::Truncation,
                "Unable to decode {}, no ASN.1 nodes to decode",
                std::any::type_name::<Self>()
            )
        })?;
        Self::from_der_node(node)
    }

    fn from_der_bytes(bytes: &[u8]) -> Result<Self, ASN1Error> {
        let node = parse(bytes)?;
        Self::from_der_node(node)
    }
}

pub trait DERSerializable {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error>;
}

pub trait DERImplicitlyTaggable: DERParseable + DERSerializable {
    fn default_identifier() -> ASN1Identifier;

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error>;
}

pub fn parse(data: &[u8]) -> Result<ASN1Node, ASN1Error> {
    parse_with_config(data, &DecoderConfig::default())
}

pub fn parse_with_config(data: &[u8], config: &DecoderConfig) -> Result<ASN1Node, ASN1Error> {
    let bytes = Bytes::copy_from_slice(data);
    let result = ParseResult::parse(bytes, EncodingRules::Der, config)?;
    single_root(result)
}

pub(crate) fn single_root(result: ParseResult) -> Result<ASN1Node, ASN1Error> {
    let first = result
        .nodes
        .first()
        .ok_or_else(|| asn1_err!(ErrorKind::Truncation, "No ASN.1 nodes parsed"))?
        .clone();

    let nodes_arc = std::sync::Arc::new(result.nodes);
    let root_depth = first.depth;

    let end_index = nodes_arc
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, node)| node.depth <= root_depth)
        .map(|(idx, _)| idx)
        .unwrap_or(nodes_arc.len());

    if end_index != nodes_arc.len() {
        return Err(asn1_err!(
            ErrorKind::LengthViolation,
            "Parse result unexpectedly contains multiple root nodes"
        ));
    }

    if first.is_constructed {
        let collection = ASN1NodeCollection::new(nodes_arc, 1..end_index, root_depth);
        Ok(ASN1Node {
            identifier: first.identifier,
            content: crate::asn1::Content::Constructed(collection),
            encoded_bytes: first.encoded_bytes,
            rules: first.rules,
        })
    } else {
        Ok(ASN1Node {
            identifier: first.identifier,
            content: crate::asn1::Content::Primitive(first.data_bytes.unwrap()),
            encoded_bytes: first.encoded_bytes,
            rules: first.rules,
        })
    }
}

pub fn sequence<T, F>(node: ASN1Node, identifier: ASN1Identifier, builder: F) -> Result<T, ASN1Error>
where
    F: FnOnce(&mut ASN1NodeCollectionIterator) -> Result<T, ASN1Error>,
{
    check_identifier(&node, identifier)?;
    match node.content {
        crate::asn1::Content::Constructed(collection) => {
            let mut iter = collection.into_iter();
            let result = builder(&mut iter)?;
            if iter.next().is_some() {
                return Err(asn1_err!(ErrorKind::ValueSize, "Unconsumed sequence nodes"));
            }
            Ok(result)
        }
        _ => Err(asn1_err!(ErrorKind::Construction, "{} must be constructed", node.identifier)),
    }
}

pub fn sequence_of<T: DERParseable>(identifier: ASN1Identifier, root_node: ASN1Node) -> Result<Vec<T>, ASN1Error> {
    check_identifier(&root_node, identifier)?;
    match root_node.content {
        crate::asn1::Content::Constructed(collection) => collection.into_iter().map(T::from_der_node).collect(),
        _ => Err(asn1_err!(ErrorKind::Construction, "{} must be constructed", root_node.identifier)),
    }
}

/// Decodes a `Set<T>` without enforcing any ordering of its children —
/// matches the default behavior of `Vec<T>`/`sequence_of` for a SET.
pub fn set_of<T: DERParseable>(identifier: ASN1Identifier, root_node: ASN1Node) -> Result<Vec<T>, ASN1Error> {
    sequence_of(identifier, root_node)
}

/// Decodes a `Set<T>` and additionally verifies that the children's
/// re-encoded forms already appear in non-decreasing lexicographic order,
/// as DER/CER canonical form requires on the wire. Returns `ValueSize` if
/// the input was not already sorted.
pub fn sorted_set_of<T>(identifier: ASN1Identifier, root_node: ASN1Node) -> Result<Vec<T>, ASN1Error>
where
    T: DERParseable + DERSerializable,
{
    check_identifier(&root_node, identifier)?;
    let encoded: Vec<(Bytes, T)> = match root_node.content {
        crate::asn1::Content::Constructed(collection) => collection
            .into_iter()
            .map(|n| {
                let raw = n.encoded_bytes.clone();
                T::from_der_node(n).map(|v| (raw, v))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(asn1_err!(ErrorKind::Construction, "{} must be constructed", root_node.identifier)),
    };

    for window in encoded.windows(2) {
        if window[0].0.as_ref() > window[1].0.as_ref() {
            return Err(asn1_err!(
                ErrorKind::ValueSize,
                "SET OF children are not in canonical lexicographic order"
            ));
        }
    }

    Ok(encoded.into_iter().map(|(_, v)| v).collect())
}

// Primitive implementations

impl DERParseable for bool {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        <Self as DERImplicitlyTaggable>::from_der_node_with_identifier(
            node,
            <Self as DERImplicitlyTaggable>::default_identifier(),
        )
    }
}

impl DERSerializable for bool {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        ASN1Boolean::from(*self).serialize(serializer)
    }
}

impl DERImplicitlyTaggable for bool {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::BOOLEAN
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        ASN1Boolean::from_der_node_with_identifier(node, identifier).map(|b| b.0)
    }
}

impl DERParseable for String {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        <Self as DERImplicitlyTaggable>::from_der_node_with_identifier(
            node,
            <Self as DERImplicitlyTaggable>::default_identifier(),
        )
    }
}

impl DERSerializable for String {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        ASN1UTF8String(self.clone()).serialize(serializer)
    }
}

impl DERImplicitlyTaggable for String {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::UTF8_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        ASN1UTF8String::from_der_node_with_identifier(node, identifier).map(|s| s.0)
    }
}

macro_rules! impl_der_for_signed_int {
    ($($ty:ty => $to_method:ident),+ $(,)?) => {
        $(
            impl DERParseable for $ty {
                fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                    <Self as DERImplicitlyTaggable>::from_der_node_with_identifier(
                        node,
                        <Self as DERImplicitlyTaggable>::default_identifier(),
                    )
                }
            }

            impl DERSerializable for $ty {
                fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
                    ASN1Integer { value: BigInt::from(*self) }.serialize(serializer)
                }
            }

            impl DERImplicitlyTaggable for $ty {
                fn default_identifier() -> ASN1Identifier {
                    ASN1Identifier::INTEGER
                }

                fn from_der_node_with_identifier(
                    node: ASN1Node,
                    identifier: ASN1Identifier,
                ) -> Result<Self, ASN1Error> {
                    let value = ASN1Integer::from_der_node_with_identifier(node, identifier)?;
                    value
                        .value
                        .$to_method()
                        .ok_or_else(|| asn1_err!(ErrorKind::ValueSize, concat!("ASN1Integer does not fit into ", stringify!($ty))))
                }
            }
        )+
    };
}

macro_rules! impl_der_for_unsigned_int {
    ($($ty:ty => $to_method:ident),+ $(,)?) => {
        $(
            impl DERParseable for $ty {
                fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                    <Self as DERImplicitlyTaggable>::from_der_node_with_identifier(
                        node,
                        <Self as DERImplicitlyTaggable>::default_identifier(),
                    )
                }
            }

            impl DERSerializable for $ty {
                fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
                    ASN1Integer { value: BigInt::from(*self) }.serialize(serializer)
                }
            }

            impl DERImplicitlyTaggable for $ty {
                fn default_identifier() -> ASN1Identifier {
                    ASN1Identifier::INTEGER
                }

                fn from_der_node_with_identifier(
                    node: ASN1Node,
                    identifier: ASN1Identifier,
                ) -> Result<Self, ASN1Error> {
                    let value = ASN1Integer::from_der_node_with_identifier(node, identifier)?;
                    value
                        .value
                        .$to_method()
                        .ok_or_else(|| asn1_err!(ErrorKind::ValueSize, concat!("ASN1Integer does not fit into ", stringify!($ty))))
                }
            }
        )+
    };
}

impl_der_for_signed_int!(
    i8 => to_i8,
    i16 => to_i16,
    i32 => to_i32,
    i64 => to_i64,
    i128 => to_i128,
    isize => to_isize,
);

impl_der_for_unsigned_int!(
    u8 => to_u8,
    u16 => to_u16,
    u32 => to_u32,
    u64 => to_u64,
    u128 => to_u128,
    usize => to_usize,
);

impl<T> DERParseable for Vec<T>
where
    T: DERParseable + DERSerializable,
{
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        <Self as DERImplicitlyTaggable>::from_der_node_with_identifier(
            node,
            <Self as DERImplicitlyTaggable>::default_identifier(),
        )
    }
}

impl<T> DERSerializable for Vec<T>
where
    T: DERSerializable,
{
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        serializer.write_sequence(|seq| {
            for item in self {
                seq.serialize(item)?;
            }
            Ok(())
        })
    }
}

impl<T> DERImplicitlyTaggable for Vec<T>
where
    T: DERParseable + DERSerializable,
{
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::SEQUENCE
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        sequence_of(identifier, node)
    }
}

impl<T> DERParseable for Option<T>
where
    T: DERImplicitlyTaggable,
{
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        T::from_der_node(node).map(Some)
    }

    fn from_der_iterator(iter: &mut ASN1NodeCollectionIterator) -> Result<Self, ASN1Error> {
        let should_decode = match iter.peek() {
            None => return Ok(None),
            Some(node) => node.identifier == T::default_identifier(),
        };

        if !should_decode {
            return Ok(None);
        }
        let node = iter.next().expect("peeked node must exist");
        T::from_der_node(node).map(Some)
    }
}

impl<T> DERParseable for Box<T>
where
    T: DERParseable,
{
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Ok(Box::new(T::from_der_node(node)?))
    }
}

impl<T> DERSerializable for Option<T>
where
    T: DERSerializable,
{
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        if let Some(value) = self {
            serializer.serialize(value)?;
        }
        Ok(())
    }
}

pub struct Serializer {
    buffer: BytesMut,
    rules: EncodingRules,
    real_base: RealBase,
}

impl Serializer {
    pub fn new() -> Self {
        Serializer::with_rules(EncodingRules::Der)
    }

    pub fn with_rules(rules: EncodingRules) -> Self {
        Serializer {
            buffer: BytesMut::with_capacity(1024),
            rules,
            real_base: RealBase::Two,
        }
    }

    pub fn with_config(rules: EncodingRules, config: &EncoderConfig) -> Self {
        Serializer {
            buffer: BytesMut::with_capacity(1024),
            rules,
            real_base: config.real_base,
        }
    }

    pub fn rules(&self) -> EncodingRules {
        self.rules
    }

    pub fn real_base(&self) -> RealBase {
        self.real_base
    }

    fn fork(&self) -> Self {
        Serializer {
            buffer: BytesMut::with_capacity(64),
            rules: self.rules,
            real_base: self.real_base,
        }
    }

    pub fn serialized_bytes(&self) -> Bytes {
        self.buffer.clone().freeze()
    }

    pub fn append_primitive_node(
        &mut self,
        identifier: ASN1Identifier,
        content_writer: impl FnOnce(&mut Vec<u8>) -> Result<(), ASN1Error>,
    ) -> Result<(), ASN1Error> {
        let mut content = Vec::new();
        content_writer(&mut content)?;
        self.append_node(identifier, false, &content)
    }

    pub fn append_constructed_node<F>(&mut self, identifier: ASN1Identifier, writer: F) -> Result<(), ASN1Error>
    where
        F: FnOnce(&mut Serializer) -> Result<(), ASN1Error>,
    {
        let mut nested = self.fork();
        writer(&mut nested)?;
        let content = nested.serialized_bytes();
        self.append_node(identifier, true, content.as_ref())
    }

    /// Appends a pre-built, already-framed indefinite-length constructed
    /// node (identifier byte(s) + 0x80 + children + EOC). Used by the CER
    /// segmentation engine, which builds its own chunk framing.
    pub(crate) fn append_raw(&mut self, raw: &[u8]) {
        self.buffer.put_slice(raw);
    }

    /// Writes `identifier` as an indefinite-length constructed node wrapping
    /// `children` verbatim (already-encoded child TLVs), terminated by EOC.
    /// This is the framing CER segmentation uses; DER never calls it.
    pub(crate) fn append_indefinite_constructed(&mut self, identifier: ASN1Identifier, children: &[u8]) {
        let mut header = Vec::new();
        header.write_identifier(identifier, true);
        header.push(0x80);
        self.buffer.put_slice(&header);
        self.buffer.put_slice(children);
        self.buffer.put_slice(&[0x00, 0x00]);
    }

    pub fn write_sequence<F>(&mut self, writer: F) -> Result<(), ASN1Error>
    where
        F: FnOnce(&mut Serializer) -> Result<(), ASN1Error>,
    {
        self.append_constructed_node(ASN1Identifier::SEQUENCE, writer)
    }

    pub fn serialize<T: DERSerializable>(&mut self, node: &T) -> Result<(), ASN1Error> {
        node.serialize(self)
    }

    fn append_node(&mut self, identifier: ASN1Identifier, constructed: bool, content: &[u8]) -> Result<(), ASN1Error> {
        let mut temp_vec = Vec::new();
        temp_vec.write_identifier(identifier, constructed);
        self.buffer.put_slice(&temp_vec);

        let len_bytes = encode_length(content.len());
        self.buffer.put_slice(&len_bytes);
        self.buffer.put_slice(content);
        Ok(())
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Serializer::new()
    }
}

pub(crate) trait IdentfierWriter {
    fn write_identifier(&mut self, identifier: ASN1Identifier, constructed: bool);
}

impl IdentfierWriter for Vec<u8> {
    fn write_identifier(&mut self, identifier: ASN1Identifier, constructed: bool) {
        if let Some(mut short) = identifier.short_form() {
            if constructed {
                short |= 0x20;
            }
            self.push(short);
        } else {
            let mut top_byte = 0x1f;
            if constructed {
                top_byte |= 0x20;
            }
            top_byte |= identifier.tag_class.top_byte_flags();
            self.push(top_byte);
            write_asn1_discipline_uint(self, identifier.tag_number);
        }
    }
}

pub(crate) fn write_asn1_discipline_uint(v: &mut Vec<u8>, mut n: u64) {
    if n == 0 {
        v.push(0);
        return;
    }

    let mut bytes = Vec::new();
    while n != 0 {
        bytes.push((n & 0x7F) as u8);
        n >>= 7;
    }

    for (i, b) in bytes.iter().rev().enumerate() {
        let mut byte = *b;
        if i != bytes.len() - 1 {
            byte |= 0x80;
        }
        v.push(byte);
    }
}

pub(crate) fn encode_length(len: usize) -> Vec<u8> {
    if len <= 0x7F {
        vec![len as u8]
    } else {
        let mut bytes = Vec::new();
        let mut l = len;
        while l != 0 {
            bytes.push((l & 0xFF) as u8);
            l >>= 8;
        }
        let len_len = bytes.len() as u8;
        let indicator = 0x80u8 + len_len;
        let mut result = Vec::with_capacity(1 + bytes.len());
        result.push(indicator);
        for b in bytes.iter().rev() {
            result.push(*b);
        }
        result
    }
}
