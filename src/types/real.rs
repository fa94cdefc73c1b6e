use crate::asn1::{ASN1Node, Content, EncodingRules};
use crate::asn1_err;
use crate::ber::{BERImplicitlyTaggable, BERParseable, BERSerializable};
use crate::der::{DERImplicitlyTaggable, DERParseable, DERSerializable, Serializer};
use crate::errors::{ASN1Error, ErrorKind};
use crate::types::identifier::ASN1Identifier;

/// The base a binary-form REAL's mantissa is scaled by. `Ten` selects the
/// decimal (character) form instead of a binary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealBase {
    Two,
    Eight,
    Ten,
    Sixteen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ASN1Real(pub f64);

impl From<f64> for ASN1Real {
    fn from(v: f64) -> Self {
        ASN1Real(v)
    }
}

impl From<ASN1Real> for f64 {
    fn from(val: ASN1Real) -> Self {
        val.0
    }
}

impl DERParseable for ASN1Real {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1Real::default_identifier())
    }
}

impl DERSerializable for ASN1Real {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let base = serializer.real_base();
        serializer.append_primitive_node(Self::default_identifier(), |buf| write_content(self.0, base, buf))
    }
}

impl DERImplicitlyTaggable for ASN1Real {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::REAL
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        crate::der::check_identifier(&node, identifier)?;
        let rules = node.rules;
        match node.content {
            Content::Primitive(bytes) => decode_content(&bytes, rules),
            Content::Constructed(_) => Err(asn1_err!(ErrorKind::Construction, "REAL must be primitive")),
        }
    }
}

impl BERParseable for ASN1Real {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1Real::default_identifier())
    }
}

impl BERSerializable for ASN1Real {}

impl BERImplicitlyTaggable for ASN1Real {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

fn write_content(value: f64, base: RealBase, buf: &mut Vec<u8>) -> Result<(), ASN1Error> {
    if value == 0.0 {
        if value.is_sign_negative() {
            buf.push(0x43); // special value: minus zero
        }
        // positive zero: zero-length content
        return Ok(());
    }

    if value.is_nan() {
        buf.push(0x42);
        return Ok(());
    }

    if value.is_infinite() {
        buf.push(if value.is_sign_positive() { 0x40 } else { 0x41 });
        return Ok(());
    }

    match base {
        RealBase::Ten => write_decimal_nr3(value, buf),
        _ => write_binary(value, base, buf),
    }
}

fn decode_content(bytes: &[u8], rules: EncodingRules) -> Result<ASN1Real, ASN1Error> {
    if bytes.is_empty() {
        return Ok(ASN1Real(0.0));
    }

    let first = bytes[0];

    if first & 0xC0 == 0x40 {
        return match first {
            0x40 => Ok(ASN1Real(f64::INFINITY)),
            0x41 => Ok(ASN1Real(f64::NEG_INFINITY)),
            0x42 => Ok(ASN1Real(f64::NAN)),
            0x43 => Ok(ASN1Real(-0.0)),
            _ => Err(asn1_err!(ErrorKind::ValueUndefined, "Reserved REAL special-value octet 0x{:02X}", first)),
        };
    }

    if first & 0x80 != 0 {
        return decode_binary(bytes);
    }

    decode_decimal(bytes, rules)
}

/// Binary form: first octet `1 S BB FF EE`, S = sign, BB = base
/// (00=2,01=8,10=16,11=reserved), FF = scale factor (must be 0 for
/// canonical form), EE = exponent length selector (0..=2 literal, 3 =
/// length-prefixed, rejected here as CER/DER never produce it with a
/// following-length-octet form for any value the encoder emits — but still
/// decodable per X.690, so it is supported on decode).
fn decode_binary(bytes: &[u8]) -> Result<ASN1Real, ASN1Error> {
    let first = bytes[0];
    let sign = if (first & 0x40) != 0 { -1.0 } else { 1.0 };
    let base_bits = (first >> 4) & 0x03;
    let scale = (first >> 2) & 0x03;
    let exp_len_selector = first & 0x03;

    let base: f64 = match base_bits {
        0b00 => 2.0,
        0b01 => 8.0,
        0b10 => 16.0,
        _ => return Err(asn1_err!(ErrorKind::ValueUndefined, "REAL binary base bits 11 are reserved")),
    };

    if scale != 0 {
        return Err(asn1_err!(ErrorKind::ValuePadding, "REAL binary scale factor must be 0 in canonical form"));
    }

    let (exp_len, exp_start) = if exp_len_selector == 0x03 {
        if bytes.len() < 2 {
            return Err(asn1_err!(ErrorKind::Truncation, "REAL binary encoding missing exponent-length octet"));
        }
        (bytes[1] as usize, 2)
    } else {
        (exp_len_selector as usize + 1, 1)
    };

    if bytes.len() < exp_start + exp_len {
        return Err(asn1_err!(ErrorKind::Truncation, "REAL binary encoding too short for its exponent"));
    }
    if exp_len == 0 {
        return Err(asn1_err!(ErrorKind::ValueSize, "REAL binary exponent has 0 octets"));
    }

    let exp_bytes = &bytes[exp_start..exp_start + exp_len];
    if exp_len > 1 {
        let lead = exp_bytes[0];
        let next_bit = exp_bytes[1] & 0x80;
        if (lead == 0x00 && next_bit == 0) || (lead == 0xFF && next_bit != 0) {
            return Err(asn1_err!(ErrorKind::ValuePadding, "REAL binary exponent has redundant leading byte"));
        }
    }

    let mut exponent: i64 = if exp_bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in exp_bytes {
        exponent = (exponent << 8) | (b as i64);
    }

    let mantissa_bytes = &bytes[exp_start + exp_len..];
    if mantissa_bytes.is_empty() {
        return Err(asn1_err!(ErrorKind::ValueSize, "REAL binary mantissa has 0 octets"));
    }
    if mantissa_bytes[0] == 0x00 {
        return Err(asn1_err!(ErrorKind::ValuePadding, "REAL binary mantissa has a redundant leading zero byte"));
    }
    if mantissa_bytes.last() == Some(&0x00) {
        return Err(asn1_err!(ErrorKind::ValuePadding, "REAL binary mantissa has redundant trailing zero bytes"));
    }

    let mut mantissa: u128 = 0;
    for &b in mantissa_bytes {
        mantissa = (mantissa << 8) | (b as u128);
    }

    let value = sign * (mantissa as f64) * base.powi(exponent as i32);
    Ok(ASN1Real(value))
}

fn write_binary(value: f64, base: RealBase, buf: &mut Vec<u8>) -> Result<(), ASN1Error> {
    let (base_value, base_bits): (f64, u8) = match base {
        RealBase::Two => (2.0, 0b00),
        RealBase::Eight => (8.0, 0b01),
        RealBase::Sixteen => (16.0, 0b10),
        RealBase::Ten => unreachable!("decimal base handled by write_decimal_nr3"),
    };

    let sign_bit = if value.is_sign_negative() { 1u8 } else { 0u8 };
    let magnitude = value.abs();

    let (mut mantissa, mut exponent) = decompose_binary_f64(magnitude);

    // Rescale the IEEE-754 base-2 mantissa/exponent pair to the requested
    // base by folding base-2 exponent bits into the mantissa until the
    // exponent is a multiple of log2(base).
    let shift = match base {
        RealBase::Eight => 3,
        RealBase::Sixteen => 4,
        _ => 1,
    };
    if shift > 1 {
        let remainder = exponent.rem_euclid(shift);
        if remainder != 0 {
            mantissa <<= remainder;
            exponent -= remainder;
        }
        exponent /= shift;
    }

    while mantissa != 0 && mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += if shift > 1 { 0 } else { 1 };
    }

    buf.push(0x80 | (sign_bit << 6) | base_bits);

    let exp_bytes = minimal_signed_bytes(exponent);
    if exp_bytes.len() <= 2 {
        buf[buf.len() - 1] |= (exp_bytes.len() - 1) as u8;
        buf.extend_from_slice(&exp_bytes);
    } else {
        buf[buf.len() - 1] |= 0x03;
        buf.push(exp_bytes.len() as u8);
        buf.extend_from_slice(&exp_bytes);
    }

    let mantissa_bytes = mantissa.to_be_bytes();
    let mut start = 0;
    while start < mantissa_bytes.len() - 1 && mantissa_bytes[start] == 0 {
        start += 1;
    }
    buf.extend_from_slice(&mantissa_bytes[start..]);
    Ok(())
}

fn decompose_binary_f64(magnitude: f64) -> (u128, i64) {
    let bits = magnitude.to_bits();
    let raw_exponent = ((bits >> 52) & 0x7FF) as i64;
    let raw_mantissa = bits & 0x000F_FFFF_FFFF_FFFF;

    let (mantissa, exponent) = if raw_exponent == 0 {
        (raw_mantissa as u128, -1074)
    } else {
        ((raw_mantissa | 0x0010_0000_0000_0000) as u128, raw_exponent - 1075)
    };

    if mantissa == 0 {
        return (0, 0);
    }

    let trailing = mantissa.trailing_zeros();
    (mantissa >> trailing, exponent + trailing as i64)
}

fn minimal_signed_bytes(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 {
        let redundant = (bytes[0] == 0x00 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0);
        if !redundant {
            break;
        }
        bytes.remove(0);
    }
    bytes
}

/// NR3 (scientific) textual form: `[sign]int.frac E [sign]exp`, the only
/// decimal form this encoder ever writes — canonical under both CER and
/// DER's permissive-NR1/NR2/NR3 decode.
fn write_decimal_nr3(value: f64, buf: &mut Vec<u8>) -> Result<(), ASN1Error> {
    buf.push(0x03); // character encoding, NR3
    let text = format_nr3(value);
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

fn format_nr3(value: f64) -> String {
    let sign = if value.is_sign_negative() { "-" } else { "" };
    let magnitude = value.abs();
    let mut exponent = 0i32;
    let mut mantissa = magnitude;

    if mantissa != 0.0 {
        while mantissa >= 10.0 {
            mantissa /= 10.0;
            exponent += 1;
        }
        while mantissa < 1.0 {
            mantissa *= 10.0;
            exponent -= 1;
        }
    }

    let mut digits = format!("{:.15}", mantissa);
    while digits.ends_with('0') {
        digits.pop();
    }
    if digits.ends_with('.') {
        digits.push('0');
    }

    format!("{}{}E{}", sign, digits, exponent)
}

/// Decodes the decimal (character) form. NR1/NR2/NR3 per ISO 6093. CER
/// requires NR3 (`real_decimal_nr3_only`); NR1/NR2 are non-canonical
/// alternate encodings of the same value under that profile and are
/// rejected rather than silently accepted.
fn decode_decimal(bytes: &[u8], rules: EncodingRules) -> Result<ASN1Real, ASN1Error> {
    let form = bytes[0] & 0x0F;
    if !(1..=3).contains(&form) {
        return Err(asn1_err!(ErrorKind::ValueUndefined, "Reserved REAL decimal form selector {}", form));
    }
    if rules.real_decimal_nr3_only() && form != 3 {
        return Err(asn1_err!(
            ErrorKind::ValueCharacters,
            "CER requires REAL decimal content in NR3 form, found NR{}",
            form
        ));
    }
    let text = std::str::from_utf8(&bytes[1..])
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "REAL decimal content is not valid UTF-8"))?;
    validate_decimal_grammar(form, text)?;
    let normalized = text.replace(',', ".");
    normalized
        .parse::<f64>()
        .map(ASN1Real)
        .map_err(|_| asn1_err!(ErrorKind::ValueCharacters, "REAL decimal content is not a valid number: {}", text))
}

/// Checks that `text` matches the grammar its own form selector declares,
/// per ISO 6093: NR1 has no decimal point or exponent, NR2 has a decimal
/// point but no exponent, NR3 has both.
fn validate_decimal_grammar(form: u8, text: &str) -> Result<(), ASN1Error> {
    let has_point = text.contains('.') || text.contains(',');
    let has_exponent = text.contains('E') || text.contains('e');
    match form {
        1 if has_point || has_exponent => Err(asn1_err!(
            ErrorKind::ValueCharacters,
            "REAL NR1 content must not contain a decimal point or exponent: {}",
            text
        )),
        2 if !has_point || has_exponent => Err(asn1_err!(
            ErrorKind::ValueCharacters,
            "REAL NR2 content must contain a decimal point and no exponent: {}",
            text
        )),
        3 if !has_point || !has_exponent => Err(asn1_err!(
            ErrorKind::ValueCharacters,
            "REAL NR3 content must contain both a decimal point and an exponent: {}",
            text
        )),
        _ => Ok(()),
    }
}
