//! Caller-owned configuration. Nothing here is global: every encode/decode
//! entry point takes its config by reference, so concurrent callers with
//! different limits or preferences never interfere with each other.

use crate::types::real::RealBase;

/// Recursion and framing limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum nesting depth of constructed elements. The root element is
    /// depth 1. Exceeding this returns `ErrorKind::Recursion` rather than
    /// overflowing the call stack.
    pub max_depth: usize,
}

impl DecoderConfig {
    pub const fn new(max_depth: usize) -> Self {
        DecoderConfig { max_depth }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig { max_depth: 5 }
    }
}

/// Preferences applied while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Base used when a `Real` value is encoded in binary form. Only
    /// observed by the REAL codec; every other type ignores it.
    pub real_base: RealBase,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            real_base: RealBase::Two,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_default_depth_is_five() {
        assert_eq!(DecoderConfig::default().max_depth, 5);
    }

    #[test]
    fn test_encoder_config_default_base_is_two() {
        assert_eq!(EncoderConfig::default().real_base, RealBase::Two);
    }
}
