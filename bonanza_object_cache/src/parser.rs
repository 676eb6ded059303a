use bonanza_reference::DecodingParameters;

use crate::encoder_chain::EncoderChain;
use crate::error::ObjectCacheError;

/// Parses already-decoded bytes into a typed view, reporting how many
/// bytes of the input it actually consumed (spec §4.4: `parse(bytes,
/// decoding_params) -> typed_view, consumed_bytes`). Implementors only
/// see post-decode bytes; composing with an [`EncoderChain`] is
/// [`ChainedParser`]'s job.
pub trait MessageParser<T> {
    fn parse_message(&self, bytes: &[u8]) -> Result<(T, usize), ObjectCacheError>;
}

/// A chained `encoder -> message parser`, the composite `parse` contract
/// spec §4.4 describes: decode through every stage of `chain`, then hand
/// the result to `message_parser`.
pub struct ChainedParser<T, P: MessageParser<T>> {
    chain: EncoderChain,
    message_parser: P,
    _marker: std::marker::PhantomData<T>,
}

impl<T, P: MessageParser<T>> ChainedParser<T, P> {
    pub fn new(chain: EncoderChain, message_parser: P) -> Self {
        ChainedParser { chain, message_parser, _marker: std::marker::PhantomData }
    }

    pub fn parse(&self, bytes: &[u8], decoding_params: &DecodingParameters) -> Result<(T, usize), ObjectCacheError> {
        let decoded = self.chain.decode(bytes, decoding_params)?;
        self.message_parser.parse_message(&decoded)
    }
}
