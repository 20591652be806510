use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{Error, Result};

/// Gmail sends attachment data as URL-safe base64, sometimes padded and
/// sometimes not.
const URL_SAFE_ANY_PAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    // Line breaks show up in some payloads; they are not part of the alphabet.
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_ANY_PAD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::Decode(format!("invalid base64url attachment data: {e}")))
}
