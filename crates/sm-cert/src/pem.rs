// pem.rs — PEM text framing for DER certificates.

use ::pem::{EncodeConfig, LineEnding, Pem};

use crate::error::CertError;

/// Frame `der` as `-----BEGIN <label>-----` ... `-----END <label>-----`,
/// with LF line endings and a 64 column body.
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let block = Pem::new(label, der.to_vec());
    ::pem::encode_config(&block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Body of the first PEM block in `text`. Text around the block is ignored.
pub fn decode_pem(text: &str) -> Result<Vec<u8>, CertError> {
    let block = ::pem::parse(text.as_bytes()).map_err(|e| CertError::Pem(e.to_string()))?;
    if block.contents().is_empty() {
        return Err(CertError::Pem(format!("empty {} block", block.tag())));
    }
    Ok(block.contents().to_vec())
}

/// True when `bytes` looks like PEM text rather than DER.
pub fn is_pem(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|text| text.trim_start().starts_with("-----BEGIN "))
        .unwrap_or(false)
}

/// Accept DER or PEM input and return DER.
pub fn to_der(encoded: &[u8]) -> Result<Vec<u8>, CertError> {
    if encoded.is_empty() {
        return Err(CertError::Decode("empty certificate".into()));
    }
    if is_pem(encoded) {
        let text = std::str::from_utf8(encoded).map_err(|e| CertError::Pem(e.to_string()))?;
        decode_pem(text)
    } else {
        Ok(encoded.to_vec())
    }
}
