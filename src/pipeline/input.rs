use std::path::Path;

use anyhow::Context;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::debug;

/// Decodes template bytes: BOM first, then strict UTF-8, then Windows-1252.
pub fn decode_template(bytes: &[u8]) -> (String, &'static Encoding) {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), enc);
    }
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return (text.into_owned(), UTF_8);
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text.into_owned(), WINDOWS_1252)
}

pub fn read_template(path: &Path) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read template: {}", path.display()))?;
    let (text, enc) = decode_template(&bytes);
    debug!("template {} decoded as {}", path.display(), enc.name());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_with_and_without_bom() {
        let (text, enc) = decode_template("Hälsa".as_bytes());
        assert_eq!((text.as_str(), enc), ("Hälsa", UTF_8));
        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice("Hälsa".as_bytes());
        assert_eq!(decode_template(&bom).0, "Hälsa");
    }

    #[test]
    fn legacy_bytes_fall_back_to_windows_1252() {
        let (text, enc) = decode_template(&[b'H', 0xE4, b'l', b's', b'a']);
        assert_eq!(text, "Hälsa");
        assert_eq!(enc, WINDOWS_1252);
    }
}
