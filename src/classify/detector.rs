//! Content sniffing by magic bytes.
//!
//! Detection never looks at the file extension: the first bytes of the
//! file decide. Returns canonical MIME-like strings which the type map
//! translates into the engine's short codes.

/// Sniff a detector string from leading file bytes.
///
/// Returns `None` when no signature matches and the content does not
/// look like text.
pub fn sniff(data: &[u8]) -> Option<&'static str> {
    if data.is_empty() {
        return None;
    }

    // JPEG: FF D8 FF
    if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.len() >= 8 && data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }

    // GIF: GIF87a or GIF89a
    if data.len() >= 6 && &data[0..3] == b"GIF" {
        return Some("image/gif");
    }

    // BMP: BM
    if data.len() >= 14 && &data[0..2] == b"BM" {
        return Some("image/bmp");
    }

    // RIFF container: WebP or WAV depending on the form type
    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        if &data[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        if &data[8..12] == b"WAVE" {
            return Some("audio/wav");
        }
    }

    // PDF: %PDF-
    if data.len() >= 5 && &data[0..5] == b"%PDF-" {
        return Some("application/pdf");
    }

    // ZIP (also OOXML documents): PK\x03\x04
    if data.len() >= 4 && &data[0..4] == [0x50, 0x4B, 0x03, 0x04] {
        return Some("application/zip");
    }

    // GZIP: 1F 8B
    if data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B {
        return Some("application/gzip");
    }

    // MP3: ID3 tag or bare frame sync
    if data.len() >= 3 && &data[0..3] == b"ID3" {
        return Some("audio/mpeg");
    }
    if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
        return Some("audio/mpeg");
    }

    // MP4 family: ftyp box at offset 4
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some("video/mp4");
    }

    // TAR: "ustar" magic at offset 257
    if data.len() >= 262 && &data[257..262] == b"ustar" {
        return Some("application/x-tar");
    }

    // XML declaration before the generic text check
    if data.starts_with(b"<?xml") {
        return Some("text/xml");
    }

    if looks_like_text(data) {
        return Some("text/plain");
    }

    None
}

/// Text heuristic: valid UTF-8 (a truncated trailing sequence is fine)
/// and free of NUL bytes.
fn looks_like_text(data: &[u8]) -> bool {
    if data.contains(&0) {
        return false;
    }
    match std::str::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && e.valid_up_to() > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(sniff(&header), Some("image/jpeg"));
    }

    #[test]
    fn sniff_png() {
        let header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff(&header), Some("image/png"));
    }

    #[test]
    fn sniff_gif() {
        assert_eq!(sniff(b"GIF89a"), Some("image/gif"));
    }

    #[test]
    fn sniff_riff_forms() {
        let mut webp = [0u8; 12];
        webp[0..4].copy_from_slice(b"RIFF");
        webp[8..12].copy_from_slice(b"WEBP");
        assert_eq!(sniff(&webp), Some("image/webp"));

        let mut wav = [0u8; 12];
        wav[0..4].copy_from_slice(b"RIFF");
        wav[8..12].copy_from_slice(b"WAVE");
        assert_eq!(sniff(&wav), Some("audio/wav"));
    }

    #[test]
    fn sniff_pdf() {
        assert_eq!(sniff(b"%PDF-1.7 rest"), Some("application/pdf"));
    }

    #[test]
    fn sniff_zip() {
        let header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00];
        assert_eq!(sniff(&header), Some("application/zip"));
    }

    #[test]
    fn sniff_xml_before_text() {
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), Some("text/xml"));
    }

    #[test]
    fn sniff_plain_text() {
        assert_eq!(sniff(b"hello, watcher\n"), Some("text/plain"));
    }

    #[test]
    fn truncated_utf8_still_text() {
        // "é" cut in the middle of its second byte
        let mut bytes = b"caf".to_vec();
        bytes.push(0xC3);
        assert_eq!(sniff(&bytes), Some("text/plain"));
    }

    #[test]
    fn sniff_unknown_binary() {
        let junk = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        assert_eq!(sniff(&junk), None);
    }

    #[test]
    fn sniff_empty() {
        assert_eq!(sniff(&[]), None);
    }
}
