//! Static table from detector strings to short type codes.
//!
//! Rules are written against the short codes (`jpg`, `pdf`, `txt`, …),
//! never against raw detector output.

use super::TypeCode;

/// Detector string → type code. Static for the process lifetime.
const TYPE_TABLE: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/gzip", "gz"),
    ("application/x-tar", "tar"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("video/mp4", "mp4"),
    ("text/xml", "xml"),
    ("text/plain", "txt"),
];

/// Translate a detector string into a type code.
///
/// Unmapped strings yield [`TypeCode::UNK`] rather than failing.
pub fn code_for(detected: &str) -> TypeCode {
    TYPE_TABLE
        .iter()
        .find(|(mime, _)| *mime == detected)
        .map(|(_, code)| TypeCode::new(code))
        .unwrap_or(TypeCode::UNK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_detector_strings() {
        assert_eq!(code_for("image/jpeg").as_str(), "jpg");
        assert_eq!(code_for("application/pdf").as_str(), "pdf");
        assert_eq!(code_for("text/plain").as_str(), "txt");
    }

    #[test]
    fn unmapped_string_is_unk() {
        assert_eq!(code_for("application/x-bogus"), TypeCode::UNK);
    }
}
