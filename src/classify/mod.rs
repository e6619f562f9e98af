//! Content-based file classification.
//!
//! The classifier reads the first bytes of a file, sniffs a detector
//! string from them, and translates it to a short type code. It never
//! fails hard: unreadable or vanished files degrade to `UNK` and the
//! rule matcher's no-match policy takes over.

pub mod detector;
pub mod type_map;

use std::io::Read;
use std::path::Path;

/// Short canonical type code (`jpg`, `txt`, `UNK`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode(&'static str);

impl TypeCode {
    /// Sentinel for content the detector could not identify.
    pub const UNK: TypeCode = TypeCode("UNK");

    pub(crate) fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for TypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Classifies files by sniffing their leading bytes.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    /// How many leading bytes to read for sniffing.
    max_sniff_bytes: usize,
}

impl FileClassifier {
    pub fn new(max_sniff_bytes: usize) -> Self {
        Self { max_sniff_bytes }
    }

    /// Determine the type code for a file from its content.
    ///
    /// A pure function of the file bytes; reading failures are recorded
    /// and collapse to `UNK`.
    pub fn classify(&self, path: &Path) -> TypeCode {
        let mut buf = vec![0u8; self.max_sniff_bytes];
        let read = std::fs::File::open(path).and_then(|mut f| {
            let mut total = 0;
            // Loop because a single read may return short.
            loop {
                let n = f.read(&mut buf[total..])?;
                if n == 0 {
                    break;
                }
                total += n;
                if total == buf.len() {
                    break;
                }
            }
            Ok(total)
        });

        match read {
            Ok(n) => match detector::sniff(&buf[..n]) {
                Some(detected) => {
                    let code = type_map::code_for(detected);
                    tracing::debug!(
                        "[classify] {} detected as {detected} -> {code}",
                        path.display()
                    );
                    code
                }
                None => TypeCode::UNK,
            },
            Err(e) => {
                crate::log_event!("classify", "classification_failed", "{}: {e}", path.display());
                TypeCode::UNK
            }
        }
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(8192)
    }
}
