use super::StageResult;

/// Appended to a stream that was cut at the size limit
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Decodes `buf` and keeps at most `max` bytes of the text, marking the cut
/// if one was made.
///
/// The cut lands on a character boundary, so a multi-byte character
/// straddling the limit is dropped whole and the kept text never exceeds
/// `max` bytes.
pub fn cap_output(buf: &[u8], max: usize) -> String {
    let mut text = String::from_utf8_lossy(buf).into_owned();
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

/// Both streams of a stage after the cap was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CappedStreams {
    pub stdout: String,
    pub stderr: String,
}

impl StageResult {
    /// Applies the output cap to both streams independently.
    ///
    /// The supervisor's notice is appended to stderr after capping, so it
    /// survives however much the program wrote.
    pub fn capped(&self, max: usize) -> CappedStreams {
        let mut stderr = cap_output(&self.stderr, max);
        if let Some(notice) = &self.notice {
            stderr.push_str(notice);
        }
        CappedStreams {
            stdout: cap_output(&self.stdout, max),
            stderr,
        }
    }
}
