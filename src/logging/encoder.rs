//! Pattern encoders for appenders.
//!
//! `log4rs` accepts any pattern and renders parse errors inline as
//! `{ERROR: ..}`, so a pattern is checked by encoding a sample record before
//! it is handed to an appender.

use log4rs::encode::Encode;
use log4rs::encode::pattern::PatternEncoder;
use log4rs::encode::writer::simple::SimpleWriter;

/// Pattern used when an appender has no encoder.
pub const DEFAULT_PATTERN: &str = "{d} {l} {t} - {m}{n}";

const ERROR_MARKER: &str = "{ERROR:";

/// Parse `pattern`, returning the reason it cannot be used.
pub fn pattern_encoder(pattern: &str) -> Result<PatternEncoder, String> {
    let encoder = PatternEncoder::new(pattern);

    let mut out = SimpleWriter(Vec::new());
    encoder
        .encode(
            &mut out,
            &log::Record::builder()
                .level(log::Level::Info)
                .target("sample")
                .module_path(Some("sample"))
                .file(Some("sample.rs"))
                .line(Some(1))
                .args(format_args!("sample"))
                .build(),
        )
        .map_err(|e| format!("pattern `{}` cannot be rendered: {}", pattern, e))?;

    let rendered = String::from_utf8_lossy(&out.0);
    if let Some(start) = rendered.find(ERROR_MARKER) {
        let detail = rendered[start..]
            .split_once('}')
            .map_or(&rendered[start..], |(error, _)| error);
        let detail = detail.trim_start_matches(ERROR_MARKER).trim();
        return Err(format!("invalid pattern `{}`: {}", pattern, detail));
    }

    Ok(encoder)
}

pub(crate) fn default_encoder() -> PatternEncoder {
    PatternEncoder::new(DEFAULT_PATTERN)
}
