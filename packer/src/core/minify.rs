//! JSON minification.
//!
//! Key order and number spelling survive the round trip (`serde_json` is built
//! with `preserve_order` and `arbitrary_precision`), so the only change is the
//! removal of insignificant whitespace and redundant escapes.
//!
//! Nesting depth is unbounded: the parser's recursion limit is off and
//! `serde_stacker` grows the stack on demand for deep documents.

use serde::Deserialize;
use serde_json::Value;

/// Parse `input` as JSON and re-serialize it in compact form.
///
/// Returns the parse error when `input` is not a single well-formed JSON
/// document (this includes invalid UTF-8, empty input and a leading BOM).
///
/// Strings must be valid Unicode. An unpaired surrogate escape such as
/// `"\ud800"` is admitted by the JSON grammar but has no UTF-8 encoding, so
/// a document containing one is rejected like any other malformed file.
pub fn minify_json(input: &[u8]) -> Result<String, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_slice(input);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    serde_json::to_string(&value)
}
