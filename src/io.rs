//! Output seam between the shell and the embedder's console transport.

/// Byte-emitting capability supplied by the embedder.
///
/// Invoked for every visible effect the shell produces: echoed characters,
/// cursor-move escapes, prompt text and help listings. Writes are expected
/// to complete before returning; the shell does no buffering of its own.
/// The sink must not feed bytes back into the shell.
pub trait OutputSink {
    fn write_str(&mut self, text: &str);
}

/// Any `FnMut(&str)` closure works as a sink.
impl<F: FnMut(&str)> OutputSink for F {
    fn write_str(&mut self, text: &str) {
        self(text)
    }
}
