//! Append-only log sinks for migration and repair audit lines
//!
//! Every rename, default injection and envelope wrap performed by a
//! migration step writes exactly one line to the sink it was handed. The
//! repair engine hands in its own `Vec<String>` so those lines end up in the
//! repair log shown to the user.

/// Destination for human-readable audit lines
pub trait LogSink {
    /// Append one line
    fn line(&mut self, message: String);
}

impl LogSink for Vec<String> {
    fn line(&mut self, message: String) {
        self.push(message);
    }
}

/// Forwards every line to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&mut self, message: String) {
        tracing::info!(target: "adkar_backup::audit", "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn line(&mut self, _message: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn emit(sink: &mut dyn LogSink) {
        sink.line("first".to_string());
        sink.line("second".to_string());
    }

    #[test]
    fn test_vec_sink_keeps_order() {
        let mut lines: Vec<String> = Vec::new();
        emit(&mut lines);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_emits_audit_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || emit(&mut TracingSink));

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("adkar_backup::audit"));
        assert!(output.find("first").unwrap() < output.find("second").unwrap());
    }

    #[test]
    fn test_null_sink_accepts_lines() {
        let mut sink = NullSink;
        emit(&mut sink);
    }
}
