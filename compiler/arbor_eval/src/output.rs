//! Destination of script output (`trace`).
//!
//! Enum dispatch over the three destinations the engine needs: the process
//! stdout, an in-memory buffer for tests and embedding hosts, and nothing.

use std::sync::Arc;

use parking_lot::Mutex;

pub enum OutputHandler {
    Stdout,
    Buffer(Mutex<String>),
    Silent,
}

impl OutputHandler {
    /// Append text. Nothing is added between writes.
    pub fn write(&self, text: &str) {
        match self {
            OutputHandler::Stdout => print!("{text}"),
            OutputHandler::Buffer(buf) => buf.lock().push_str(text),
            OutputHandler::Silent => {}
        }
    }

    /// Everything written so far. Empty unless buffered.
    pub fn contents(&self) -> String {
        match self {
            OutputHandler::Buffer(buf) => buf.lock().clone(),
            OutputHandler::Stdout | OutputHandler::Silent => String::new(),
        }
    }

    pub fn clear(&self) {
        if let OutputHandler::Buffer(buf) = self {
            buf.lock().clear();
        }
    }
}

pub type SharedOutput = Arc<OutputHandler>;

pub fn stdout_output() -> SharedOutput {
    Arc::new(OutputHandler::Stdout)
}

pub fn buffer_output() -> SharedOutput {
    Arc::new(OutputHandler::Buffer(Mutex::new(String::new())))
}

pub fn silent_output() -> SharedOutput {
    Arc::new(OutputHandler::Silent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_buffer_accumulates() {
        let out = buffer_output();
        out.write("HEY;");
        out.write("HEY;");
        assert_eq!(out.contents(), "HEY;HEY;");
        out.clear();
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_silent_drops() {
        let out = silent_output();
        out.write("x");
        assert_eq!(out.contents(), "");
    }
}
