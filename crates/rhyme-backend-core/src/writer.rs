//! Indented line writer shared by the text backends.

/// Accumulates lines of source text at a tracked nesting depth.
#[derive(Debug)]
pub struct TextWriter {
    out: String,
    depth: usize,
    indent_width: usize,
}

impl TextWriter {
    /// Creates an empty writer indenting by `indent_width` spaces per level.
    pub fn new(indent_width: usize) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            indent_width,
        }
    }

    /// Writes one line at the current depth.
    pub fn line(&mut self, text: &str) {
        let pad = " ".repeat(self.depth * self.indent_width);
        self.out.push_str(&format!("{pad}{text}\n"));
    }

    /// Increases the depth by one level.
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Decreases the depth by one level.
    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Returns the current depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the text written so far.
    pub fn finish(self) -> String {
        self.out
    }
}
