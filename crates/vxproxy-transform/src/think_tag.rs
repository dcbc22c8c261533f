//! Incremental separation of tagged reasoning from visible content.
//!
//! The model wraps its chain of thought in `<marker>` / `</marker>`. Text can
//! arrive in arbitrary fragments, so a delimiter may be cut anywhere. The
//! splitter only ever holds back the longest tail of the input that could
//! still grow into the delimiter it is looking for; everything else is
//! released immediately.

pub const DEFAULT_THINK_MARKER: &str = "vertex_think_tag";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutput {
    pub content: String,
    pub reasoning: String,
}

impl SplitOutput {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty()
    }

    pub fn append(&mut self, other: SplitOutput) {
        self.content.push_str(&other.content);
        self.reasoning.push_str(&other.reasoning);
    }
}

#[derive(Debug, Clone)]
pub struct TagSplitter {
    open: String,
    close: String,
    inside: bool,
    pending: String,
    regions: usize,
}

impl TagSplitter {
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_THINK_MARKER)
    }

    pub fn with_marker(marker: &str) -> Self {
        Self::build(format!("<{marker}>"), format!("</{marker}>"))
    }

    /// Returns `None` if either delimiter is empty.
    pub fn with_delimiters(open: impl Into<String>, close: impl Into<String>) -> Option<Self> {
        let (open, close) = (open.into(), close.into());
        if open.is_empty() || close.is_empty() {
            return None;
        }
        Some(Self::build(open, close))
    }

    fn build(open: String, close: String) -> Self {
        Self {
            open,
            close,
            inside: false,
            pending: String::new(),
            regions: 0,
        }
    }

    /// Bytes currently held back as a possible delimiter prefix.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, fragment: &str) -> SplitOutput {
        let mut out = SplitOutput::default();
        let text = if self.pending.is_empty() {
            fragment.to_string()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.push_str(fragment);
            joined
        };

        let mut rest = text.as_str();
        loop {
            let delimiter = if self.inside { &self.close } else { &self.open };
            match rest.find(delimiter.as_str()) {
                Some(idx) => {
                    let after = idx + delimiter.len();
                    if self.inside {
                        out.reasoning.push_str(&rest[..idx]);
                        self.inside = false;
                    } else {
                        out.content.push_str(&rest[..idx]);
                        // Successive region bodies are newline-joined.
                        if self.regions > 0 {
                            out.reasoning.push('\n');
                        }
                        self.regions += 1;
                        self.inside = true;
                    }
                    rest = &rest[after..];
                }
                None => {
                    let keep = partial_delimiter_len(rest, delimiter);
                    let (emit, hold) = rest.split_at(rest.len() - keep);
                    if self.inside {
                        out.reasoning.push_str(emit);
                    } else {
                        out.content.push_str(emit);
                    }
                    self.pending = hold.to_string();
                    break;
                }
            }
        }

        out
    }

    /// Releases whatever is still buffered and resets the splitter. An
    /// unterminated region is flushed as reasoning.
    pub fn finish(&mut self) -> SplitOutput {
        let pending = std::mem::take(&mut self.pending);
        let out = if self.inside {
            SplitOutput {
                content: String::new(),
                reasoning: pending,
            }
        } else {
            SplitOutput {
                content: pending,
                reasoning: String::new(),
            }
        };
        self.inside = false;
        self.regions = 0;
        out
    }

    /// Splits a complete text in one call.
    pub fn split_complete(&mut self, text: &str) -> SplitOutput {
        let mut out = self.push(text);
        out.append(self.finish());
        out
    }
}

impl Default for TagSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `delimiter`.
fn partial_delimiter_len(text: &str, delimiter: &str) -> usize {
    let max = delimiter.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&len| delimiter.is_char_boundary(len) && text.ends_with(&delimiter[..len]))
        .unwrap_or(0)
}
