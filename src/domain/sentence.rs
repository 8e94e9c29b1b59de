// ============================================================
// Layer 3 — Styled Sentence Domain Types
// ============================================================
// A non-parallel style corpus is two bags of sentences, one per
// style (e.g. negative / positive reviews). Nothing pairs a
// sentence with its counterpart in the other style; the only
// supervision is the style label itself.

use serde::{Deserialize, Serialize};

/// Binary style attribute.
///
/// The numeric value is fed to the model as a float so that the
/// label projection can be evaluated for both `y` and `1 - y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleLabel {
    Style0,
    Style1,
}

impl StyleLabel {
    /// Both labels in index order.
    pub const ALL: [StyleLabel; 2] = [StyleLabel::Style0, StyleLabel::Style1];

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(StyleLabel::Style0),
            1 => Some(StyleLabel::Style1),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            StyleLabel::Style0 => 0,
            StyleLabel::Style1 => 1,
        }
    }

    pub fn as_f32(self) -> f32 {
        self.index() as f32
    }

    /// The style a sentence is transferred into.
    pub fn flipped(self) -> Self {
        match self {
            StyleLabel::Style0 => StyleLabel::Style1,
            StyleLabel::Style1 => StyleLabel::Style0,
        }
    }
}

/// One raw sentence and the style it was written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSentence {
    pub text:  String,
    pub label: StyleLabel,
}

impl StyledSentence {
    pub fn new(text: impl Into<String>, label: StyleLabel) -> Self {
        Self { text: text.into(), label }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
