//! Inline content of the rich-text document model
//!
//! A paragraph is an ordered sequence of inline runs. A run is either a span
//! of text with consistent formatting or one of the keyword placeholders the
//! report editor lets authors drop into a paragraph.

/// A span of text with consistent formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    /// The text content (`"\n"` marks a hard line break)
    pub content: String,

    /// Bold formatting
    pub bold: bool,

    /// Italic formatting
    pub italic: bool,

    /// Underline formatting
    pub underline: bool,

    /// Inline code formatting (monospace)
    pub inline_code: bool,
}

impl TextRun {
    /// Create a new plain text run
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_style(content, TextStyle::default())
    }

    /// Create a new text run with the specified formatting
    pub fn with_style(content: impl Into<String>, style: TextStyle) -> Self {
        Self {
            content: content.into(),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            inline_code: style.inline_code,
        }
    }

    /// The formatting carried by this run
    pub fn style(&self) -> TextStyle {
        TextStyle {
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            inline_code: self.inline_code,
        }
    }

    /// Check if this text run has any formatting applied
    pub fn has_formatting(&self) -> bool {
        self.style().has_formatting()
    }

    /// Whether this run is a hard line break
    pub fn is_line_break(&self) -> bool {
        self.content == "\n"
    }
}

/// Formatting contributed by a tag, or accumulated from all enclosing tags
///
/// The parser keeps one of these per open element; a child's style is the
/// union of its parent's style and whatever the child tag adds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    /// Bold formatting active
    pub bold: bool,

    /// Italic formatting active
    pub italic: bool,

    /// Underline formatting active
    pub underline: bool,

    /// Inline code formatting active
    pub inline_code: bool,
}

impl TextStyle {
    /// Keep every flag that is set in either style
    pub fn union(self, other: TextStyle) -> TextStyle {
        TextStyle {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            inline_code: self.inline_code || other.inline_code,
        }
    }

    /// Check if any formatting is active
    pub fn has_formatting(&self) -> bool {
        self.bold || self.italic || self.underline || self.inline_code
    }

    /// Style contributed by a `class` attribute on a `<span>`
    ///
    /// Multiple classes contribute multiple styles at once; unknown classes
    /// contribute nothing.
    pub fn from_classes(classes: &str) -> TextStyle {
        classes
            .split_whitespace()
            .fold(TextStyle::default(), |style, class| match class {
                "bold" => TextStyle { bold: true, ..style },
                "italic" => TextStyle {
                    italic: true,
                    ..style
                },
                "underline" => TextStyle {
                    underline: true,
                    ..style
                },
                _ => style,
            })
    }
}

/// One inline element of a paragraph or list item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineRun {
    /// Formatted text
    Text(TextRun),

    /// `{{.client}}` left unresolved because no client name was available
    /// at parse time
    ClientPlaceholder,

    /// `{{.caption}}` followed by the caption prose
    CaptionPlaceholder {
        /// Caption text that followed the token (may be empty)
        text: String,
    },

    /// `{{.friendly_name}}` referencing a piece of evidence
    EvidenceReference {
        /// Evidence friendly name, without the braces and leading dot
        keyword: String,
    },
}

impl InlineRun {
    /// Text content of this run, if it is a text run
    pub fn text(&self) -> Option<&str> {
        match self {
            InlineRun::Text(run) => Some(&run.content),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_list_contributes_every_style() {
        // Arrange: a span carrying all three recognised classes plus noise
        let classes = "bold   underline mce-foo italic";

        // Act
        let style = TextStyle::from_classes(classes);

        // Assert
        assert!(style.bold);
        assert!(style.italic);
        assert!(style.underline);
        assert!(!style.inline_code);
    }

    #[test]
    fn test_union_is_or_of_flags() {
        let outer = TextStyle {
            bold: true,
            ..TextStyle::default()
        };
        let inner = TextStyle {
            inline_code: true,
            ..TextStyle::default()
        };

        let combined = outer.union(inner);

        assert_eq!(
            combined,
            TextStyle {
                bold: true,
                inline_code: true,
                ..TextStyle::default()
            }
        );
    }

    #[test]
    fn test_plain_run_has_no_formatting() {
        let run = TextRun::new("plain");
        assert!(!run.has_formatting());
        assert!(!run.is_line_break());
        assert!(TextRun::new("\n").is_line_break());
    }
}
