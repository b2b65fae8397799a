//! source locations for user facing error messages
use std::path::PathBuf;

/// 1-based line/column position in a source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Position {
    /// Resolve a byte offset into line and column
    pub fn at_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let mut line = 1;
        let mut line_start = 0;
        for (index, char) in text.char_indices() {
            if index >= offset {
                break;
            }
            if char == '\n' {
                line += 1;
                line_start = index + 1;
            }
        }

        let column = text
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or_default()
            + 1;

        Self {
            line,
            column,
            byte: offset,
        }
    }
}

/// A span inside an (optionally named) source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRange {
    pub path: Option<PathBuf>,
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(path: Option<PathBuf>, text: &str, span: Option<std::ops::Range<usize>>) -> Self {
        let Some(span) = span else {
            return Self {
                path,
                ..Default::default()
            };
        };

        Self {
            path,
            start: Position::at_offset(text, span.start),
            end: Position::at_offset(text, span.end),
        }
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display())?,
            None => f.write_str("<input>")?,
        }

        if self.start.line == 0 {
            return Ok(());
        }

        write!(
            f,
            ":{},{}-{},{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn offsets_resolve_to_lines_and_columns() {
        let text = "a = 1\nblock {\n  b = 2\n}\n";
        let range = SourceRange::new(Some("main.hcl".into()), text, Some(6..23));

        assert_eq!(range.start.line, 2);
        assert_eq!(range.start.column, 1);
        assert_eq!(range.end.line, 4);
        assert_eq!(range.to_string(), "main.hcl:2,1-4,2");
    }

    #[test]
    fn unknown_span_prints_path_only() {
        let range = SourceRange::new(None, "", None);
        assert_eq!(range.to_string(), "<input>");
    }
}
