//! Include back-traces and key definition histories

use crate::types::SourcePos;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the sections enclosing a position, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPath {
    segments: Vec<String>,
}

impl SectionPath {
    /// Create a new empty section path (the document root)
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Push a section name onto the path
    pub fn push(&mut self, name: impl Into<String>) {
        self.segments.push(name.into());
    }

    /// Pop the innermost section name
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// Get the segments as a slice
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if the path is the root
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of enclosing sections
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl From<Vec<String>> for SectionPath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, ">");
        }
        write!(f, "> {}", self.segments.join(" > "))
    }
}

/// Where something was defined: the include back-trace and the section path.
///
/// `trail[0]` is the position in the top-level file; every following entry is
/// one `@include`/`@inherit` deeper, and the last entry is the position itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub trail: Vec<SourcePos>,
    pub section: SectionPath,
}

impl Origin {
    pub fn new(trail: Vec<SourcePos>, section: SectionPath) -> Self {
        Origin { trail, section }
    }

    /// An origin standing for a whole file at the root section.
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Origin {
            trail: vec![SourcePos::file(path)],
            section: SectionPath::new(),
        }
    }

    /// The innermost position, i.e. where the thing itself is written.
    pub fn position(&self) -> Option<&SourcePos> {
        self.trail.last()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "* Section trace: {}", self.section)?;
        writeln!(f, "* Include back trace:")?;
        for (depth, pos) in self.trail.iter().enumerate().rev() {
            writeln!(f, "#{:2}: {}", depth, pos)?;
        }
        write!(f, "#End")
    }
}

/// Definition history of a key, oldest first.
///
/// A key that is merged from an included file and then overwritten by the
/// includer ends up with two origins: the included definition and the
/// overwriting one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    origins: Vec<Origin>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new (most recent) definition.
    pub fn push(&mut self, origin: Origin) {
        self.origins.push(origin);
    }

    /// Append another history after this one.
    pub fn extend(&mut self, other: &Provenance) {
        self.origins.extend(other.origins.iter().cloned());
    }

    /// The most recent definition.
    pub fn latest(&self) -> Option<&Origin> {
        self.origins.last()
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl From<Origin> for Provenance {
    fn from(origin: Origin) -> Self {
        Provenance {
            origins: vec![origin],
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.origins.is_empty() {
            return write!(f, "* (no source information)");
        }
        for (i, origin) in self.origins.iter().rev().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f, "* Previously defined at:")?;
            }
            write!(f, "{}", origin)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(file: &str, source: &str, offset: usize) -> SourcePos {
        SourcePos::in_source(file, source, offset)
    }

    #[test]
    fn test_section_path_display() {
        let mut path = SectionPath::new();
        assert_eq!(path.to_string(), ">");

        path.push("server");
        path.push("tls");
        assert_eq!(path.to_string(), "> server > tls");
        assert_eq!(path.len(), 2);

        assert_eq!(path.pop().as_deref(), Some("tls"));
        assert_eq!(path.segments(), ["server".to_string()]);
    }

    #[test]
    fn test_origin_display_lists_innermost_first() {
        let main = "@include(child.conf)\n";
        let child = "a = 1\nb = 2\n";
        let origin = Origin::new(
            vec![pos("main.conf", main, 0), pos("child.conf", child, 6)],
            SectionPath::new(),
        );

        let expected = "* Section trace: >\n\
                        * Include back trace:\n\
                        # 1: child.conf (line 2, column 1)\n\tb = 2\n\
                        # 0: main.conf (line 1, column 1)\n\t@include(child.conf)\n\
                        #End";
        assert_eq!(origin.to_string(), expected);
        assert_eq!(origin.position().and_then(SourcePos::line), Some(2));
    }

    #[test]
    fn test_provenance_history() {
        let mut history = Provenance::from(Origin::file("a.conf"));
        history.push(Origin::file("b.conf"));

        assert_eq!(history.origins().len(), 2);
        assert_eq!(
            history.latest().and_then(Origin::position).map(|p| p.path().to_path_buf()),
            Some("b.conf".into())
        );

        let rendered = history.to_string();
        let newest = rendered.find("b.conf").unwrap();
        let oldest = rendered.find("a.conf").unwrap();
        assert!(newest < oldest);
        assert!(rendered.contains("* Previously defined at:"));
    }

    #[test]
    fn test_provenance_extend_concatenates() {
        let mut dst = Provenance::from(Origin::file("dst.conf"));
        let src = Provenance::from(Origin::file("src.conf"));
        dst.extend(&src);

        let files: Vec<_> = dst
            .origins()
            .iter()
            .filter_map(|o| o.position())
            .map(|p| p.path().display().to_string())
            .collect();
        assert_eq!(files, ["dst.conf", "src.conf"]);
    }

    #[test]
    fn test_empty_provenance_display() {
        assert_eq!(
            Provenance::new().to_string(),
            "* (no source information)"
        );
    }
}
