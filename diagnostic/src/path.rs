use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum DiagnosticPathSegment {
    Index(usize),
    Field(Cow<'static, str>),
}

impl From<usize> for DiagnosticPathSegment {
    fn from(value: usize) -> Self {
        DiagnosticPathSegment::Index(value)
    }
}

impl From<&'static str> for DiagnosticPathSegment {
    fn from(value: &'static str) -> Self {
        DiagnosticPathSegment::Field(Cow::Borrowed(value))
    }
}

impl From<String> for DiagnosticPathSegment {
    fn from(value: String) -> Self {
        DiagnosticPathSegment::Field(Cow::Owned(value))
    }
}

/// Location of a diagnostic inside a single document, e.g. `markups[0].normal`
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DiagnosticPath(SmallVec<[DiagnosticPathSegment; 4]>);

impl DiagnosticPath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: impl Into<DiagnosticPathSegment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<DiagnosticPathSegment> {
        self.0.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, other: &DiagnosticPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl Display for DiagnosticPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                DiagnosticPathSegment::Index(idx) => write!(f, "[{idx}]")?,
                DiagnosticPathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                DiagnosticPathSegment::Field(name) => write!(f, ".{name}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DiagnosticPath;

    #[test]
    fn should_display_nested_path() {
        let mut path = DiagnosticPath::empty();
        path.push("markups");
        path.push(1usize);
        path.push("controlPoints");
        path.push(0usize);
        path.push("position");
        assert_eq!(path.to_string(), "markups[1].controlPoints[0].position");
    }

    #[test]
    fn should_match_prefix() {
        let mut parent = DiagnosticPath::empty();
        parent.push("markups");
        let mut child = parent.clone();
        child.push(3usize);
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
        assert!(child.starts_with(&DiagnosticPath::empty()));
    }
}
