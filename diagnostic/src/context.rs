use crate::diagnostic::{Diagnostic, DiagnosticLevel};
use crate::path::{DiagnosticPath, DiagnosticPathSegment};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::BTreeMap;

type Reports = BTreeMap<DiagnosticPath, SmallVec<[Diagnostic; 1]>>;

/// Collects diagnostics of several documents, keyed by document identifier
/// (usually a file path) and by location inside the document
#[derive(Debug)]
pub struct DiagnosticContext {
    pub diagnostics: BTreeMap<String, Reports>,
    path: DiagnosticPath,
}

impl Default for DiagnosticContext {
    fn default() -> Self {
        DiagnosticContext {
            diagnostics: Default::default(),
            path: DiagnosticPath::empty(),
        }
    }
}

impl DiagnosticContext {
    pub fn merge(&mut self, other: DiagnosticContext) {
        for (ident, diagnostics) in other.diagnostics {
            let entry = self.diagnostics.entry(ident).or_default();
            for (path, reports) in diagnostics {
                entry.entry(path).or_default().extend(reports);
            }
        }
    }

    pub fn enter<'a>(&'a mut self, ident: &'a str) -> DiagnosticContextMut<'a> {
        let entry = self.diagnostics.entry(ident.to_string()).or_default();
        DiagnosticContextMut {
            diagnostics: entry,
            path: &mut self.path,
            ident,
            pop_on_exit: false,
        }
    }

    /// Checks if there are any diagnostics of the specified level or higher
    pub fn has_diagnostics(&self, level: DiagnosticLevel) -> bool {
        self.iter().any(|(_, _, d)| d.level >= level)
    }

    /// Counts diagnostics of exactly the specified level
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.iter().filter(|(_, _, d)| d.level == level).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiagnosticPath, &Diagnostic)> {
        self.diagnostics.iter().flat_map(|(ident, reports)| {
            reports.iter().flat_map(move |(path, diagnostics)| {
                diagnostics.iter().map(move |d| (ident.as_str(), path, d))
            })
        })
    }
}

#[derive(Debug)]
pub struct DiagnosticContextMut<'a> {
    diagnostics: &'a mut Reports,
    path: &'a mut DiagnosticPath,
    ident: &'a str,
    pop_on_exit: bool,
}

impl DiagnosticContextMut<'_> {
    pub fn enter(&mut self, segment: impl Into<DiagnosticPathSegment>) -> DiagnosticContextMut<'_> {
        self.path.push(segment);
        DiagnosticContextMut {
            diagnostics: &mut *self.diagnostics,
            path: &mut *self.path,
            ident: self.ident,
            pop_on_exit: true,
        }
    }

    pub fn enter_index(&mut self, index: usize) -> DiagnosticContextMut<'_> {
        self.enter(DiagnosticPathSegment::Index(index))
    }

    pub fn enter_field(&mut self, field: impl Into<Cow<'static, str>>) -> DiagnosticContextMut<'_> {
        self.enter(DiagnosticPathSegment::Field(field.into()))
    }

    pub fn emit(&mut self, info: miette::Report, level: DiagnosticLevel) {
        self.diagnostics
            .entry(self.path.clone())
            .or_default()
            .push(Diagnostic { info, level });
    }

    pub fn emit_warning(&mut self, info: miette::Report) {
        self.emit(info, DiagnosticLevel::Warning);
    }

    /// Clears all diagnostics originating from the current context or its children.
    pub fn clear_downstream(&mut self) {
        let path = &*self.path;
        self.diagnostics.retain(|p, _| !p.starts_with(path));
    }

    pub fn path(&self) -> &DiagnosticPath {
        self.path
    }

    pub fn full_path(&self) -> String {
        format!("{}@{}", self.ident, self.path)
    }
}

impl Drop for DiagnosticContextMut<'_> {
    fn drop(&mut self) {
        if self.pop_on_exit {
            self.path.pop();
        }
    }
}
