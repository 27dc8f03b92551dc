//! Defined names
//!
//! Names are carried through a load and written back unchanged so that
//! formulas referring to them keep evaluating after an edit.

/// Where a defined name is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Local to the sheet at this index
    Sheet(usize),
}

/// A defined name and the expression it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRange {
    /// The name as written in the source file
    pub name: String,
    /// Workbook-wide or sheet-local
    pub scope: NameScope,
    /// Reference or formula text, without a leading `=`
    pub refers_to: String,
    /// Hidden from the name manager
    pub hidden: bool,
    /// Optional comment
    pub comment: Option<String>,
}

impl NamedRange {
    /// Create a workbook-scoped name
    pub fn new<N: Into<String>, R: Into<String>>(name: N, refers_to: R) -> Self {
        let refers_to = refers_to.into();
        let refers_to = match refers_to.strip_prefix('=') {
            Some(rest) => rest.to_string(),
            None => refers_to,
        };
        Self {
            name: name.into(),
            scope: NameScope::Workbook,
            refers_to,
            hidden: false,
            comment: None,
        }
    }

    /// Restrict the name to one sheet
    pub fn local_to(mut self, sheet_index: usize) -> Self {
        self.scope = NameScope::Sheet(sheet_index);
        self
    }

    /// Mark the name hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Attach a comment
    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The sheet index for a sheet-local name
    pub fn local_sheet(&self) -> Option<usize> {
        match self.scope {
            NameScope::Workbook => None,
            NameScope::Sheet(index) => Some(index),
        }
    }

    /// Built-in names such as `_xlnm.Print_Area`
    pub fn is_builtin(&self) -> bool {
        self.name.starts_with("_xlnm.")
    }

    /// Names are matched case-insensitively within a scope
    pub fn matches(&self, name: &str, scope: NameScope) -> bool {
        self.scope == scope && self.name.eq_ignore_ascii_case(name)
    }
}
