use std::fmt::Display;
use std::fmt::Formatter;

/// Stable codes for import map normalization diagnostics.
pub mod codes {
  /// `imports` or `scopes` is present but not an object.
  pub const TOP_LEVEL_MEMBER_NOT_OBJECT: &str = "IMAP0001";
  /// A mapping's address is not a string.
  pub const ADDRESS_NOT_STRING: &str = "IMAP0002";
  /// A mapping's address cannot be resolved to an absolute URL.
  pub const ADDRESS_NOT_URL: &str = "IMAP0003";
  /// A `/`-terminated specifier key maps to an address without a trailing `/`.
  pub const TRAILING_SLASH_MISMATCH: &str = "IMAP0004";
  /// A specifier key is the empty string.
  pub const EMPTY_SPECIFIER_KEY: &str = "IMAP0005";
  /// A scope prefix cannot be resolved to an absolute URL.
  pub const SCOPE_PREFIX_NOT_URL: &str = "IMAP0006";
  /// A scope's body is not an object.
  pub const SCOPE_NOT_OBJECT: &str = "IMAP0007";
  /// Two specifier keys normalize to the same key; the later one wins.
  pub const DUPLICATE_KEY: &str = "IMAP0008";
}

/// Diagnostic severity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Severity {
  Error,
  Warning,
  Note,
}

impl Severity {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Severity::Error => "error",
      Severity::Warning => "warning",
      Severity::Note => "note",
    }
  }
}

impl Display for Severity {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A user-facing diagnostic produced while normalizing an import map.
///
/// Import map documents are JSON values without source positions, so instead of a span a
/// diagnostic carries the JSON pointer-ish `path` of the offending entry (e.g.
/// `scopes["/pkg/"]["dep"]`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
  pub code: &'static str,
  pub severity: Severity,
  pub message: String,
  pub path: String,
  pub notes: Vec<String>,
}

impl Diagnostic {
  pub fn new(
    severity: Severity,
    code: &'static str,
    message: impl Into<String>,
    path: impl Into<String>,
  ) -> Self {
    Self {
      code,
      severity,
      message: message.into(),
      path: path.into(),
      notes: Vec::new(),
    }
  }

  pub fn warning(code: &'static str, message: impl Into<String>, path: impl Into<String>) -> Self {
    Self::new(Severity::Warning, code, message, path)
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{severity}[{code}]: {message}\n  --> {path}",
      severity = self.severity,
      code = self.code,
      message = self.message,
      path = self.path
    )?;
    for note in &self.notes {
      write!(f, "\n  = note: {note}")?;
    }
    Ok(())
  }
}
