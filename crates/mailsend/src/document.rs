//! Static documents printed by the `help`, `install`, `readme` and
//! `license` commands.

use std::io::Write;
use std::path::Path;

use anyhow::Context;

/// A document shipped next to the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    /// Usage notes.
    Help,
    /// Installation notes.
    Install,
    /// Project overview.
    Readme,
    /// License text.
    License,
}

impl Document {
    /// Maps a command word to its document.
    #[must_use]
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "help" => Some(Self::Help),
            "install" => Some(Self::Install),
            "readme" => Some(Self::Readme),
            "license" => Some(Self::License),
            _ => None,
        }
    }

    /// File holding the document, relative to the working directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Help => "HELP",
            Self::Install => "INSTALL",
            Self::Readme => "README",
            Self::License => "COPYING",
        }
    }

    /// Copies the document found in `dir` to `out`, line by line.
    pub fn print_from(self, dir: &Path, out: &mut impl Write) -> anyhow::Result<()> {
        let path = dir.join(self.file_name());
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("can not open {}", path.display()))?;

        for line in text.lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command() {
        assert_eq!(Document::from_command("help"), Some(Document::Help));
        assert_eq!(Document::from_command("license"), Some(Document::License));
        assert_eq!(Document::from_command("HELP"), None);
        assert_eq!(Document::from_command("message.txt"), None);
    }

    #[test]
    fn test_print_from() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), "line one\r\nline two").unwrap();

        let mut out = Vec::new();
        Document::Readme.print_from(dir.path(), &mut out).unwrap();
        assert_eq!(out, b"line one\nline two\n");
    }

    #[test]
    fn test_print_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let err = Document::Install
            .print_from(dir.path(), &mut out)
            .unwrap_err();
        assert!(err.to_string().contains("INSTALL"));
    }
}
