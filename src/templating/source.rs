//! Template references, lookup-path resolution and source decoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::TemplateError;

/// Extensions probed for each lookup directory, in order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["", "tpl", "shtml"];

/// Identity reported for templates given as literal text.
pub const INLINE_IDENTITY: &str = "<inline>";

/// What to render: literal source text or a name resolved through the
/// lookup path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateRef {
    Source(String),
    Name(String),
}

impl TemplateRef {
    pub fn source(text: impl Into<String>) -> Self {
        Self::Source(text.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Name used in diagnostics: the template name, or `<inline>`.
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Source(_) => INLINE_IDENTITY,
            Self::Name(name) => name,
        }
    }
}

/// Bare text is template source; lookups go through [`TemplateRef::name`].
impl From<&str> for TemplateRef {
    fn from(text: &str) -> Self {
        Self::Source(text.to_string())
    }
}

impl From<String> for TemplateRef {
    fn from(text: String) -> Self {
        Self::Source(text)
    }
}

impl From<&TemplateRef> for TemplateRef {
    fn from(template: &TemplateRef) -> Self {
        template.clone()
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identity())
    }
}

/// Encoding of template files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Decode raw file bytes.
    pub fn decode(self, bytes: Vec<u8>) -> io::Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for Encoding {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(TemplateError::Config {
                message: format!("unsupported encoding '{other}' (expected utf-8 or latin-1)"),
            }),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        })
    }
}

/// Where a source came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Inline,
    File(PathBuf),
}

/// Template text ready to be compiled.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    text: String,
    origin: Origin,
}

impl TemplateSource {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::Inline,
        }
    }

    /// Read and decode a template file.
    pub fn from_file(path: &Path, encoding: Encoding) -> Result<Self, TemplateError> {
        let text = std::fs::read(path)
            .and_then(|bytes| encoding.decode(bytes))
            .map_err(|source| TemplateError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            text,
            origin: Origin::File(path.to_path_buf()),
        })
    }

    /// Load the source a [`TemplateRef`] points at.
    ///
    /// # Errors
    ///
    /// [`TemplateError::SourceMissing`] for an empty reference,
    /// [`TemplateError::ResolutionFailed`] when no lookup directory holds the
    /// name, [`TemplateError::ReadFailed`] when the file cannot be read.
    pub fn load(
        template: &TemplateRef,
        lookup: &[PathBuf],
        extensions: &[String],
        encoding: Encoding,
    ) -> Result<Self, TemplateError> {
        match template {
            TemplateRef::Source(text) => Ok(Self::inline(text.clone())),
            TemplateRef::Name(name) if name.trim().is_empty() => Err(TemplateError::SourceMissing),
            TemplateRef::Name(name) => {
                let path = search(name, lookup, extensions).ok_or_else(|| {
                    TemplateError::ResolutionFailed {
                        name: name.clone(),
                        lookup: lookup.to_vec(),
                    }
                })?;
                tracing::debug!("Resolved template '{}' to {}", name, path.display());
                Self::from_file(&path, encoding)
            }
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }
}

/// First existing `dir/name[.ext]`, trying every extension in every lookup
/// directory in order.
#[must_use]
pub fn search(name: &str, lookup: &[PathBuf], extensions: &[String]) -> Option<PathBuf> {
    lookup.iter().find_map(|dir| {
        extensions.iter().find_map(|extension| {
            let candidate = if extension.is_empty() {
                dir.join(name)
            } else {
                dir.join(format!("{name}.{}", extension.trim_start_matches('.')))
            };
            candidate.is_file().then_some(candidate)
        })
    })
}

/// [`DEFAULT_EXTENSIONS`] as owned strings.
#[must_use]
pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_template_ref_from_str() {
        assert_eq!(TemplateRef::from("footer"), TemplateRef::source("footer"));
        assert_eq!(TemplateRef::from("Hello world".to_string()), TemplateRef::source("Hello world"));
        assert_eq!(TemplateRef::from("Hi {{name}}"), TemplateRef::source("Hi {{name}}"));
        assert_eq!(TemplateRef::from("%% x = 1\n"), TemplateRef::source("%% x = 1\n"));
        assert_eq!(TemplateRef::source("x").identity(), INLINE_IDENTITY);
        assert_eq!(TemplateRef::name("footer").to_string(), "footer");
    }

    #[test]
    fn test_search_order() -> Result<()> {
        let first = TempDir::new()?;
        let second = TempDir::new()?;
        std::fs::write(second.path().join("page"), "plain")?;
        std::fs::write(first.path().join("page.shtml"), "shtml")?;
        std::fs::write(first.path().join("page.tpl"), "tpl")?;

        let lookup = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let found = search("page", &lookup, &default_extensions());
        assert_eq!(found, Some(first.path().join("page.tpl")));

        let reversed = vec![second.path().to_path_buf(), first.path().to_path_buf()];
        assert_eq!(search("page", &reversed, &default_extensions()), Some(second.path().join("page")));
        assert_eq!(search("missing", &lookup, &default_extensions()), None);
        Ok(())
    }

    #[test]
    fn test_load_errors() -> Result<()> {
        let dir = TempDir::new()?;
        let lookup = vec![dir.path().to_path_buf()];

        let err = TemplateSource::load(&TemplateRef::name(""), &lookup, &default_extensions(), Encoding::Utf8)
            .unwrap_err();
        assert!(matches!(err, TemplateError::SourceMissing));

        let err = TemplateSource::load(&TemplateRef::name("nope"), &lookup, &default_extensions(), Encoding::Utf8)
            .unwrap_err();
        assert!(matches!(err, TemplateError::ResolutionFailed { .. }));

        std::fs::write(dir.path().join("bad.tpl"), [0xff, 0xfe, b'x'])?;
        let err = TemplateSource::load(&TemplateRef::name("bad"), &lookup, &default_extensions(), Encoding::Utf8)
            .unwrap_err();
        assert!(matches!(err, TemplateError::ReadFailed { .. }));
        Ok(())
    }

    #[test]
    fn test_latin1_decoding() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("caf.tpl"), [b'c', b'a', b'f', 0xe9])?;
        let source = TemplateSource::load(
            &TemplateRef::name("caf"),
            &[dir.path().to_path_buf()],
            &default_extensions(),
            Encoding::Latin1,
        )?;
        assert_eq!(source.text(), "café");
        assert_eq!(source.origin(), &Origin::File(dir.path().join("caf.tpl")));
        Ok(())
    }

    #[test]
    fn test_encoding_names() -> Result<()> {
        assert_eq!("UTF-8".parse::<Encoding>()?, Encoding::Utf8);
        assert_eq!("latin1".parse::<Encoding>()?, Encoding::Latin1);
        assert!("ebcdic".parse::<Encoding>().is_err());
        Ok(())
    }
}
