//! Area-id rewrite for extracted outlet documents
//!
//! Some tenants maintain their own territory codes; their `outlets.xml`
//! must have every `AREA_ID` attribute translated through a mapping table
//! before delivery. The rewrite works on the parsed event stream rather
//! than text substitution, so values embedded in element text are never
//! touched.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::{info, warn};

use crate::constants::transform;
use crate::errors::{TransformError, TransformResult};

/// Keyed substitution of area identifiers in outlet documents
#[derive(Debug)]
pub struct Transformer {
    mappings: HashMap<String, String>,
}

impl Transformer {
    /// Load the mapping table from a JSON object file
    ///
    /// A missing file yields an empty table (the transform becomes a no-op)
    /// with a warning; a file that exists but is not a JSON string-to-string
    /// object is an error.
    pub fn load(mapping_file: &Path) -> TransformResult<Self> {
        if !mapping_file.exists() {
            warn!(
                "Area mapping file not found: {}; transform disabled for this run",
                mapping_file.display()
            );
            return Ok(Self {
                mappings: HashMap::new(),
            });
        }

        let content = std::fs::read_to_string(mapping_file)?;
        let mappings: HashMap<String, String> = serde_json::from_str(&content)?;
        info!("Loaded {} area mapping(s)", mappings.len());
        Ok(Self { mappings })
    }

    /// Build a transformer from an in-memory table
    pub fn with_mappings(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    /// Rewrite mapped `AREA_ID` attributes in the given document, in place
    ///
    /// Returns whether anything changed; the file is only rewritten when it
    /// did.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::Xml` when the document does not parse and
    /// `TransformError::Io` on read/write failures.
    pub fn process_outlets(&self, path: &Path) -> TransformResult<bool> {
        if self.mappings.is_empty() {
            return Ok(false);
        }

        let content = std::fs::read_to_string(path)?;
        let (rewritten, changes) = self.rewrite(&content).map_err(|source| {
            TransformError::Xml {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if changes == 0 {
            return Ok(false);
        }

        std::fs::write(path, rewritten)?;
        info!("Rewrote {} area id(s) in {}", changes, path.display());
        Ok(true)
    }

    fn rewrite(&self, content: &str) -> Result<(Vec<u8>, usize), quick_xml::Error> {
        let mut reader = Reader::from_str(content);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let mut changes = 0usize;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => {
                    let (rewritten, n) = self.rewrite_attributes(&e)?;
                    changes += n;
                    writer.write_event(Event::Start(rewritten))?;
                }
                Event::Empty(e) => {
                    let (rewritten, n) = self.rewrite_attributes(&e)?;
                    changes += n;
                    writer.write_event(Event::Empty(rewritten))?;
                }
                event => writer.write_event(event)?,
            }
        }

        Ok((writer.into_inner().into_inner(), changes))
    }

    fn rewrite_attributes(
        &self,
        element: &BytesStart<'_>,
    ) -> Result<(BytesStart<'static>, usize), quick_xml::Error> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut rewritten = BytesStart::new(name);
        let mut changes = 0usize;

        for attr in element.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == transform::AREA_ID_ATTR.as_bytes() {
                let value = attr.unescape_value()?;
                if let Some(mapped) = self.mappings.get(value.as_ref()) {
                    rewritten.push_attribute((transform::AREA_ID_ATTR, mapped.as_str()));
                    changes += 1;
                    continue;
                }
            }
            rewritten.push_attribute(attr);
        }

        Ok((rewritten.into_owned(), changes))
    }
}
