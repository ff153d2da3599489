//! Manifest events over a decoded (textual) manifest document.
//!
//! Packaged applications carry their manifest in a compiled binary form; the
//! toolchain can dump it back to XML. [`XmlManifest`] pulls events from such
//! a document with `quick-xml`, reporting tag and attribute names by local
//! name so `android:targetPackage` is seen as `targetPackage`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Attribute, ManifestError, ManifestEvent, ManifestEvents, ManifestResult};

/// Event source over an XML manifest.
pub struct XmlManifest<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// End tag owed for a self-closing element.
    pending_end: Option<String>,
    done: bool,
}

impl XmlManifest<BufReader<File>> {
    /// Opens a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Unreadable`] if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> ManifestResult<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ManifestError::Unreadable {
            path: path.clone(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<'a> XmlManifest<&'a [u8]> {
    /// Reads a manifest held in memory.
    pub fn from_document(content: &'a str) -> Self {
        Self::from_reader(content.as_bytes())
    }
}

impl<R: BufRead> XmlManifest<R> {
    /// Wraps any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::new(),
            pending_end: None,
            done: false,
        }
    }
}

fn decode_start(start: &BytesStart<'_>) -> Result<(String, Vec<Attribute>), String> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        attributes.push(Attribute::new(key, value));
    }

    Ok((name, attributes))
}

impl<R: BufRead> ManifestEvents for XmlManifest<R> {
    fn next_event(&mut self) -> ManifestResult<ManifestEvent> {
        if let Some(name) = self.pending_end.take() {
            return Ok(ManifestEvent::EndTag { name });
        }
        if self.done {
            return Ok(ManifestEvent::EndDocument);
        }

        self.buf.clear();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(ManifestError::Decode(format!(
                    "at byte {}: {}",
                    self.reader.buffer_position(),
                    e
                )));
            }
        };

        let decoded = match event {
            Event::Start(start) => {
                let (name, attributes) = decode_start(&start).map_err(ManifestError::Decode)?;
                ManifestEvent::StartTag { name, attributes }
            }
            Event::Empty(start) => {
                let (name, attributes) = decode_start(&start).map_err(ManifestError::Decode)?;
                self.pending_end = Some(name.clone());
                ManifestEvent::StartTag { name, attributes }
            }
            Event::End(end) => ManifestEvent::EndTag {
                name: String::from_utf8_lossy(end.local_name().as_ref()).into_owned(),
            },
            Event::Eof => {
                self.done = true;
                ManifestEvent::EndDocument
            }
            _ => ManifestEvent::Other,
        };

        Ok(decoded)
    }
}
