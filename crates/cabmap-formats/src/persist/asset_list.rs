//! Flattened asset list export

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::error::{PersistError, Result};
use crate::class_id::ClassId;

/// One exported asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEntry {
    /// Display name
    #[serde(rename = "Name")]
    pub name: String,
    /// Container path from the bundle manifest, empty if none
    #[serde(rename = "Container")]
    pub container: String,
    /// Object class
    #[serde(rename = "Type")]
    pub class_id: ClassId,
    /// File-local object id
    #[serde(rename = "PathID")]
    pub path_id: i64,
    /// Bundle file the object was read from
    #[serde(rename = "Source")]
    pub source: String,
}

/// Document format of an exported asset list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExportListType {
    /// `<Assets>` document
    #[default]
    Xml,
    /// Indented JSON array
    Json,
}

impl ExportListType {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportListType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("xml") {
            Ok(Self::Xml)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("unknown export list type '{s}', expected xml or json"))
        }
    }
}

/// Write `entries` to `<dir>/<name>.<ext>` and return the path
pub fn export_asset_list(
    entries: &[AssetEntry],
    name: &str,
    dir: &Path,
    list_type: ExportListType,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(PersistError::io(dir))?;
    let path = dir.join(format!("{name}.{}", list_type.extension()));

    let file = File::create(&path).map_err(PersistError::io(&path))?;
    let mut writer = BufWriter::new(file);
    match list_type {
        ExportListType::Xml => {
            let filename = path.to_string_lossy();
            write_xml(entries, &filename, Utc::now(), &mut writer)
                .map_err(PersistError::io(&path))?;
        }
        ExportListType::Json => write_json(entries, &mut writer)?,
    }
    writer.flush().map_err(PersistError::io(&path))?;

    info!("Finished exporting asset list with {} items.", entries.len());
    Ok(path)
}

/// Write an `<Assets>` document
pub fn write_xml<W: Write>(
    entries: &[AssetEntry],
    filename: &str,
    created_at: DateTime<Utc>,
    writer: &mut W,
) -> std::io::Result<()> {
    writeln!(writer, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
    writeln!(
        writer,
        r#"<Assets filename="{}" createdAt="{}">"#,
        escape(filename),
        created_at.format("%Y-%m-%dT%H:%M:%S")
    )?;
    for entry in entries {
        writeln!(writer, "  <Asset>")?;
        writeln!(writer, "    <Name>{}</Name>", escape(&entry.name))?;
        writeln!(writer, "    <Container>{}</Container>", escape(&entry.container))?;
        writeln!(
            writer,
            r#"    <Type id="{}">{}</Type>"#,
            entry.class_id.id(),
            entry.class_id
        )?;
        writeln!(writer, "    <PathID>{}</PathID>", entry.path_id)?;
        writeln!(writer, "    <Source>{}</Source>", escape(&entry.source))?;
        writeln!(writer, "  </Asset>")?;
    }
    write!(writer, "</Assets>")
}

/// Write an indented JSON array
pub fn write_json<W: Write>(entries: &[AssetEntry], writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(writer, entries)?;
    Ok(())
}

/// Escape markup characters and drop control characters XML 1.0 cannot carry
fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'') || is_illegal_xml_char(c)) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_illegal_xml_char(c) => {}
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_illegal_xml_char(c: char) -> bool {
    matches!(c, '\0'..='\x1f') && !matches!(c, '\t' | '\n' | '\r')
}
