//! Durable, insertion-ordered accuracy table backed by a CSV file.
//!
//! Every [`AccuracyTable::append`] writes one row, flushes and syncs it before
//! returning, so a crash loses at most the record being written. A torn final
//! line left by such a crash is dropped on the next load.
//!
//! File layout: header `identifier,mean_distance,status`, one row per record.
//! Two-column tables (`M3ID,MEAN_DIST` or `identifier,mean_distance`) are
//! accepted and rewritten in the current layout before the first append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::record::{AccuracyRecord, Outcome, Status, Summary};
use crate::error::AccuracyError;

pub const HEADER: [&str; 3] = ["identifier", "mean_distance", "status"];

const IDENTIFIER_ALIASES: [&str; 2] = ["identifier", "m3id"];
const VALUE_ALIASES: [&str; 3] = ["mean_distance", "mean_dist", "meandistance"];

pub struct AccuracyTable {
    path: PathBuf,
    records: Vec<AccuracyRecord>,
    writer: Option<File>,
}

impl AccuracyTable {
    /// Load the table at `path`, or start an empty one if no file exists.
    ///
    /// The file itself is (re)written immediately so an interrupted run always
    /// leaves a readable table behind.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccuracyError> {
        let path = path.as_ref().to_path_buf();
        let (records, canonical) = if path.exists() {
            read_table(&path)?
        } else {
            (Vec::new(), false)
        };

        let mut table = Self {
            path,
            records,
            writer: None,
        };
        if !canonical {
            table.rewrite()?;
        }
        debug!(
            path = %table.path.display(),
            records = table.records.len(),
            "accuracy table opened"
        );
        Ok(table)
    }

    /// Read-only load, for summarising an existing table.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<AccuracyRecord>, AccuracyError> {
        read_table(path.as_ref()).map(|(records, _)| records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[AccuracyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> Option<Summary> {
        Summary::from_records(&self.records)
    }

    /// Append a record and make it durable before returning.
    pub fn append(&mut self, record: AccuracyRecord) -> Result<(), AccuracyError> {
        let line = format_row(&record);
        let path = self.path.clone();
        let persistence = |source| AccuracyError::Persistence {
            path: path.clone(),
            source,
        };

        if self.writer.is_none() {
            let file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(persistence)?;
            self.writer = Some(file);
        }
        if let Some(file) = self.writer.as_mut() {
            file.write_all(line.as_bytes()).map_err(persistence)?;
            file.flush().map_err(persistence)?;
            file.sync_data().map_err(persistence)?;
        }

        self.records.push(record);
        Ok(())
    }

    /// Write the whole table through a temporary file and an atomic rename.
    fn rewrite(&mut self) -> Result<(), AccuracyError> {
        let persistence = |source| AccuracyError::Persistence {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }

        let mut contents = format!("{}\n", HEADER.join(","));
        for record in &self.records {
            contents.push_str(&format_row(record));
        }

        let tmp = self.path.with_extension("csv.tmp");
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(persistence)?;
        self.writer = None;
        Ok(())
    }
}

fn format_row(record: &AccuracyRecord) -> String {
    format!(
        "{},{},{}\n",
        quote_field(&record.identifier),
        record.mean_distance(),
        record.outcome.status()
    )
}

fn quote_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV line into fields, honouring double-quoted fields.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

struct Columns {
    identifier: usize,
    value: usize,
    status: Option<usize>,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let find = |aliases: &[&str]| {
            fields
                .iter()
                .position(|f| aliases.contains(&f.trim().to_ascii_lowercase().as_str()))
        };
        Some(Self {
            identifier: find(&IDENTIFIER_ALIASES)?,
            value: find(&VALUE_ALIASES)?,
            status: find(&["status"]),
        })
    }

    fn is_canonical(&self, width: usize) -> bool {
        width == HEADER.len() && self.identifier == 0 && self.value == 1 && self.status == Some(2)
    }
}

/// Parse a table file. The flag reports whether the file is already in the
/// current layout with no torn tail.
fn read_table(path: &Path) -> Result<(Vec<AccuracyRecord>, bool), AccuracyError> {
    let text = fs::read_to_string(path).map_err(|source| AccuracyError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    let corrupt = |line: usize, reason: String| AccuracyError::CorruptTable {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header)) = lines.next() else {
        return Ok((Vec::new(), false));
    };
    let header_fields = split_fields(header).map_err(|e| corrupt(1, e))?;
    let columns = Columns::from_header(&header_fields)
        .ok_or_else(|| corrupt(1, format!("unrecognised header '{header}'")))?;
    let mut canonical = columns.is_canonical(header_fields.len());

    let rows: Vec<(usize, &str)> = lines.collect();
    let torn_tail = !text.ends_with('\n');
    let mut records = Vec::with_capacity(rows.len());

    for (k, &(idx, line)) in rows.iter().enumerate() {
        let line_no = idx + 1;
        let is_last = k + 1 == rows.len();
        match parse_row(line, &columns) {
            Ok(record) => records.push(record),
            Err(reason) if is_last && torn_tail => {
                warn!(
                    path = %path.display(),
                    line = line_no,
                    "dropping incomplete trailing row: {reason}"
                );
                canonical = false;
            }
            Err(reason) => return Err(corrupt(line_no, reason)),
        }
    }
    if torn_tail {
        // Appends must start on a fresh line.
        canonical = false;
    }

    Ok((records, canonical))
}

fn parse_row(line: &str, columns: &Columns) -> Result<AccuracyRecord, String> {
    let fields = split_fields(line)?;
    let get = |i: usize| {
        fields
            .get(i)
            .map(|f| f.trim())
            .ok_or_else(|| format!("missing column {i}"))
    };

    let identifier = get(columns.identifier)?.to_string();
    let raw = get(columns.value)?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid mean distance '{raw}'"))?;
    let status = match columns.status {
        Some(i) => Some(get(i)?.parse::<Status>()?),
        None => None,
    };

    Ok(AccuracyRecord::new(identifier, Outcome::from_columns(value, status)))
}
