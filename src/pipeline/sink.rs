//! Destinations for enriched items

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::EnrichedItem;

/// Receives enriched items at the end of a run.
pub trait ItemSink {
    /// Persist `items`, returning how many were written.
    fn write_batch(&mut self, items: &[EnrichedItem]) -> Result<usize>;
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Append to the file at `path`, creating it if needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ItemSink for JsonLinesSink<W> {
    fn write_batch(&mut self, items: &[EnrichedItem]) -> Result<usize> {
        for item in items {
            serde_json::to_writer(&mut self.out, item).context("Failed to encode item")?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush().context("Failed to flush item sink")?;
        Ok(items.len())
    }
}
