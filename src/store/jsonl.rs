//! Line-delimited JSON export.

use std::io::Write;

use serde::Serialize;

use super::{GraphStore, SnapshotVersion, StoreError};
use crate::graph::{Entity, Relationship};

#[derive(Serialize)]
struct Record<'a, T: Serialize> {
    record: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<SnapshotVersion>,
    #[serde(flatten)]
    value: &'a T,
}

/// Writes each batch as JSON lines tagged with `"record": "entity"` or
/// `"record": "relationship"`. Merging is left to whoever loads the file.
pub struct JsonlStore<W: Write> {
    writer: W,
}

impl<W: Write> JsonlStore<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_all<T: Serialize>(
        &mut self,
        record: &'static str,
        items: &[T],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError> {
        for value in items {
            serde_json::to_writer(
                &mut self.writer,
                &Record {
                    record,
                    snapshot,
                    value,
                },
            )?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(items.len())
    }
}

impl<W: Write> GraphStore for JsonlStore<W> {
    fn upsert_entities(
        &mut self,
        entities: &[Entity],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError> {
        self.write_all("entity", entities, snapshot)
    }

    fn upsert_relationships(
        &mut self,
        relationships: &[Relationship],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError> {
        self.write_all("relationship", relationships, snapshot)
    }
}
