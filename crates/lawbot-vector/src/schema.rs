use arrow_array::types::Float32Type;
use arrow_array::{Array, ArrayRef, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray, TimestampMillisecondArray};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use lawbot_core::types::{Chunk, SectionKind, SourceType};
use lawbot_core::{Error, Result};

pub const DISTANCE_COLUMN: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("doc_path", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("section_kind", DataType::Utf8, false),
        Field::new("question_number", DataType::Int32, false),
        Field::new("source_type", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("total_chunks", DataType::Int32, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

// Simple key/value meta table, one per collection
pub fn build_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

fn to_i32(n: usize, what: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::Storage(format!("{what} {n} does not fit the schema")))
}

pub fn chunks_to_record_batch(chunks: &[Chunk], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
    if chunks.len() != vectors.len() {
        return Err(Error::Storage(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::Storage(format!("vector of length {} in a collection of dimension {dim}", v.len())));
    }
    let dim = to_i32(dim, "dimension")?;
    let mut question_numbers = Vec::with_capacity(chunks.len());
    let mut chunk_indices = Vec::with_capacity(chunks.len());
    let mut totals = Vec::with_capacity(chunks.len());
    for c in chunks {
        question_numbers.push(to_i32(c.question_number, "question number")?);
        chunk_indices.push(to_i32(c.chunk_index, "chunk index")?);
        totals.push(to_i32(c.total_chunks, "chunk total")?);
    }
    let strings = |f: fn(&Chunk) -> &str| -> ArrayRef { Arc::new(StringArray::from_iter_values(chunks.iter().map(f))) };
    let vectors = vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));

    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            strings(|c| &c.id),
            strings(|c| &c.doc_id),
            strings(|c| &c.doc_path),
            strings(|c| &c.title),
            strings(|c| c.section_kind.as_str()),
            Arc::new(Int32Array::from(question_numbers)),
            strings(|c| c.source_type.as_str()),
            strings(|c| &c.content),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(totals)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )
    .map_err(Error::storage)
}

pub fn meta_record_batch(entries: &[(&str, String)], now_millis: i64) -> Result<RecordBatch> {
    RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|(k, _)| *k))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|(_, v)| v.as_str()))),
            Arc::new(TimestampMillisecondArray::from(vec![now_millis; entries.len()])),
        ],
    )
    .map_err(Error::storage)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Storage(format!("column '{name}' missing or of unexpected type")))
}

/// Chunks of a batch, with the search distance when the batch has one.
pub fn record_batch_to_chunks(batch: &RecordBatch) -> Result<Vec<(Chunk, Option<f32>)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let doc_paths = column::<StringArray>(batch, "doc_path")?;
    let titles = column::<StringArray>(batch, "title")?;
    let kinds = column::<StringArray>(batch, "section_kind")?;
    let questions = column::<Int32Array>(batch, "question_number")?;
    let sources = column::<StringArray>(batch, "source_type")?;
    let contents = column::<StringArray>(batch, "content")?;
    let indices = column::<Int32Array>(batch, "chunk_index")?;
    let totals = column::<Int32Array>(batch, "total_chunks")?;
    let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    (0..batch.num_rows())
        .map(|i| {
            let section_kind = SectionKind::parse(kinds.value(i))
                .ok_or_else(|| Error::Storage(format!("unknown section kind '{}'", kinds.value(i))))?;
            let source_type = SourceType::parse(sources.value(i))
                .ok_or_else(|| Error::Storage(format!("unknown source type '{}'", sources.value(i))))?;
            let chunk = Chunk {
                id: ids.value(i).to_string(),
                doc_id: doc_ids.value(i).to_string(),
                doc_path: doc_paths.value(i).to_string(),
                title: titles.value(i).to_string(),
                section_kind,
                question_number: usize::try_from(questions.value(i)).unwrap_or_default(),
                source_type,
                content: contents.value(i).to_string(),
                chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
                total_chunks: usize::try_from(totals.value(i)).unwrap_or_default(),
            };
            Ok((chunk, distances.map(|d| d.value(i))))
        })
        .collect()
}

/// Key/value pairs of a meta table batch.
pub fn record_batch_to_entries(batch: &RecordBatch) -> Result<Vec<(String, String)>> {
    let keys = column::<StringArray>(batch, "key")?;
    let values = column::<StringArray>(batch, "value")?;
    Ok((0..batch.num_rows()).map(|i| (keys.value(i).to_string(), values.value(i).to_string())).collect())
}
