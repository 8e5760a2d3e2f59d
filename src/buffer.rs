use mongodb::bson::Bson;
use polars::prelude::*;

use crate::conversion::bson_number;

/// Target dtype for one projected listing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Utf8,
    Int64,
    Float64,
}

/// Per-column builder filled while walking a cursor of listing documents.
/// Values that do not coerce to the column's dtype become nulls, matching
/// how the source dataset mixes numeric strings into numeric columns.
pub(crate) enum Buffer {
    Utf8(Utf8ChunkedBuilder),
    Int64(PrimitiveChunkedBuilder<Int64Type>),
    Float64(PrimitiveChunkedBuilder<Float64Type>),
}

pub(crate) fn init_buffers(fields: &[(&str, FieldKind)], capacity: usize) -> Vec<(String, Buffer)> {
    fields
        .iter()
        .map(|(name, kind)| {
            let buffer = match kind {
                FieldKind::Utf8 => {
                    Buffer::Utf8(Utf8ChunkedBuilder::new(name, capacity, capacity * 16))
                }
                FieldKind::Int64 => Buffer::Int64(PrimitiveChunkedBuilder::new(name, capacity)),
                FieldKind::Float64 => {
                    Buffer::Float64(PrimitiveChunkedBuilder::new(name, capacity))
                }
            };
            ((*name).to_string(), buffer)
        })
        .collect()
}

impl Buffer {
    pub(crate) fn add(&mut self, value: &Bson) {
        match self {
            Buffer::Utf8(buf) => match value {
                Bson::String(s) if !s.is_empty() => buf.append_value(s),
                Bson::Int32(v) => buf.append_value(v.to_string()),
                Bson::Int64(v) => buf.append_value(v.to_string()),
                Bson::Double(v) => buf.append_value(v.to_string()),
                _ => buf.append_null(),
            },
            Buffer::Int64(buf) => buf.append_option(bson_number::<i64>(value)),
            Buffer::Float64(buf) => buf.append_option(bson_number::<f64>(value)),
        }
    }

    pub(crate) fn add_null(&mut self) {
        match self {
            Buffer::Utf8(buf) => buf.append_null(),
            Buffer::Int64(buf) => buf.append_null(),
            Buffer::Float64(buf) => buf.append_null(),
        }
    }

    pub(crate) fn into_series(self) -> Series {
        match self {
            Buffer::Utf8(buf) => buf.finish().into_series(),
            Buffer::Int64(buf) => buf.finish().into_series(),
            Buffer::Float64(buf) => buf.finish().into_series(),
        }
    }
}
