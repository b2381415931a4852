//! Conversion between PostgreSQL wire values and [`SqlValue`].
//!
//! Reads always use the binary result format, so [`SqlValue::Opaque`] holds
//! binary-encoded bytes and can be written back to a column of the same type.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use uuid::Uuid;

use crate::core::{Row, SqlValue};
use crate::error::Result;

type BoxError = Box<dyn Error + Sync + Send>;

/// Borrowed wire bytes of a value of any type.
struct RawBytes<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawBytes<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawBytes(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode every field of a result row.
pub(crate) fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let raw: Option<RawBytes<'_>> = row.try_get(idx)?;
        values.push(decode_field(column.type_(), raw.map(|r| r.0)));
    }
    Ok(values)
}

/// Decode one binary-format field. Anything without an exact typed
/// counterpart, or that fails to parse, keeps its wire bytes.
pub(crate) fn decode_field(ty: &Type, raw: Option<&[u8]>) -> SqlValue {
    let Some(raw) = raw else {
        return SqlValue::Null;
    };

    let typed = match *ty {
        Type::BOOL => decode::<bool>(ty, raw),
        Type::INT2 => decode::<i16>(ty, raw),
        Type::INT4 => decode::<i32>(ty, raw),
        Type::INT8 => decode::<i64>(ty, raw),
        Type::FLOAT4 => decode::<f32>(ty, raw),
        Type::FLOAT8 => decode::<f64>(ty, raw),
        Type::BYTEA => decode::<Vec<u8>>(ty, raw),
        Type::UUID => decode::<Uuid>(ty, raw),
        // 'infinity' has no chrono counterpart and falls through to bytes
        Type::TIMESTAMP => decode::<NaiveDateTime>(ty, raw),
        Type::TIMESTAMPTZ => decode::<DateTime<FixedOffset>>(ty, raw),
        Type::DATE => decode::<NaiveDate>(ty, raw),
        Type::TIME => decode::<NaiveTime>(ty, raw),
        // Exact digits and document text, key order and duplicates included
        Type::NUMERIC | Type::JSON | Type::JSONB => None,
        _ if <String as FromSql<'_>>::accepts(ty) => decode::<String>(ty, raw),
        _ => None,
    };

    typed.unwrap_or_else(|| SqlValue::Opaque(raw.to_vec()))
}

fn decode<'a, T>(ty: &Type, raw: &'a [u8]) -> Option<SqlValue>
where
    T: FromSql<'a> + Into<SqlValue>,
{
    T::from_sql(ty, raw).ok().map(Into::into)
}

/// Encode `v` only if its Rust type is valid for the target column.
fn encode<T: ToSql>(
    kind: &str,
    v: &T,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(format!("cannot bind {kind} value to a column of type {ty}").into());
    }
    v.to_sql(ty, out)
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        let kind = self.kind();
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => encode(kind, v, ty, out),
            SqlValue::I16(v) => encode(kind, v, ty, out),
            SqlValue::I32(v) => encode(kind, v, ty, out),
            SqlValue::I64(v) => encode(kind, v, ty, out),
            SqlValue::F32(v) => encode(kind, v, ty, out),
            SqlValue::F64(v) => encode(kind, v, ty, out),
            SqlValue::Text(v) => encode(kind, v, ty, out),
            SqlValue::Bytes(v) => encode(kind, v, ty, out),
            SqlValue::Uuid(v) => encode(kind, v, ty, out),
            SqlValue::DateTime(v) => encode(kind, v, ty, out),
            SqlValue::DateTimeOffset(v) => encode(kind, v, ty, out),
            SqlValue::Date(v) => encode(kind, v, ty, out),
            SqlValue::Time(v) => encode(kind, v, ty, out),
            SqlValue::Opaque(bytes) => {
                out.extend_from_slice(bytes);
                Ok(IsNull::No)
            }
        }
    }

    // Per-variant checks happen in `to_sql`
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
