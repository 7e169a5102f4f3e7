//! The zdx index file header: every index file opens with a fixed record
//! naming the format version, the field an inner B-tree layer's child
//! pointer is stored under, the byte offset where the index proper
//! begins, and the record type of the keys the index is built over.
//! Grounded on `original_source/zdx/header.go`.

use zq_core::{primitive, Column, Context, Primitive, Type, Value};

use crate::error::{ArchiveError, Result};

pub const MAGIC_NAME: &str = "magic";
pub const VERSION_NAME: &str = "version";
pub const CHILD_FIELD_NAME: &str = "child_field";
pub const INDEX_OFFSET_NAME: &str = "index_offset";
pub const KEYS_NAME: &str = "keys";

pub const MAGIC_VAL: &str = "zdx";
pub const VERSION_VAL: &str = "0.2";
pub const CHILD_FIELD_VAL: &str = "_btree_child";

fn access_string(rec: &Value, name: &str) -> Option<String> {
    let v = rec.field_by_path(&[name])?;
    primitive::decode_string(v.bytes_or_empty()).ok()
}

/// Builds the header record type and an initial header value for an index
/// whose keys have type `keys_ty`. The field reserved for the B-tree child
/// pointer is renamed (`_btree_child_0`, `_btree_child_1`, ...) if the key
/// record already uses it, so the child pointer never collides with a key
/// column. `index_offset` starts at zero, written as a fixed 16-digit hex
/// string so the header can be rewritten in place once the true offset is
/// known, without perturbing the rest of the file.
pub fn new_header(ctx: &Context, keys_ty: Type) -> Result<Value> {
    let rec = keys_ty
        .as_record()
        .ok_or_else(|| ArchiveError::Other("index keys type must be a record".into()))?;

    let mut child_field = CHILD_FIELD_VAL.to_string();
    let mut k = 0;
    while rec.columns.iter().any(|c| c.name == child_field) {
        child_field = format!("{CHILD_FIELD_VAL}_{k}");
        k += 1;
    }

    let string_ty = ctx.primitive(Primitive::String);
    let columns = vec![
        Column { name: MAGIC_NAME.into(), ty: string_ty.clone() },
        Column { name: VERSION_NAME.into(), ty: string_ty.clone() },
        Column { name: CHILD_FIELD_NAME.into(), ty: string_ty.clone() },
        Column { name: INDEX_OFFSET_NAME.into(), ty: string_ty.clone() },
        Column { name: KEYS_NAME.into(), ty: keys_ty.clone() },
    ];
    let header_ty = ctx.lookup_type_record(columns)?;

    let fields = vec![
        Value::parse(&string_ty, MAGIC_VAL)?,
        Value::parse(&string_ty, VERSION_VAL)?,
        Value::parse(&string_ty, &child_field)?,
        Value::parse(&string_ty, &format!("{:016x}", 0))?,
        Value::unset(keys_ty),
    ];
    Value::build_record(header_ty, &fields)
}

/// Rewrites a header's `index_offset` field in place, keeping every other
/// field (and therefore the record's encoded length) unchanged.
pub fn with_index_offset(ctx: &Context, header: &Value, offset: u64) -> Result<Value> {
    let mut fields = header.record_fields()?;
    let string_ty = ctx.primitive(Primitive::String);
    for (name, v) in fields.iter_mut() {
        if name == INDEX_OFFSET_NAME {
            *v = Value::parse(&string_ty, &format!("{offset:016x}"))?;
        }
    }
    let rec_ty = header.ty.clone().ok_or_else(|| ArchiveError::Other("nil header".into()))?;
    let values: Vec<Value> = fields.into_iter().map(|(_, v)| v).collect();
    Ok(Value::build_record(rec_ty, &values)?)
}

/// Validates that `rec` is a zdx header and returns the B-tree child field
/// name and the record type of its keys.
pub fn parse_header(rec: &Value) -> Result<(String, Type)> {
    let magic = access_string(rec, MAGIC_NAME).ok_or(ArchiveError::NotAnIndex)?;
    if magic != MAGIC_VAL {
        return Err(ArchiveError::NotAnIndex);
    }
    let child_field = access_string(rec, CHILD_FIELD_NAME).ok_or(ArchiveError::NotAnIndex)?;
    let keys = rec.field_by_path(&[KEYS_NAME]).ok_or(ArchiveError::NotAnIndex)?;
    let keys_ty = keys.ty.ok_or(ArchiveError::NotAnIndex)?;
    if keys_ty.as_record().is_none() {
        return Err(ArchiveError::NotAnIndex);
    }
    Ok((child_field, keys_ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::Primitive;

    #[test]
    fn round_trips_a_plain_key_record() {
        let ctx = Context::new();
        let keys_ty = ctx
            .lookup_type_record(vec![Column { name: "k".into(), ty: ctx.primitive(Primitive::Int64) }])
            .unwrap();
        let header = new_header(&ctx, keys_ty.clone()).unwrap();
        let (child_field, parsed_keys_ty) = parse_header(&header).unwrap();
        assert_eq!(child_field, CHILD_FIELD_VAL);
        assert_eq!(parsed_keys_ty, keys_ty);
    }

    #[test]
    fn child_field_is_renamed_when_it_collides_with_a_key() {
        let ctx = Context::new();
        let keys_ty = ctx
            .lookup_type_record(vec![Column { name: CHILD_FIELD_VAL.into(), ty: ctx.primitive(Primitive::Int64) }])
            .unwrap();
        let header = new_header(&ctx, keys_ty).unwrap();
        let (child_field, _) = parse_header(&header).unwrap();
        assert_eq!(child_field, format!("{CHILD_FIELD_VAL}_0"));
    }

    #[test]
    fn index_offset_rewrite_preserves_other_fields() {
        let ctx = Context::new();
        let keys_ty = ctx
            .lookup_type_record(vec![Column { name: "k".into(), ty: ctx.primitive(Primitive::Int64) }])
            .unwrap();
        let header = new_header(&ctx, keys_ty).unwrap();
        let updated = with_index_offset(&ctx, &header, 4096).unwrap();
        assert_eq!(access_string(&updated, INDEX_OFFSET_NAME).unwrap(), format!("{:016x}", 4096));
        assert_eq!(access_string(&updated, MAGIC_NAME).unwrap(), MAGIC_VAL);
    }

    #[test]
    fn rejects_a_record_without_the_right_magic() {
        let ctx = Context::new();
        let ty = ctx
            .lookup_type_record(vec![Column { name: "x".into(), ty: ctx.primitive(Primitive::Int64) }])
            .unwrap();
        let rec = Value::build_record(ty.clone(), &[Value::parse(&ctx.primitive(Primitive::Int64), "1").unwrap()]).unwrap();
        assert!(matches!(parse_header(&rec), Err(ArchiveError::NotAnIndex)));
    }
}
