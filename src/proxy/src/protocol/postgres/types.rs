//! Fixed database-type-name → (OID, typlen) lookup used to fill in a
//! `RowDescription`'s per-field type info for a synthesized result set.
//! Any type name not in the table falls back to `BYTEA` (17, -1), the
//! same default the proxy this replaces used for anything it didn't
//! recognize.

/// `(type_oid, type_len)`. `-1` means variable-length, matching Postgres's
/// own convention for `pg_type.typlen`.
pub fn lookup(type_name: &str) -> (u32, i16) {
    match type_name.to_uppercase().as_str() {
        "BOOL" => (16, 1),
        "BYTEA" => (17, -1),
        "CHAR" => (18, 1),
        "INT8" | "BIGINT" => (20, 8),
        "INT2" | "SMALLINT" => (21, 2),
        "INT4" | "INT" | "INTEGER" => (23, 4),
        "REGPROC" => (24, 4),
        "_ACLITEM" | "NAME" | "TEXT" | "VARCHAR" | "CHARACTER VARYING" => (25, -1),
        "OID" => (26, 4),
        "TID" => (27, 6),
        "XID" => (28, 4),
        "CID" => (29, 4),
        "JSON" => (114, -1),
        "XML" => (142, -1),
        "POINT" => (600, 16),
        "FLOAT4" | "REAL" => (700, 4),
        "FLOAT8" | "DOUBLE PRECISION" => (701, 8),
        _ => (17, -1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_resolve_to_their_documented_oid() {
        assert_eq!(lookup("int4"), (23, 4));
        assert_eq!(lookup("VARCHAR"), (25, -1));
        assert_eq!(lookup("float8"), (701, 8));
    }

    #[test]
    fn unknown_type_falls_back_to_bytea() {
        assert_eq!(lookup("some_enum_type"), (17, -1));
    }

    #[test]
    fn aclitem_array_type_name_resolves_correctly() {
        assert_eq!(lookup("_aclitem"), (25, -1));
    }
}
