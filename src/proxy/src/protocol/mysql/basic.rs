//! Small value types used when synthesizing a MySQL result set.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// This column's associated table. The proxy never learns a real table
    /// name for a synthesized column, so this is always empty.
    pub table: String,
    /// This column's name, as reported by the replica driver.
    pub column: String,
    pub column_type: mysql_common::constants::ColumnType,
    pub column_flags: mysql_common::constants::ColumnFlags,
}
