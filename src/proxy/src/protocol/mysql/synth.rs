//! C6: turns a [`ReplicaResult`] into the MySQL text-protocol result set a
//! real primary would have sent back for the same `COM_QUERY`.
use crate::protocol::mysql::basic::Column;
use crate::protocol::mysql::packet::packet_writer::PacketWriter;
use crate::protocol::mysql::packet::writers::{
    write_column_definitions, write_eof_packet, write_text_row,
};
use crate::replica::ReplicaResult;

use mysql_common::constants::{ColumnFlags, ColumnType, StatusFlags};
use tokio::io::AsyncWrite;

fn column_type_for(type_name: &str) -> ColumnType {
    match type_name {
        "TINYINT" => ColumnType::MYSQL_TYPE_TINY,
        "SMALLINT" => ColumnType::MYSQL_TYPE_SHORT,
        "INT" | "INT4" | "INTEGER" => ColumnType::MYSQL_TYPE_LONG,
        "BIGINT" | "INT8" => ColumnType::MYSQL_TYPE_LONGLONG,
        "FLOAT" | "FLOAT4" => ColumnType::MYSQL_TYPE_FLOAT,
        "DOUBLE" | "FLOAT8" => ColumnType::MYSQL_TYPE_DOUBLE,
        "DECIMAL" => ColumnType::MYSQL_TYPE_NEWDECIMAL,
        "DATE" => ColumnType::MYSQL_TYPE_DATE,
        "DATETIME" | "TIMESTAMP" => ColumnType::MYSQL_TYPE_DATETIME,
        "TIME" => ColumnType::MYSQL_TYPE_TIME,
        "BLOB" => ColumnType::MYSQL_TYPE_BLOB,
        _ => ColumnType::MYSQL_TYPE_VAR_STRING,
    }
}

/// Writes the full response to a routed SELECT: column definitions, each
/// row, and the terminating EOF — continuing the packet sequence from
/// whatever number the client's `COM_QUERY` left it on.
pub async fn write_result<W: AsyncWrite + Unpin>(
    w: &mut PacketWriter<W>,
    next_seq: u8,
    result: &ReplicaResult,
) -> std::io::Result<()> {
    w.set_seq(next_seq);

    let columns: Vec<Column> = result
        .columns
        .iter()
        .map(|c| Column {
            table: String::new(),
            column: c.name.clone(),
            column_type: column_type_for(&c.type_name),
            column_flags: ColumnFlags::empty(),
        })
        .collect();

    write_column_definitions(&columns, w).await?;

    for row in &result.rows {
        write_text_row(w, row).await?;
    }

    write_eof_packet(w, StatusFlags::SERVER_STATUS_AUTOCOMMIT).await?;
    w.flush_all().await
}
