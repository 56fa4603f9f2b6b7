//! C7: writes `RowDescription` / `DataRow` / `CommandComplete` /
//! `ReadyForQuery` for a routed SELECT's result, the same sequence a real
//! primary sends back for a simple-query SELECT.
use super::types::lookup;
use crate::replica::ReplicaResult;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

fn put_message(buf: &mut BytesMut, tag: u8, body: impl FnOnce(&mut BytesMut)) {
    buf.put_u8(tag);
    let len_pos = buf.len();
    buf.put_i32(0); // placeholder, patched below
    body(buf);
    let len = (buf.len() - len_pos) as i32;
    buf[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
}

fn put_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

fn row_description(buf: &mut BytesMut, result: &ReplicaResult) {
    put_message(buf, b'T', |buf| {
        buf.put_i16(result.columns.len() as i16);
        for col in &result.columns {
            let (oid, len) = lookup(&col.type_name);
            put_cstr(buf, &col.name);
            buf.put_i32(0); // table OID: unknown for a synthesized column
            buf.put_i16(0); // column attribute number: unknown
            buf.put_i32(oid as i32);
            buf.put_i16(len);
            buf.put_i32(-1); // type modifier: unknown
            buf.put_i16(0); // format code: text
        }
    });
}

fn data_row(buf: &mut BytesMut, row: &[Option<Vec<u8>>]) {
    put_message(buf, b'D', |buf| {
        buf.put_i16(row.len() as i16);
        for value in row {
            match value {
                Some(bytes) => {
                    buf.put_i32(bytes.len() as i32);
                    buf.put_slice(bytes);
                }
                None => buf.put_i32(-1),
            }
        }
    });
}

fn command_complete(buf: &mut BytesMut, row_count: usize) {
    put_message(buf, b'C', |buf| {
        put_cstr(buf, &format!("SELECT {row_count}"));
    });
}

fn ready_for_query(buf: &mut BytesMut) {
    put_message(buf, b'Z', |buf| {
        buf.put_u8(b'I'); // idle, outside any transaction
    });
}

pub async fn write_result<W: AsyncWrite + Unpin>(
    w: &mut W,
    result: &ReplicaResult,
) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    row_description(&mut buf, result);
    for row in &result.rows {
        data_row(&mut buf, row);
    }
    command_complete(&mut buf, result.rows.len());
    ready_for_query(&mut buf);
    w.write_all(&buf).await?;
    w.flush().await
}
