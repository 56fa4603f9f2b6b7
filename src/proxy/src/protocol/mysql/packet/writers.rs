//! Packet writers used only by the response synthesizer (C6): a routed
//! SELECT's result set is written to the client socket as if the primary
//! had produced it. No auth, handshake, or prepared-statement packets are
//! written here — those paths never touch the proxy (§1 Non-goals).
use crate::protocol::mysql::basic::Column;
use crate::protocol::mysql::packet::packet_writer::PacketWriter;

use byteorder::{LittleEndian, WriteBytesExt};
use mysql_common::constants::StatusFlags;
use mysql_common::io::WriteMysqlExt;
use std::io::{self, Write};
use tokio::io::AsyncWrite;

pub async fn write_eof_packet<W: AsyncWrite + Unpin>(
    w: &mut PacketWriter<W>,
    s: StatusFlags,
) -> io::Result<()> {
    w.write_all(&[0xfe, 0x00, 0x00])?;
    w.write_u16::<LittleEndian>(s.bits())?;
    w.end_packet().await
}

/// Column-count packet followed by one column-definition packet per column
/// and the terminating EOF, i.e. everything that precedes the first row of
/// a text-protocol result set.
///
/// See: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query_response_text_resultset_column_definition.html
pub async fn write_column_definitions<'a, I, W>(
    columns: I,
    w: &mut PacketWriter<W>,
) -> io::Result<()>
where
    I: IntoIterator<Item = &'a Column>,
    <I as IntoIterator>::IntoIter: ExactSizeIterator,
    W: AsyncWrite + Unpin,
{
    let columns = columns.into_iter();
    w.write_lenenc_int(columns.len() as u64)?;
    w.end_packet().await?;

    for c in columns {
        w.write_lenenc_str(b"def")?;
        w.write_lenenc_str(b"")?;
        w.write_lenenc_str(c.table.as_bytes())?;
        w.write_lenenc_str(b"")?;
        w.write_lenenc_str(c.column.as_bytes())?;
        w.write_lenenc_str(b"")?;
        w.write_lenenc_int(0xC)?;
        w.write_u16::<LittleEndian>(33)?; // utf8_general_ci
        w.write_u32::<LittleEndian>(1024)?; // column length
        w.write_u8(c.column_type as u8)?;
        w.write_u16::<LittleEndian>(c.column_flags.bits())?;
        w.write_all(&[0x00])?; // decimals
        w.write_all(&[0x00, 0x00])?; // filler
        w.end_packet().await?;
    }

    write_eof_packet(w, StatusFlags::empty()).await
}

/// One text-protocol result row: each value is a length-encoded string,
/// with the NULL sentinel `0xFB` standing in for an absent value.
pub async fn write_text_row<W: AsyncWrite + Unpin>(
    w: &mut PacketWriter<W>,
    values: &[Option<Vec<u8>>],
) -> io::Result<()> {
    for value in values {
        match value {
            Some(bytes) => w.write_lenenc_str(bytes)?,
            None => w.write_u8(0xfb)?,
        };
    }
    w.end_packet().await
}
