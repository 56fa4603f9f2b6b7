//! C4: splits a single read off the client socket into a routable SQL
//! statement, or reports that the buffer should be forwarded to the
//! primary untouched.
//!
//! This inspects exactly the bytes handed to it by one `read()` call. It
//! does not accumulate across reads or handle a COM_QUERY payload that
//! spans more than one packet — the proxy only ever sees the first packet
//! of a client round-trip, which in practice is always a single `Query`
//! since read/write-split traffic doesn't multiplex commands.

use crate::protocol::mysql::constants::CommandCode;

/// Four-byte packet header plus the one command byte; anything shorter
/// can't be a COM_QUERY.
const MIN_QUERY_LEN: usize = 5;

/// Pulls the SQL text out of a COM_QUERY packet, if `buffer[..n]` is one.
///
/// Returns `None` when the buffer is too short to carry a command byte or
/// the command isn't `COM_QUERY` — in both cases the caller forwards the
/// bytes to the primary unexamined.
pub fn extract_query(buffer: &[u8], n: usize) -> Option<&str> {
    if n <= MIN_QUERY_LEN || buffer[4] != CommandCode::ComQuery as u8 {
        return None;
    }
    std::str::from_utf8(&buffer[5..n]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn com_query(sql: &str) -> Vec<u8> {
        let mut buf = vec![0u8, 0, 0, 0, CommandCode::ComQuery as u8];
        buf.extend_from_slice(sql.as_bytes());
        buf
    }

    #[test]
    fn extracts_select_text() {
        let buf = com_query("SELECT 1");
        let n = buf.len();
        assert_eq!(extract_query(&buf, n), Some("SELECT 1"));
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8, 0, 0, 0, 0x03];
        assert_eq!(extract_query(&buf, 5), None);
    }

    #[test]
    fn rejects_non_query_command() {
        let buf = com_query("ignored");
        let mut buf = buf;
        buf[4] = 0x01; // COM_QUIT
        let n = buf.len();
        assert_eq!(extract_query(&buf, n), None);
    }
}
