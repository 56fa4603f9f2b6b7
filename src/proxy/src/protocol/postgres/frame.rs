//! C5: pulls the SQL text out of a Postgres simple-query ('Q') message.
//!
//! Like its MySQL counterpart, this looks only at the bytes one `read()`
//! call returned. A `Query` message is framed as a `'Q'` tag, a 4-byte
//! big-endian length, and a NUL-terminated string — the proxy trusts
//! that single read to contain the whole message.

const QUERY_TAG: u8 = b'Q';
const HEADER_LEN: usize = 5; // tag byte + 4-byte length

pub fn extract_query(buffer: &[u8], n: usize) -> Option<&str> {
    if n < HEADER_LEN || buffer[0] != QUERY_TAG {
        return None;
    }
    let body = &buffer[HEADER_LEN..n];
    let body = match body.last() {
        Some(0) => &body[..body.len() - 1],
        _ => body,
    };
    std::str::from_utf8(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_message(sql: &str) -> Vec<u8> {
        let mut buf = vec![b'Q', 0, 0, 0, 0];
        buf.extend_from_slice(sql.as_bytes());
        buf.push(0);
        buf
    }

    #[test]
    fn extracts_sql_and_drops_trailing_nul() {
        let buf = query_message("select 1");
        let n = buf.len();
        assert_eq!(extract_query(&buf, n), Some("select 1"));
    }

    #[test]
    fn rejects_non_query_tag() {
        let mut buf = query_message("select 1");
        buf[0] = b'P'; // Parse
        let n = buf.len();
        assert_eq!(extract_query(&buf, n), None);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(extract_query(&[b'Q', 0, 0], 3), None);
    }
}
