// src/protocol/list.rs
//
// Serialises a filtered snapshot into the legacy server-list blob:
//
//   client ip (4) | 0x1964 (2) | field count (1) | 0x00
//   per field: name, NUL, NUL
//   per server: 0x51 | ip (4) | query port (2) | 0xFF | values ("\0\xFF" between) | 0x00
//   terminator: 0x00 0xFF 0xFF 0xFF 0xFF

use std::net::Ipv4Addr;

use crate::models::server::{self, GameServer};
use crate::utils::MasterError;

use super::DEFAULT_QUERY_PORT;

pub const RECORD_MARKER: u8 = 0x51;
pub const TERMINATOR: [u8; 5] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF];

pub fn encode_server_list(
    client_ip: Ipv4Addr,
    fields: &[String],
    servers: &[&GameServer],
) -> Result<Vec<u8>, MasterError> {
    if fields.len() > u8::MAX as usize {
        return Err(MasterError::Encoding(format!(
            "{} requested fields do not fit the header",
            fields.len()
        )));
    }

    let mut out = Vec::with_capacity(64 + servers.len() * 64);
    out.extend_from_slice(&client_ip.octets());
    out.extend_from_slice(&DEFAULT_QUERY_PORT.to_be_bytes());
    out.push(fields.len() as u8);
    out.push(0x00);

    for name in fields {
        out.extend_from_slice(name.as_bytes());
        out.push(0x00);
        out.push(0x00);
    }

    for srv in servers {
        out.push(RECORD_MARKER);
        out.extend_from_slice(&srv.ip.octets());
        out.extend_from_slice(&srv.query_port.to_be_bytes());
        out.push(0xFF);
        for (i, name) in fields.iter().enumerate() {
            // Names outside the schema are still reflected back, as empty.
            let value = match server::field(name) {
                Some(spec) => (spec.get)(srv).render(),
                None => String::new(),
            };
            out.extend_from_slice(value.as_bytes());
            if i + 1 < fields.len() {
                out.push(0x00);
                out.push(0xFF);
            }
        }
        out.push(0x00);
    }

    out.extend_from_slice(&TERMINATOR);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn alpha() -> GameServer {
        let mut s = GameServer::new(Ipv4Addr::new(1, 2, 3, 4), 16567);
        s.hostname = "alpha".to_string();
        s.num_players = 8;
        s
    }

    fn beta() -> GameServer {
        let mut s = GameServer::new(Ipv4Addr::new(5, 6, 7, 8), 16567);
        s.hostname = "beta".to_string();
        s.num_players = 12;
        s
    }

    // Test-side header reader, also exercised as the field-list round trip.
    fn read_header(blob: &[u8]) -> (Ipv4Addr, u16, Vec<String>, usize) {
        let ip = Ipv4Addr::new(blob[0], blob[1], blob[2], blob[3]);
        let port = u16::from_be_bytes([blob[4], blob[5]]);
        let count = blob[6] as usize;
        assert_eq!(blob[7], 0x00);
        let mut names = Vec::with_capacity(count);
        let mut pos = 8;
        for _ in 0..count {
            let end = pos + blob[pos..].iter().position(|&b| b == 0).unwrap();
            names.push(String::from_utf8(blob[pos..end].to_vec()).unwrap());
            assert_eq!(blob[end + 1], 0x00, "field name must end in two NULs");
            pos = end + 2;
        }
        (ip, port, names, pos)
    }

    #[test]
    fn two_servers_encode_in_snapshot_order() {
        let (a, b) = (alpha(), beta());
        let client = Ipv4Addr::new(9, 9, 9, 9);
        let blob =
            encode_server_list(client, &fields(&["hostname", "numplayers"]), &[&a, &b]).unwrap();

        let (ip, port, names, body) = read_header(&blob);
        assert_eq!(ip, client);
        assert_eq!(port, 0x1964);
        assert_eq!(names, vec!["hostname", "numplayers"]);

        // First record: marker, ip, port, field run.
        let rec = &blob[body..];
        assert_eq!(rec[0], RECORD_MARKER);
        assert_eq!(&rec[1..5], &[1, 2, 3, 4]);
        assert_eq!(u16::from_be_bytes([rec[5], rec[6]]), 16567);
        assert_eq!(rec[7], 0xFF);
        assert_eq!(&rec[8..13], b"alpha");
        assert_eq!(&rec[13..15], &[0x00, 0xFF]);
        assert_eq!(rec[15], b'8');
        assert_eq!(rec[16], 0x00);

        // Second record follows immediately, then the terminator.
        assert_eq!(rec[17], RECORD_MARKER);
        let beta_pos = blob.windows(4).position(|w| w == &b"beta"[..]);
        assert!(beta_pos.is_some());
        assert!(blob.ends_with(&TERMINATOR));
    }

    #[test]
    fn header_round_trips_any_field_list() {
        let lists = [
            fields(&["hostname"]),
            fields(&["hostname", "gametype", "mapname", "numplayers", "maxplayers"]),
            fields(&[]),
        ];
        for list in lists {
            let blob = encode_server_list(Ipv4Addr::LOCALHOST, &list, &[]).unwrap();
            let (_, _, names, body) = read_header(&blob);
            assert_eq!(names, list);
            assert_eq!(&blob[body..], &TERMINATOR);
        }
    }

    #[test]
    fn unknown_fields_reflect_back_empty() {
        let a = alpha();
        let blob = encode_server_list(
            Ipv4Addr::LOCALHOST,
            &fields(&["hostname", "no_such_field"]),
            &[&a],
        )
        .unwrap();
        let (_, _, _, body) = read_header(&blob);
        let rec = &blob[body..];
        // value run: "alpha" NUL 0xFF "" NUL
        assert_eq!(&rec[8..13], b"alpha");
        assert_eq!(&rec[13..15], &[0x00, 0xFF]);
        assert_eq!(rec[15], 0x00, "unknown field renders as the empty string");
    }

    #[test]
    fn encoding_is_deterministic() {
        let (a, b) = (alpha(), beta());
        let f = fields(&["hostname", "numplayers"]);
        let one = encode_server_list(Ipv4Addr::LOCALHOST, &f, &[&a, &b]).unwrap();
        let two = encode_server_list(Ipv4Addr::LOCALHOST, &f, &[&a, &b]).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn oversized_field_list_is_an_encoding_error() {
        let many: Vec<String> = (0..300).map(|i| format!("f{}", i)).collect();
        assert!(matches!(
            encode_server_list(Ipv4Addr::LOCALHOST, &many, &[]),
            Err(MasterError::Encoding(_))
        ));
    }

    #[test]
    fn empty_snapshot_is_header_plus_terminator() {
        let blob = encode_server_list(Ipv4Addr::LOCALHOST, &fields(&["hostname"]), &[]).unwrap();
        assert_eq!(blob[6], 1);
        assert!(blob.ends_with(&TERMINATOR));
        assert_eq!(blob.len(), 8 + "hostname".len() + 2 + TERMINATOR.len());
    }
}
