// src/models/server.rs
use std::net::Ipv4Addr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::utils::unix_now;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServer {
    // Identity
    pub ip: Ipv4Addr,
    pub query_port: u16,
    pub game_port: u16,

    // Advertised attributes
    pub hostname: String,
    pub game_name: String,
    pub game_version: String,
    pub game_type: String,
    pub game_variant: String,
    pub map_name: String,
    pub num_players: u8,
    pub max_players: u8,
    pub time_limit: u16,
    pub round_time: u16,
    pub password: bool,
    pub dedicated: bool,
    pub ranked: bool,
    pub punkbuster: bool,
    pub os: String,
    pub pure_server: bool,
    pub bots: bool,
    pub voip: bool,
    pub autobalanced: bool,
    pub connection_type: String,
    pub local_ip: String,
    pub local_port: u16,
    pub natneg: bool,

    // Liveness
    pub last_refreshed: u64,
    pub is_validated: bool,
    pub database_id: i64,
}

impl GameServer {
    pub fn new(ip: Ipv4Addr, query_port: u16) -> Self {
        Self {
            ip,
            query_port,
            game_port: 0,
            hostname: String::new(),
            game_name: String::new(),
            game_version: String::new(),
            game_type: String::new(),
            game_variant: String::new(),
            map_name: String::new(),
            num_players: 0,
            max_players: 0,
            time_limit: 0,
            round_time: 0,
            password: false,
            dedicated: false,
            ranked: false,
            punkbuster: false,
            os: String::new(),
            pure_server: false,
            bots: false,
            voip: false,
            autobalanced: false,
            connection_type: String::new(),
            local_ip: String::new(),
            local_port: 0,
            natneg: false,
            last_refreshed: unix_now(),
            is_validated: false,
            database_id: 0,
        }
    }

    pub fn key(&self) -> (Ipv4Addr, u16) {
        (self.ip, self.query_port)
    }

    // Apply one key/value pair from a heartbeat report. Unknown keys are
    // logged and skipped, same as unexpected fields in any legacy report.
    pub fn apply_report(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "hostname" => self.hostname = value.to_string(),
            "gamename" => self.game_name = value.to_string(),
            "gamever" => self.game_version = value.to_string(),
            "gametype" => self.game_type = value.to_string(),
            "gamevariant" => self.game_variant = value.to_string(),
            "mapname" => self.map_name = value.to_string(),
            "numplayers" => self.num_players = value.parse().unwrap_or(0),
            "maxplayers" => self.max_players = value.parse().unwrap_or(0),
            "hostport" => self.game_port = value.parse().unwrap_or(0),
            "timelimit" => self.time_limit = value.parse().unwrap_or(0),
            "roundtime" => self.round_time = value.parse().unwrap_or(0),
            "password" => self.password = parse_flag(value),
            "connectiontype" => self.connection_type = value.to_string(),
            "bf2_dedicated" => self.dedicated = parse_flag(value),
            "bf2_ranked" => self.ranked = parse_flag(value),
            "bf2_anticheat" => self.punkbuster = parse_flag(value),
            "bf2_os" => self.os = value.to_string(),
            "bf2_pure" => self.pure_server = parse_flag(value),
            "bf2_bots" => self.bots = parse_flag(value),
            "bf2_voip" => self.voip = parse_flag(value),
            "bf2_autobalanced" => self.autobalanced = parse_flag(value),
            "localip0" => self.local_ip = value.to_string(),
            "localport" => self.local_port = value.parse().unwrap_or(0),
            "natneg" => self.natneg = parse_flag(value),
            "statechanged" => {} // lifecycle marker, handled by the listener
            other => debug!("Ignoring unknown heartbeat field {:?} = {:?}", other, value),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Flag(bool),
}

impl FieldValue {
    // Wire form: booleans are "1"/"0", integers decimal, strings verbatim.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Flag(true) => "1".to_string(),
            Self::Flag(false) => "0".to_string(),
        }
    }
}

pub struct FieldSpec {
    pub name: &'static str,
    pub filterable: bool,
    pub get: fn(&GameServer) -> FieldValue,
}

// The closed attribute namespace shared by the filter pipeline and the list
// encoder. Names are the lowercase wire spellings the game client sends.
pub static FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "hostname", filterable: true, get: |s| FieldValue::Text(s.hostname.clone()) },
    FieldSpec { name: "gamename", filterable: true, get: |s| FieldValue::Text(s.game_name.clone()) },
    FieldSpec { name: "gamever", filterable: true, get: |s| FieldValue::Text(s.game_version.clone()) },
    FieldSpec { name: "gametype", filterable: true, get: |s| FieldValue::Text(s.game_type.clone()) },
    FieldSpec { name: "gamevariant", filterable: true, get: |s| FieldValue::Text(s.game_variant.clone()) },
    FieldSpec { name: "mapname", filterable: true, get: |s| FieldValue::Text(s.map_name.clone()) },
    FieldSpec { name: "numplayers", filterable: true, get: |s| FieldValue::Int(s.num_players as i64) },
    FieldSpec { name: "maxplayers", filterable: true, get: |s| FieldValue::Int(s.max_players as i64) },
    FieldSpec { name: "hostport", filterable: true, get: |s| FieldValue::Int(s.game_port as i64) },
    FieldSpec { name: "timelimit", filterable: true, get: |s| FieldValue::Int(s.time_limit as i64) },
    FieldSpec { name: "roundtime", filterable: true, get: |s| FieldValue::Int(s.round_time as i64) },
    FieldSpec { name: "password", filterable: true, get: |s| FieldValue::Flag(s.password) },
    FieldSpec { name: "connectiontype", filterable: true, get: |s| FieldValue::Text(s.connection_type.clone()) },
    FieldSpec { name: "bf2_dedicated", filterable: true, get: |s| FieldValue::Flag(s.dedicated) },
    FieldSpec { name: "bf2_ranked", filterable: true, get: |s| FieldValue::Flag(s.ranked) },
    FieldSpec { name: "bf2_anticheat", filterable: true, get: |s| FieldValue::Flag(s.punkbuster) },
    FieldSpec { name: "bf2_os", filterable: true, get: |s| FieldValue::Text(s.os.clone()) },
    FieldSpec { name: "bf2_pure", filterable: true, get: |s| FieldValue::Flag(s.pure_server) },
    FieldSpec { name: "bf2_bots", filterable: true, get: |s| FieldValue::Flag(s.bots) },
    FieldSpec { name: "bf2_voip", filterable: true, get: |s| FieldValue::Flag(s.voip) },
    FieldSpec { name: "bf2_autobalanced", filterable: true, get: |s| FieldValue::Flag(s.autobalanced) },
    // Reflected back to clients on request, but never legal in a filter.
    FieldSpec { name: "localip0", filterable: false, get: |s| FieldValue::Text(s.local_ip.clone()) },
    FieldSpec { name: "localport", filterable: false, get: |s| FieldValue::Int(s.local_port as i64) },
    FieldSpec { name: "natneg", filterable: false, get: |s| FieldValue::Flag(s.natneg) },
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    let lower = name.to_ascii_lowercase();
    FIELDS.iter().find(|f| f.name == lower)
}

pub fn filterable_names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().filter(|f| f.filterable).map(|f| f.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> GameServer {
        let mut s = GameServer::new(Ipv4Addr::new(1, 2, 3, 4), 29900);
        s.hostname = "alpha".to_string();
        s.num_players = 8;
        s.ranked = true;
        s
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        assert!(field("HostName").is_some());
        assert!(field("NUMPLAYERS").is_some());
        assert!(field("no_such_field").is_none());
    }

    #[test]
    fn liveness_fields_are_not_in_the_schema() {
        assert!(field("databaseid").is_none());
        assert!(field("lastrefreshed").is_none());
        assert!(field("isvalidated").is_none());
    }

    #[test]
    fn local_fields_are_not_filterable() {
        assert!(!field("localip0").unwrap().filterable);
        assert!(!field("natneg").unwrap().filterable);
        assert!(field("hostname").unwrap().filterable);
    }

    #[test]
    fn values_render_in_wire_form() {
        let s = server();
        assert_eq!((field("hostname").unwrap().get)(&s).render(), "alpha");
        assert_eq!((field("numplayers").unwrap().get)(&s).render(), "8");
        assert_eq!((field("bf2_ranked").unwrap().get)(&s).render(), "1");
        assert_eq!((field("password").unwrap().get)(&s).render(), "0");
        // Absent string attributes render empty.
        assert_eq!((field("gametype").unwrap().get)(&s).render(), "");
    }

    #[test]
    fn apply_report_parses_typed_values() {
        let mut s = GameServer::new(Ipv4Addr::new(5, 6, 7, 8), 29900);
        s.apply_report("hostname", "beta");
        s.apply_report("numplayers", "12");
        s.apply_report("hostport", "16567");
        s.apply_report("bf2_ranked", "1");
        s.apply_report("password", "0");
        s.apply_report("mysterious", "whatever"); // ignored
        assert_eq!(s.hostname, "beta");
        assert_eq!(s.num_players, 12);
        assert_eq!(s.game_port, 16567);
        assert!(s.ranked);
        assert!(!s.password);
    }

    #[test]
    fn apply_report_tolerates_garbage_numbers() {
        let mut s = GameServer::new(Ipv4Addr::new(5, 6, 7, 8), 29900);
        s.apply_report("numplayers", "lots");
        assert_eq!(s.num_players, 0);
    }
}
