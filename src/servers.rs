use std::env;
use std::fmt;

pub const WHOIS_PORT: u16 = 43;

pub const RIPE_WHOIS_SERVER: &str = "whois.ripe.net";
pub const ARIN_WHOIS_SERVER: &str = "whois.arin.net";
pub const LACNIC_WHOIS_SERVER: &str = "whois.lacnic.net";
pub const APNIC_WHOIS_SERVER: &str = "whois.apnic.net";
pub const AFRINIC_WHOIS_SERVER: &str = "whois.afrinic.net";

/// Environment variable holding a comma separated list of servers to query
pub const SERVERS_ENV: &str = "WHOIS_SERVERS";

/// The five Regional Internet Registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rir {
    Ripe,
    Arin,
    Lacnic,
    Apnic,
    Afrinic,
}

impl Rir {
    /// Every RIR, in the order they are queried on a full fan-out
    pub const ALL: [Rir; 5] = [Rir::Ripe, Rir::Arin, Rir::Lacnic, Rir::Apnic, Rir::Afrinic];

    /// Canonical lowercase identifier
    pub fn ident(self) -> &'static str {
        match self {
            Rir::Ripe => "ripe",
            Rir::Arin => "arin",
            Rir::Lacnic => "lacnic",
            Rir::Apnic => "apnic",
            Rir::Afrinic => "afrinic",
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            Rir::Ripe => RIPE_WHOIS_SERVER,
            Rir::Arin => ARIN_WHOIS_SERVER,
            Rir::Lacnic => LACNIC_WHOIS_SERVER,
            Rir::Apnic => APNIC_WHOIS_SERVER,
            Rir::Afrinic => AFRINIC_WHOIS_SERVER,
        }
    }

    pub fn from_ident(ident: &str) -> Option<Rir> {
        Rir::ALL
            .into_iter()
            .find(|rir| rir.ident().eq_ignore_ascii_case(ident.trim()))
    }

    /// Find the RIR whose hostname appears in `server`
    pub fn from_server(server: &str) -> Option<Rir> {
        let server = server.to_lowercase();
        Rir::ALL.into_iter().find(|rir| server.contains(rir.host()))
    }

    /// Hostnames of every RIR
    pub fn all_hosts() -> Vec<String> {
        Rir::ALL.iter().map(|rir| rir.host().to_string()).collect()
    }
}

impl fmt::Display for Rir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

/// Build the `host:port` address for a server name, keeping an explicit port if present
pub fn server_address(server: &str) -> String {
    if server.parse::<std::net::Ipv6Addr>().is_ok() {
        return format!("[{}]:{}", server, WHOIS_PORT);
    }
    if server.rsplit_once(':').is_some_and(|(host, port)| {
        !host.contains(':') && port.parse::<u16>().is_ok()
    }) {
        server.to_string()
    } else {
        format!("{}:{}", server, WHOIS_PORT)
    }
}

/// Get the server list from the environment if available
pub fn servers_from_env() -> Option<Vec<String>> {
    let value = env::var(SERVERS_ENV).ok()?;
    let servers = parse_server_list(&value);
    if servers.is_empty() {
        None
    } else {
        Some(servers)
    }
}

fn parse_server_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
