use std::time::Duration;

use clap::{Parser, ValueEnum};
use ipnet::IpNet;

use crate::less_specific::{FieldPredicate, LessSpecificOptions};
use crate::prefix::parse_prefix;
use crate::query::{QueryOptions, ServerSelection};
use crate::record::FieldFilter;
use crate::servers::servers_from_env;
use crate::transport::default_flag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Talk to port 43 directly
    Tcp,
    /// Run the system whois client
    Command,
}

#[derive(Parser)]
#[command(
    author = "Pysio",
    version = env!("CARGO_PKG_VERSION"),
    about = "WHOIS lookups for IP prefixes and ASNs that follow RIR referrals and ARIN suballocations"
)]
pub struct Cli {
    /// Prefix, IP address, ASN, handle or name to query
    pub query: String,

    /// WHOIS server to query (repeatable; bypasses authority detection)
    #[arg(short, long = "server")]
    pub servers: Vec<String>,

    /// Query every RIR and tag the authoritative answer
    #[arg(long, conflicts_with = "servers")]
    pub all: bool,

    /// Only keep these fields (repeatable or comma separated, case-insensitive)
    #[arg(short, long = "field", value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Per-server timeout in milliseconds
    #[arg(short, long, default_value_t = 4000)]
    pub timeout: u64,

    /// Host flag passed to the whois client (command transport only)
    #[arg(long)]
    pub flag: Option<String>,

    /// How queries reach the servers
    #[arg(long, value_enum, default_value_t = TransportKind::Tcp)]
    pub transport: TransportKind,

    /// Resolve the most specific holder of an IP prefix, following ARIN suballocations
    #[arg(long)]
    pub prefix: bool,

    /// Widen the prefix until a record has this field (KEY or KEY=VALUE)
    #[arg(long, value_name = "KEY[=VALUE]")]
    pub less_specific: Option<FieldPredicate>,

    /// Shortest prefix length to widen to, for the query's address family (default /16 for IPv4, /32 for IPv6)
    #[arg(long, requires = "less_specific")]
    pub floor: Option<u8>,

    /// Print answers as JSON
    #[arg(long)]
    pub json: bool,

    /// Display verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Disable hyperlinks in terminal output (hyperlinks are enabled by default)
    #[arg(long, help = "Disable clickable hyperlinks for RIR database results")]
    pub no_hyperlinks: bool,
}

impl Cli {
    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && !self.json
    }

    /// Check if hyperlinks should be used
    pub fn use_hyperlinks(&self) -> bool {
        !self.no_hyperlinks && !self.json
    }

    /// Explicit servers win over the environment; nothing at all means authority detection
    pub fn server_selection(&self) -> ServerSelection {
        if self.all {
            ServerSelection::AllRirs
        } else if !self.servers.is_empty() {
            ServerSelection::Explicit(self.servers.clone())
        } else if let Some(servers) = servers_from_env() {
            ServerSelection::Explicit(servers)
        } else {
            ServerSelection::Auto
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .with_fields(FieldFilter::new(&self.fields))
            .with_flag(self.flag.clone().unwrap_or_else(|| default_flag().to_string()))
            .with_timeout(Duration::from_millis(self.timeout))
            .with_servers(self.server_selection())
    }

    /// `--floor` only overrides the floor of the query's own address family
    pub fn less_specific_options(&self) -> LessSpecificOptions {
        let mut options = LessSpecificOptions::default();
        let Some(floor) = self.floor else {
            return options;
        };

        match parse_prefix(&self.query) {
            Ok(IpNet::V6(_)) => options.ipv6_floor = floor.min(128),
            _ => options.ipv4_floor = floor.min(32),
        }
        options
    }
}
