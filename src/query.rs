use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::answer::{filter_answers, Answer};
use crate::authority::{get_authority, set_authority};
use crate::delegation::DelegationResolver;
use crate::error::{Result, WhoisError};
use crate::prefix::parse_prefix;
use crate::record::FieldFilter;
use crate::servers::{Rir, ARIN_WHOIS_SERVER};
use crate::transport::{default_flag, Transport, TransportOutput};

/// Timeout of the ARIN probe that detects authority
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1000);
/// Per-server timeout unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);
/// Per-call timeout during suballocation discovery
pub const DELEGATION_TIMEOUT: Duration = Duration::from_millis(10000);

/// Which servers a query goes to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerSelection {
    /// Probe ARIN and follow its referral
    #[default]
    Auto,
    /// Every RIR, without filtering out non-authoritative answers
    AllRirs,
    Explicit(Vec<String>),
}

/// Fully resolved options for one lookup
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub fields: FieldFilter,
    /// Host-selection flag, only meaningful for the command transport
    pub flag: String,
    pub timeout: Duration,
    pub servers: ServerSelection,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fields: FieldFilter::all(),
            flag: default_flag().to_string(),
            timeout: DEFAULT_TIMEOUT,
            servers: ServerSelection::Auto,
        }
    }
}

impl QueryOptions {
    pub fn with_fields(mut self, fields: FieldFilter) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_servers(mut self, servers: ServerSelection) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }
}

pub struct WhoisQuery<T> {
    transport: T,
}

impl<T: Transport> WhoisQuery<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Main query method that handles server selection, authority and field filtering
    pub async fn whois(&self, query: &str, options: &QueryOptions) -> Result<Vec<Answer>> {
        let answers = match &options.servers {
            ServerSelection::Auto => self.query_with_referral(query, options).await?,
            ServerSelection::AllRirs => {
                let answers = self
                    .query_servers(query, &Rir::all_hosts(), &options.flag, options.timeout)
                    .await?;
                set_authority(answers)
            }
            ServerSelection::Explicit(servers) => {
                let answers = self
                    .query_servers(query, servers, &options.flag, options.timeout)
                    .await?;
                set_authority(answers)
            }
        };

        Ok(filter_answers(answers, &options.fields))
    }

    /// Find the authoritative answer for an IP prefix, descending into ARIN
    /// suballocations when ARIN holds the block or nobody claims it
    pub async fn lookup_prefix(&self, prefix: &str, options: &QueryOptions) -> Result<Vec<Answer>> {
        if options.servers != ServerSelection::Auto {
            return self.whois(prefix, options).await;
        }

        let parent = parse_prefix(prefix)?.to_string();
        let probe = self.probe_arin(&parent, &options.flag).await;

        match get_authority(&probe) {
            Some(rir) if rir != Rir::Arin => {
                debug!(%parent, %rir, "ARIN refers prefix to another registry");
                let answers = self
                    .query_servers(&parent, &[rir.host().to_string()], &options.flag, options.timeout)
                    .await?;
                Ok(filter_answers(answers, &options.fields))
            }
            _ => {
                DelegationResolver::new(self, &options.flag)
                    .resolve(&parent, &options.fields)
                    .await
            }
        }
    }

    /// Probe ARIN and follow its `Allocated to` referral
    async fn query_with_referral(&self, query: &str, options: &QueryOptions) -> Result<Vec<Answer>> {
        let probe = self.probe_arin(query, &options.flag).await;

        match get_authority(&probe) {
            Some(rir) if probe.first().is_some_and(|a| a.server.contains(rir.host())) => {
                debug!(%rir, "probed server is authoritative");
                Ok(probe)
            }
            Some(rir) => {
                debug!(%rir, "ARIN referred query");
                self.query_servers(query, &[rir.host().to_string()], &options.flag, options.timeout)
                    .await
            }
            None => {
                debug!("no authority determined, querying every RIR");
                let answers = self
                    .fan_out(query, &Rir::all_hosts(), &options.flag, options.timeout)
                    .await;
                Ok(retain_authoritative(set_authority(answers)))
            }
        }
    }

    /// Short ARIN query; any failure yields whatever text arrived, possibly nothing
    async fn probe_arin(&self, query: &str, flag: &str) -> Vec<Answer> {
        self.fan_out(query, &[ARIN_WHOIS_SERVER.to_string()], flag, PROBE_TIMEOUT)
            .await
    }

    /// Query servers concurrently. A failed server keeps any partial text it
    /// produced. The call only fails when a single server was asked and it
    /// returned nothing at all.
    pub async fn query_servers(
        &self,
        query: &str,
        servers: &[String],
        flag: &str,
        timeout: Duration,
    ) -> Result<Vec<Answer>> {
        let mut outputs = self.fetch(query, servers, flag, timeout).await;

        if outputs.len() == 1 && outputs[0].1.text.trim().is_empty() {
            let (server, output) = outputs.remove(0);
            return match output.error {
                Some(source) => Err(WhoisError::Transport { server, source }),
                None => Ok(Vec::new()),
            };
        }

        Ok(collect_answers(outputs))
    }

    /// Like [`query_servers`](Self::query_servers) but never fails; servers
    /// without any reply are dropped
    pub async fn fan_out(
        &self,
        query: &str,
        servers: &[String],
        flag: &str,
        timeout: Duration,
    ) -> Vec<Answer> {
        collect_answers(self.fetch(query, servers, flag, timeout).await)
    }

    async fn fetch(
        &self,
        query: &str,
        servers: &[String],
        flag: &str,
        timeout: Duration,
    ) -> Vec<(String, TransportOutput)> {
        let calls = servers.iter().map(|server| async move {
            let output = self.transport.execute(server, query, flag, timeout).await;
            (server.clone(), output)
        });

        join_all(calls).await
    }
}

/// Parse transport outputs, recovering from per-server failures
fn collect_answers(outputs: Vec<(String, TransportOutput)>) -> Vec<Answer> {
    outputs
        .into_iter()
        .filter_map(|(server, output)| {
            if let Some(error) = &output.error {
                if output.text.trim().is_empty() {
                    warn!(%server, %error, "no reply, dropping server");
                    return None;
                }
                warn!(%server, %error, "keeping partial reply");
            }

            let answer = Answer::parse(server, &output.text, &FieldFilter::all());
            (!answer.is_empty()).then_some(answer)
        })
        .collect()
}

/// Drop answers known not to be authoritative; undetermined ones stay
fn retain_authoritative(answers: Vec<Answer>) -> Vec<Answer> {
    answers
        .into_iter()
        .filter(|a| a.authority != Some(false))
        .collect()
}
