pub mod answer;
pub mod authority;
pub mod cli;
pub mod colorize;
pub mod delegation;
pub mod error;
pub mod hyperlink;
pub mod less_specific;
pub mod prefix;
pub mod query;
pub mod record;
pub mod servers;
#[cfg(any(test, feature = "test-util"))]
pub mod stub;
pub mod transport;

pub use answer::{filter_answers, merge_by_server, Answer};
pub use authority::{get_authority, set_authority};
pub use cli::{Cli, TransportKind};
pub use colorize::OutputColorizer;
pub use delegation::{DelegationResolver, Delegate, Suballocation};
pub use error::{Result, TransportError, WhoisError};
pub use hyperlink::{terminal_supports_hyperlinks, RirHyperlinkProcessor};
pub use less_specific::{FieldPredicate, LessSpecificOptions, LessSpecificSearch};
pub use prefix::{parse_prefix, PrefixIndex};
pub use query::{QueryOptions, ServerSelection, WhoisQuery};
pub use record::{parse_records, Field, FieldFilter, FieldValue, Record};
pub use servers::Rir;
#[cfg(any(test, feature = "test-util"))]
pub use stub::StubTransport;
pub use transport::{CommandTransport, TcpTransport, Transport, TransportOutput};
