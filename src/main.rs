use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rir_whois::{
    Answer, Cli, CommandTransport, LessSpecificSearch, OutputColorizer, TcpTransport, Transport,
    TransportKind, WhoisQuery,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if args.no_color {
        colored::control::set_override(false);
    }

    let answers = match args.transport {
        TransportKind::Tcp => run(&args, WhoisQuery::new(TcpTransport::new())).await,
        TransportKind::Command => run(&args, WhoisQuery::new(CommandTransport::new())).await,
    };

    let answers = match answers {
        Ok(answers) => answers,
        Err(err) => {
            eprintln!("{}: {}", "Query failed".bright_red(), err);
            std::process::exit(1);
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&answers).context("failed to serialize answers")?;
        println!("{}", json);
        return Ok(());
    }

    if answers.iter().all(Answer::is_empty) {
        eprintln!("{}", "Empty response received. Please check if your query is correct.".bright_red());
        std::process::exit(1);
    }

    let colorizer = OutputColorizer::new(args.use_color(), args.use_hyperlinks());
    println!("{}", colorizer.render(&answers));
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rir_whois=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rir_whois=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run<T: Transport>(args: &Cli, engine: WhoisQuery<T>) -> rir_whois::Result<Vec<Answer>> {
    let options = args.query_options();
    debug!(query = %args.query, servers = ?options.servers, "starting lookup");

    if let Some(predicate) = &args.less_specific {
        let search = LessSpecificSearch::new(&engine, args.less_specific_options());
        return search
            .search(&args.query, &options, |answers| predicate.matches(answers))
            .await;
    }

    if args.prefix {
        engine.lookup_prefix(&args.query, &options).await
    } else {
        engine.whois(&args.query, &options).await
    }
}
