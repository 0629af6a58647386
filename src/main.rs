mod cli;
mod config;
mod form;
mod http;
mod launcher;
mod logging;
mod model;
mod orchestrator;
mod sequences;
mod server;
mod session;
mod sweep;
mod template;
mod validate;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_cgi = args.is_cgi();

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_cgi {
                // The web server only shows what lands on stdout.
                tracing::error!("{e:#}");
                let resp = http::HttpResponse::internal_error("Internal server error");
                let _ = server::write_cgi_response(&resp, std::io::stdout().lock());
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
