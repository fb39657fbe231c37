use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Override the configured log filter, e.g. `-l debug`.
    #[arg(long, short = 'l')]
    pub log_filter: Option<String>,
}
