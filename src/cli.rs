use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ferret",
    about = "Ferret - OSINT reconnaissance engine with causal event tracking",
    version
)]

pub struct Args {
    /// Scan target: hostname, IP address, netblock (CIDR), e-mail
    /// address, "quoted human name", phone number (+countrycode...) or
    /// AS number
    pub target: String,

    /// Target type (IP_ADDRESS, INTERNET_NAME, ...); auto-detected when
    /// omitted
    #[arg(short = 't', long = "type")]
    pub target_type: Option<String>,

    /// Modules to run (default: all built-in modules)
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Write scanned events to this JSONL file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HTTP fetch timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// User-Agent header for HTTP fetches (repeat for a pool)
    #[arg(long)]
    pub user_agent: Vec<String>,

    /// Dictionary word list files (ispell format accepted)
    #[arg(long, value_delimiter = ',')]
    pub wordlist: Vec<PathBuf>,

    /// First-name list files
    #[arg(long, value_delimiter = ',')]
    pub namelist: Vec<PathBuf>,

    /// Public-suffix rules file (publicsuffix.org list format)
    #[arg(long)]
    pub suffix_list: Option<PathBuf>,

    /// Enable verbose logging of all operations
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log critical errors
    #[arg(short, long)]
    pub quiet: bool,
}
