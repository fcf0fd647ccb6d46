use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// "0.3.2" for releases, "0.3.2@abc1234" for dev builds.
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("FORMULARY_GIT_HASH");
    const IS_RELEASE: &str = env!("FORMULARY_IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{}", VERSION, GIT_HASH)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "formulary", version = get_version())]
#[command(about = "Hospital drug formulary client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List drugs, one page at a time
    #[command(alias = "ls")]
    List {
        /// Show decommissioned drugs instead of active ones
        #[arg(long)]
        decommissioned: bool,

        /// Match against trade name, generic name, code, and remarks
        #[arg(short, long)]
        search: Option<String>,

        /// Exact category ("all" for any)
        #[arg(short, long)]
        category: Option<String>,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Rows per page (defaults to the page-size setting)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// List the categories in use by active drugs
    Categories,

    /// Add a drug
    Add {
        drug_code: String,
        trade_name: String,
        generic_name: String,
        category: String,
    },

    /// Edit a drug's details
    Edit {
        /// Drug id
        id: Uuid,

        #[arg(long)]
        code: Option<String>,

        #[arg(long)]
        trade_name: Option<String>,

        #[arg(long)]
        generic_name: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Insert or update drugs from a CSV file, keyed on drug code
    Import {
        /// CSV with columns drug_code,trade_name,generic_name,category
        file: PathBuf,
    },

    /// Take a drug out of the active formulary
    #[command(alias = "rm")]
    Decommission {
        /// Drug id
        id: Uuid,

        /// Reason for decommissioning
        #[arg(short, long)]
        remarks: String,
    },

    /// Return a decommissioned drug to the active formulary
    Recommission {
        /// Drug id
        id: Uuid,
    },

    /// Sign in to the hosted backend
    Login {
        email: String,

        /// Password (or set FORMULARY_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Get or set configuration
    Config {
        /// Configuration key (e.g., url, api-key, page-size)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_flags() {
        let cli = Cli::try_parse_from([
            "formulary", "list", "--decommissioned", "-s", "para", "-c", "Analgesic", "-p", "2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::List {
                decommissioned,
                search,
                category,
                page,
                page_size,
            }) => {
                assert!(decommissioned);
                assert_eq!(search.as_deref(), Some("para"));
                assert_eq!(category.as_deref(), Some("Analgesic"));
                assert_eq!(page, 2);
                assert!(page_size.is_none());
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn decommission_requires_remarks() {
        let id = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["formulary", "decommission", &id]).is_err());
        assert!(Cli::try_parse_from(["formulary", "decommission", &id, "-r", "Recalled"]).is_ok());
    }

    #[test]
    fn rejects_malformed_id() {
        assert!(Cli::try_parse_from(["formulary", "recommission", "not-a-uuid"]).is_err());
    }
}
