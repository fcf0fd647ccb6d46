use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use formulary::api::{FormularyApi, Outcome};
use formulary::commands::import::read_csv;
use formulary::config::{Backend, FormularyConfig, CONFIG_KEYS};
use formulary::error::{FormularyError, Result};
use formulary::gateway::file::FileGateway;
use formulary::gateway::rest::{RestAuth, RestClient, RestGateway};
use formulary::gateway::Gateway;
use formulary::model::{CategoryFilter, DrugDraft, StatusMode};
use formulary::session::{clear_session, load_session, save_session, Session, SessionContext};
use formulary::state::{FetchOutcome, PageChange};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod args;
mod print;
use args::{Cli, Commands};
use print::{print_listing, print_messages};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let home = formulary_home()?;
    let config = FormularyConfig::load(&home)?.with_overrides(
        std::env::var("FORMULARY_URL").ok(),
        std::env::var("FORMULARY_API_KEY").ok(),
    );

    let command = cli.command.unwrap_or(Commands::List {
        decommissioned: false,
        search: None,
        category: None,
        page: 1,
        page_size: None,
    });

    match command {
        Commands::Config { key, value } => handle_config(&home, key, value),
        Commands::Login { email, password } => handle_login(&home, &config, &email, password),
        Commands::Logout => handle_logout(&home, &config),
        Commands::Whoami => handle_whoami(&home, &config),
        command => {
            let page_size = match &command {
                Commands::List {
                    page_size: Some(0), ..
                } => {
                    return Err(FormularyError::InvalidInput(
                        "Page size must be greater than zero".into(),
                    ))
                }
                Commands::List {
                    page_size: Some(n), ..
                } => *n,
                _ => config.page_size,
            };
            match config.backend {
                Backend::File => {
                    let gateway = FileGateway::new(home.clone());
                    dispatch(FormularyApi::new(gateway, page_size), command)
                }
                Backend::Rest => {
                    let token = load_session(&home)?.map(|s| s.access_token);
                    let gateway = RestGateway::new(RestClient::from_config(&config)?, &config)
                        .with_access_token(token);
                    dispatch(FormularyApi::new(gateway, page_size), command)
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("formulary=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn formulary_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("FORMULARY_HOME").filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("org", "formulary", "formulary")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| FormularyError::Config("Could not determine data directory".into()))
}

fn dispatch<G: Gateway>(mut api: FormularyApi<G>, command: Commands) -> Result<()> {
    match command {
        Commands::List {
            decommissioned,
            search,
            category,
            page,
            ..
        } => handle_list(&mut api, decommissioned, search, category, page),
        Commands::Categories => handle_categories(&api),
        Commands::Add {
            drug_code,
            trade_name,
            generic_name,
            category,
        } => report(api.save(&DrugDraft::new(
            drug_code,
            trade_name,
            generic_name,
            category,
        ))),
        Commands::Edit {
            id,
            code,
            trade_name,
            generic_name,
            category,
        } => {
            let mut draft = DrugDraft::from_record(&api.get_drug(id)?);
            if let Some(code) = code {
                draft.drug_code = code;
            }
            if let Some(trade_name) = trade_name {
                draft.trade_name = trade_name;
            }
            if let Some(generic_name) = generic_name {
                draft.generic_name = generic_name;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            report(api.save(&draft))
        }
        Commands::Import { file } => {
            let drafts = read_csv(fs::File::open(&file)?)?;
            report(api.import(&drafts))
        }
        Commands::Decommission { id, remarks } => {
            let record = api.get_drug(id)?;
            report(api.decommission(&record, &remarks))
        }
        Commands::Recommission { id } => {
            let record = api.get_drug(id)?;
            report(api.recommission(&record))
        }
        Commands::Config { .. } | Commands::Login { .. } | Commands::Logout | Commands::Whoami => {
            unreachable!("handled before a gateway is opened")
        }
    }
}

fn handle_list<G: Gateway>(
    api: &mut FormularyApi<G>,
    decommissioned: bool,
    search: Option<String>,
    category: Option<String>,
    page: usize,
) -> Result<()> {
    let status = if decommissioned {
        StatusMode::Decommissioned
    } else {
        StatusMode::Active
    };
    api.set_search_term(search.unwrap_or_default());
    api.set_category(CategoryFilter::from(category.as_deref().unwrap_or("")));

    if let FetchOutcome::Failed(message) = api.refresh(status) {
        return Err(FormularyError::Api(message));
    }

    if page != 1 {
        match api.change_page(page) {
            PageChange::Rejected => {
                return Err(FormularyError::InvalidInput(format!(
                    "Page {} is out of range; {} page(s) match",
                    page,
                    api.state().total_pages()
                )))
            }
            PageChange::Fetched(FetchOutcome::Failed(message)) => {
                return Err(FormularyError::Api(message))
            }
            PageChange::Fetched(_) => {}
        }
    }

    print_listing(api.state());
    Ok(())
}

fn handle_categories<G: Gateway>(api: &FormularyApi<G>) -> Result<()> {
    let categories = api.categories();
    if categories.is_empty() {
        println!("No categories found.");
    }
    for category in categories {
        println!("{}", category);
    }
    Ok(())
}

fn report(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Success { messages } => {
            print_messages(&messages);
            Ok(())
        }
        Outcome::Failure { message } => Err(FormularyError::Api(message)),
    }
}

fn handle_config(home: &Path, key: Option<String>, value: Option<String>) -> Result<()> {
    let mut config = FormularyConfig::load(home)?;
    match (key, value) {
        (None, _) => {
            for key in CONFIG_KEYS {
                println!("{} = {}", key, display_value(&config, key)?);
            }
        }
        (Some(key), None) => println!("{} = {}", key, display_value(&config, &key)?),
        (Some(key), Some(value)) => {
            config.set(&key, &value)?;
            config.save(home)?;
            println!(
                "{}",
                format!("{} = {}", key, display_value(&config, &key)?).green()
            );
        }
    }
    Ok(())
}

fn display_value(config: &FormularyConfig, key: &str) -> Result<String> {
    let value = config.get(key)?;
    if key == "api-key" && !value.is_empty() {
        return Ok("(set)".to_string());
    }
    Ok(value)
}

fn rest_auth(config: &FormularyConfig, stored: Option<Session>) -> Result<RestAuth> {
    if config.backend != Backend::Rest {
        return Err(FormularyError::Config(
            "Signing in needs the rest backend. Run `formulary config url <url>`.".into(),
        ));
    }
    Ok(RestAuth::new(RestClient::from_config(config)?, config).with_session(stored))
}

fn handle_login(
    home: &Path,
    config: &FormularyConfig,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = password
        .or_else(|| std::env::var("FORMULARY_PASSWORD").ok())
        .ok_or_else(|| {
            FormularyError::InvalidInput(
                "A password is required: pass --password or set FORMULARY_PASSWORD".into(),
            )
        })?;

    let mut ctx = SessionContext::new(rest_auth(config, None)?);
    let email = ctx.sign_in(email, &password)?.email.clone();
    if let Some(session) = ctx.session() {
        save_session(home, session)?;
    }

    let role = if ctx.is_admin() { " (admin)" } else { "" };
    println!("{}", format!("Signed in as {}{}", email, role).green());
    Ok(())
}

fn handle_logout(home: &Path, config: &FormularyConfig) -> Result<()> {
    let Some(stored) = load_session(home)? else {
        println!("Not signed in.");
        return Ok(());
    };

    match rest_auth(config, Some(stored)) {
        Ok(auth) => {
            let mut ctx = SessionContext::new(auth);
            if let Err(e) = ctx.initialize() {
                tracing::warn!(error = %e, "could not validate stored session");
            }
            ctx.sign_out();
        }
        Err(e) => tracing::warn!(error = %e, "skipping remote sign-out"),
    }

    clear_session(home)?;
    println!("{}", "Signed out.".green());
    Ok(())
}

fn handle_whoami(home: &Path, config: &FormularyConfig) -> Result<()> {
    let Some(stored) = load_session(home)? else {
        println!("Not signed in.");
        return Ok(());
    };

    let mut ctx = SessionContext::new(rest_auth(config, Some(stored))?);
    ctx.initialize()?;
    match ctx.user() {
        Some(user) => {
            let role = if ctx.is_admin() { "admin" } else { "user" };
            println!("{} {} {}", user.email.bold(), user.id.to_string().dimmed(), role);
        }
        None => {
            clear_session(home)?;
            println!("Session expired. Run `formulary login` again.");
        }
    }
    ctx.teardown();
    Ok(())
}
