use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use colonos::session::Session;
use colonos::visitor::{PedestrianKind, PedestrianRequest, VehiclePassRequest, VisitWindow};
use colonos::{Config, Portal};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "colonos")]
#[command(about = "Resident access portal: directory lookup, sign-in and visitor passes")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-read the directory and update the local cache
    Refresh,
    /// Sign in and print a session token
    Login {
        #[arg(long)]
        name: String,
        #[arg(long)]
        credential: String,
    },
    /// Verify a session token and show who it belongs to
    Check {
        #[arg(long)]
        token: String,
    },
    /// Register a visitor for the resident holding the token
    Visitor {
        #[command(subcommand)]
        kind: VisitorCommand,
    },
    /// Print a fresh random signing secret
    Keygen,
}

#[derive(Subcommand, Debug)]
enum VisitorCommand {
    /// Vehicle pass with a QR code
    Vehicle {
        #[arg(long)]
        token: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Pedestrian visitor
    Pedestrian {
        #[arg(long)]
        token: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = PedestrianArg::OneDay)]
        kind: PedestrianArg,
        /// Service type, required for recurring visitors
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(clap::Args, Debug)]
struct WindowArgs {
    /// Visit date, YYYY-MM-DD
    #[arg(long)]
    date: String,
    /// Start time, HH:MM
    #[arg(long)]
    start: String,
    /// End time, HH:MM
    #[arg(long)]
    end: String,
}

impl WindowArgs {
    fn parse(&self) -> Result<VisitWindow> {
        let time = |raw: &str| {
            NaiveTime::parse_from_str(raw, "%H:%M")
                .with_context(|| format!("Invalid time '{raw}', expected HH:MM"))
        };
        Ok(VisitWindow {
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", self.date))?,
            start: time(&self.start)?,
            end: time(&self.end)?,
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PedestrianArg {
    OneDay,
    Recurring,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("colonos=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::Keygen = cli.command {
        let secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
        println!("{secret}");
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let portal = Portal::from_config(&config)?;

    match cli.command {
        Command::Refresh => match portal.resolver().refresh().await {
            Ok(table) => info!(residents = table.len(), "Directory refreshed"),
            Err(e) => bail!("{e}"),
        },
        Command::Login { name, credential } => {
            let mut session = portal.session();
            match session.submit(&name, &credential).await {
                Ok(token) => {
                    info!(expires_at = %token.expires_at(), "Signed in");
                    println!("{token}");
                }
                Err(e) => bail!("{}", e.public_message()),
            }
        }
        Command::Check { token } => {
            let session = restore(&portal, &token)?;
            println!(
                "{} (expires {})",
                session.principal_name,
                session.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Command::Visitor { kind } => register_visitor(&portal, kind).await?,
        Command::Keygen => {}
    }

    Ok(())
}

fn restore(portal: &Portal, token: &str) -> Result<Session> {
    portal
        .session()
        .present_token(token)
        .map_err(|e| anyhow::anyhow!("{}", e.public_message()))
}

async fn register_visitor(portal: &Portal, command: VisitorCommand) -> Result<()> {
    let desk = portal.visitors();
    let pass = match command {
        VisitorCommand::Vehicle {
            token,
            first_name,
            last_name,
            window,
        } => {
            let session = restore(portal, &token)?;
            let request = VehiclePassRequest {
                first_name,
                last_name,
                window: window.parse()?,
            };
            desk.register_vehicle(&session, &request).await?
        }
        VisitorCommand::Pedestrian {
            token,
            name,
            kind,
            service,
            phone,
            notes,
            window,
        } => {
            let session = restore(portal, &token)?;
            let kind = match kind {
                PedestrianArg::OneDay => PedestrianKind::OneDay { phone },
                PedestrianArg::Recurring => PedestrianKind::Recurring {
                    service: service.unwrap_or_default(),
                },
            };
            let request = PedestrianRequest {
                name,
                kind,
                window: window.parse()?,
                notes,
            };
            desk.register_pedestrian(&session, &request).await?
        }
    };

    println!("{}", pass.code);
    println!("{}", pass.image_file_name());
    Ok(())
}
