//! `ticketdesk`: command-line front-end for the ticketing service.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use ticketdesk_core::{
    ApiError, ClientConfig, Completion, FileSessionStore, NewTicket, ReqwestTransport, StatusFilter,
    Statistics, Ticket, TicketClient, TicketDesk,
};
use tracing::{debug, error};

type Desk = TicketDesk<ReqwestTransport, FileSessionStore>;

/// Technical-support ticketing client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in as a technician (email or username)
    Login {
        identifier: String,
        #[arg(long, env = "TICKETDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Submit a repair request (no login needed)
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        equipment: String,
        #[arg(long)]
        damage: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List tickets
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Show one ticket
    Show { id: i64 },
    /// Close a ticket
    Complete {
        id: i64,
        #[arg(long)]
        technician: String,
        #[arg(long)]
        procedure: String,
    },
    /// Save a ticket report as ticket_<id>.pdf
    Pdf {
        id: i64,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Aggregate statistics
    Stats,
    /// Pending and completed tickets plus statistics
    Dashboard,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Pending,
    Completed,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => StatusFilter::Pending,
            StatusArg::Completed => StatusFilter::Completed,
        }
    }
}

fn default_session_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".ticketdesk")
        .join("session.json")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ClientConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let session_file = config.session_file.clone().unwrap_or_else(default_session_file);
    debug!(base_url = %config.base_url, session = %session_file.display(), "starting");

    let desk = TicketDesk::new(
        TicketClient::new(&config.base_url),
        ReqwestTransport::new(),
        FileSessionStore::new(session_file),
    );

    match run(&desk, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.requires_login() => {
            eprintln!("{e}. Run `ticketdesk login <identifier>` again.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(desk: &Desk, command: Command) -> Result<(), ApiError> {
    match command {
        Command::Login { identifier, password } => {
            desk.login(&identifier, &password).await?;
            println!("Logged in as {identifier}");
        }
        Command::Logout => {
            desk.clear_auth();
            println!("Session closed");
        }
        Command::Submit {
            name,
            id,
            equipment,
            damage,
            description,
            email,
            phone,
        } => {
            let receipt = desk
                .create_ticket(&NewTicket {
                    person_name: name,
                    person_id: id,
                    equipment_type: equipment,
                    damage_type: damage,
                    description,
                    email,
                    phone,
                })
                .await?;
            println!("Ticket #{} created", receipt.ticket_id);
        }
        Command::List { status } => {
            let tickets = desk.list_tickets(status.map(StatusFilter::from)).await?;
            print_tickets(&tickets);
        }
        Command::Show { id } => print_ticket(&desk.get_ticket(id).await?),
        Command::Complete {
            id,
            technician,
            procedure,
        } => {
            let completion = Completion {
                technician_name: technician,
                procedure_description: procedure,
            };
            desk.complete_ticket(id, &completion).await?;
            println!("Ticket #{id} closed");
        }
        Command::Pdf { id, out } => {
            let path = desk.download_ticket_pdf(id, &out).await?;
            println!("Saved {}", path.display());
        }
        Command::Stats => print_statistics(&desk.get_statistics().await?),
        Command::Dashboard => {
            let dashboard = desk.load_dashboard().await?;
            println!("Pending ({})", dashboard.pending.len());
            print_tickets(&dashboard.pending);
            println!("\nCompleted ({})", dashboard.completed.len());
            print_tickets(&dashboard.completed);
            println!();
            print_statistics(&dashboard.statistics);
        }
    }
    Ok(())
}

fn print_tickets(tickets: &[Ticket]) {
    if tickets.is_empty() {
        println!("  (none)");
    }
    for t in tickets {
        println!(
            "  #{:<5} {:<11} {:<14} {:<14} {}",
            t.id, t.status, t.equipment_type, t.damage_type, t.person_name
        );
    }
}

fn print_ticket(t: &Ticket) {
    println!("Ticket #{}", t.id);
    println!("  Status:      {}", t.status);
    println!("  Created:     {}", t.created_at);
    println!("  Requester:   {} ({})", t.person_name, t.person_id);
    println!("  Equipment:   {}", t.equipment_type);
    println!("  Damage:      {}", t.damage_type);
    println!("  Description: {}", t.description);
    if let Some(name) = &t.attended_by {
        println!("  Attended by: {name}");
    }
    if let Some(procedure) = &t.procedure {
        println!("  Procedure:   {procedure}");
    }
}

fn print_statistics(s: &Statistics) {
    println!("Total tickets:   {}", s.total_tickets);
    println!("Completed:       {} ({}%)", s.completed_tickets, s.completion_rate());
    println!("Open/in process: {}/{}", s.pending, s.in_process);
    println!("Technicians:     {}", s.technicians.join(", "));
    if let Some(per_tech) = &s.technician_performance {
        println!("Closed per technician:");
        for (name, count) in per_tech {
            println!("  {name:<20} {count}");
        }
    }
    if let Some(failures) = &s.failure_types {
        println!("Failure types:");
        for (label, count) in failures {
            println!("  {label:<20} {count}");
        }
    }
    if let Some(equipment) = &s.equipment_frequency {
        println!("Most serviced equipment:");
        for e in equipment {
            println!("  {:<20} {}", e.equipment_type, e.count);
        }
    }
}
