use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use stockroom::{
    config::{self, AppConfig},
    domain::{
        AcceptTransfer, CatalogItem, HierarchyChain, HierarchyLevel, TransferDetail,
        TransferDirection, TransferId, WarehouseId,
    },
    errors::ErrorPrompt,
    events::{self, Event, EventSender},
    services::{
        factory::ServiceFactory,
        hierarchy::HierarchySelector,
        transfers::{TransferLifecycle, TransferView},
    },
    InventoryApi, ServiceError, SessionUser,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize(&cli)?;

    let outcome = match cli.command {
        Commands::Transfers(command) => {
            handle_transfers_command(&context, command, cli.json).await
        }
        Commands::Catalog(command) => handle_catalog_command(&context, command, cli.json).await,
    };

    // Service errors carry a user-facing prompt; show that instead of the raw chain.
    if let Err(err) = &outcome {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            eprintln!("{}", ErrorPrompt::for_error(service_err));
        }
    }
    outcome
}

#[derive(Parser)]
#[command(
    name = "stockroom",
    about = "Stockroom CLI for transfer requests and warehouse catalogs",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(long, global = true, help = "Backend id of the acting user")]
    user: Option<String>,
    #[arg(long, global = true, help = "Display name of the acting user")]
    user_name: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Transfers(TransfersCommands),
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

#[derive(Subcommand)]
enum TransfersCommands {
    /// Pending incoming and outgoing transfers
    List,
    Show(ShowTransferArgs),
    Accept(AcceptTransferArgs),
    Reject(RejectTransferArgs),
    Cancel(CancelTransferArgs),
}

#[derive(Subcommand)]
enum CatalogCommands {
    List(ListCatalogArgs),
}

#[derive(Args)]
struct ShowTransferArgs {
    #[arg(long, help = "Transfer request number, e.g. TR-100")]
    id: String,
}

#[derive(Args)]
struct AcceptTransferArgs {
    #[arg(long, help = "Transfer request number")]
    id: String,
    #[arg(long, help = "Company that receives the items")]
    company: String,
    #[arg(long, help = "Customer under the company")]
    customer: String,
    #[arg(long, help = "Project under the customer")]
    project: String,
    #[arg(long, help = "Work order under the project")]
    work_order: Option<String>,
    #[arg(long, help = "Optional notes for the sender")]
    notes: Option<String>,
}

#[derive(Args)]
struct RejectTransferArgs {
    #[arg(long, help = "Transfer request number")]
    id: String,
    #[arg(long, help = "Why the transfer is rejected")]
    reason: String,
}

#[derive(Args)]
struct CancelTransferArgs {
    #[arg(long, help = "Transfer request number")]
    id: String,
}

#[derive(Args)]
struct ListCatalogArgs {
    #[arg(long, help = "Warehouse identifier")]
    warehouse: String,
    #[arg(long, help = "Only items whose name, SKU or description match")]
    search: Option<String>,
}

struct CliContext {
    config: AppConfig,
    factory: ServiceFactory,
    user: Option<SessionUser>,
}

impl CliContext {
    fn initialize(cli: &Cli) -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let (event_tx, event_rx) = mpsc::channel::<Event>(32);
        tokio::spawn(events::process_events(event_rx));

        let factory = ServiceFactory::from_config(config.clone())
            .context("failed to build backend client")?
            .with_events(EventSender::new(event_tx));

        let user = cli.user.as_ref().map(|id| {
            let name = cli.user_name.clone().unwrap_or_else(|| id.clone());
            SessionUser::new(id.as_str(), name)
        });

        Ok(Self {
            config,
            factory,
            user,
        })
    }

    fn user(&self) -> Result<SessionUser> {
        self.user
            .clone()
            .ok_or_else(|| anyhow!("--user is required for transfer commands"))
    }

    fn transfers(&self) -> Result<TransferLifecycle> {
        Ok(self.factory.transfer_lifecycle(self.user()?))
    }

    fn api(&self) -> &Arc<dyn InventoryApi> {
        self.factory.api()
    }
}

async fn handle_transfers_command(
    context: &CliContext,
    command: TransfersCommands,
    json: bool,
) -> Result<()> {
    let transfers = context.transfers()?;

    match command {
        TransfersCommands::List => {
            let queue = transfers
                .refresh_queue()
                .await
                .context("failed to load transfer queue")?;
            if json {
                print_json(&queue)?;
            } else if queue.is_empty() {
                println!("No pending transfers.");
            } else {
                println!("Pending transfers ({}):", queue.len());
                for view in &queue {
                    render_transfer(view);
                }
            }
        }
        TransfersCommands::Show(args) => {
            let detail = transfers
                .detail(&TransferId::new(args.id))
                .await
                .context("failed to load transfer")?;
            if json {
                print_json(&detail)?;
            } else {
                render_detail(&transfers, &detail);
            }
        }
        TransfersCommands::Accept(args) => {
            let id = TransferId::new(args.id.clone());
            let chain = resolve_chain(context, &args).await?;
            let accept = AcceptTransfer {
                chain,
                notes: args.notes,
            };
            let view = transfers
                .accept(&id, &accept)
                .await
                .context("failed to accept transfer")?;
            if json {
                print_json(&view)?;
            } else {
                println!(
                    "Transfer {} accepted into project {}",
                    id, accept.chain.project.name
                );
            }
        }
        TransfersCommands::Reject(args) => {
            let id = TransferId::new(args.id);
            let view = transfers
                .reject(&id, &args.reason)
                .await
                .context("failed to reject transfer")?;
            if json {
                print_json(&view)?;
            } else {
                println!("Transfer {} rejected", id);
            }
        }
        TransfersCommands::Cancel(args) => {
            let id = TransferId::new(args.id);
            transfers
                .cancel(&id)
                .await
                .context("failed to cancel transfer")?;
            if json {
                print_json(&serde_json::json!({ "id": id, "cancelled": true }))?;
            } else {
                println!("Transfer {} cancelled", id);
            }
        }
    }

    Ok(())
}

/// Walks the hierarchy chain level by level, the same way an interactive
/// picker would.
async fn resolve_chain(
    context: &CliContext,
    args: &AcceptTransferArgs,
) -> Result<HierarchyChain> {
    let api = context.api().as_ref();
    let mut selector: HierarchySelector = context.factory.hierarchy_selector();
    selector.open(api).await.context("failed to load companies")?;

    let path = [
        (HierarchyLevel::Company, Some(args.company.as_str())),
        (HierarchyLevel::Customer, Some(args.customer.as_str())),
        (HierarchyLevel::Project, Some(args.project.as_str())),
        (HierarchyLevel::WorkOrder, args.work_order.as_deref()),
    ];
    for (level, id) in path {
        let Some(id) = id else { continue };
        selector
            .select_and_load(level, id, api)
            .await
            .with_context(|| format!("failed to select {} {}", level, id))?;
    }

    Ok(selector.require_chain(context.config.require_work_order_on_accept)?)
}

async fn handle_catalog_command(
    context: &CliContext,
    command: CatalogCommands,
    json: bool,
) -> Result<()> {
    match command {
        CatalogCommands::List(args) => {
            let warehouse = WarehouseId::new(args.warehouse);
            let items = context
                .api()
                .list_catalog(&warehouse)
                .await
                .context("failed to load catalog")?;
            let query = args.search.unwrap_or_default();
            let items: Vec<&CatalogItem> = items.iter().filter(|i| i.matches(&query)).collect();

            if json {
                print_json(&items)?;
            } else if items.is_empty() {
                println!("No items matched in warehouse {}.", warehouse);
            } else {
                println!("Warehouse {} ({} items):", warehouse, items.len());
                for item in items {
                    render_item(item);
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_transfer(view: &TransferView) {
    let summary = &view.summary;
    let counterpart = match view.direction {
        TransferDirection::Outgoing => {
            format!("to {}", summary.recipient.display_name())
        }
        TransferDirection::Incoming => {
            format!("from {}", summary.sender.display_name())
        }
    };
    println!(
        "- {} • {} {} • {} item(s) • {} • {}",
        summary.id,
        view.direction,
        counterpart,
        summary.item_count,
        summary.status,
        summary.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn render_detail(transfers: &TransferLifecycle, detail: &TransferDetail) {
    let view = TransferView::new(detail.summary.clone(), &transfers.user().id);
    render_transfer(&view);
    if let Some(notes) = &detail.summary.notes {
        println!("  Notes: {}", notes);
    }
    if let Some(reason) = &detail.summary.rejection_reason {
        println!("  Rejection reason: {}", reason);
    }
    if let Some(photo) = &detail.image_url {
        println!("  Photo: {}", photo);
    }
    for item in &detail.items {
        println!(
            "  · {} x{}{}",
            item.name,
            item.quantity,
            item.sku
                .as_deref()
                .map(|s| format!(" (SKU {})", s))
                .unwrap_or_default()
        );
    }
}

fn render_item(item: &CatalogItem) {
    println!(
        "- {} • {} • {} available{}",
        item.id,
        item.name,
        item.available_quantity,
        item.unit
            .as_deref()
            .map(|u| format!(" {}", u))
            .unwrap_or_default()
    );
}
