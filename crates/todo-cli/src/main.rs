// ============================================================================
// todo-dapp - terminal front end for the on-chain TodoList
// ============================================================================
// Usage:
//   todo-dapp status                        Show account, network and counts
//   todo-dapp connect                       Request wallet accounts
//   todo-dapp switch 0x7E43                 Switch the wallet to another chain
//   todo-dapp list [--filter active]        List todos of the current account
//   todo-dapp add "Buy milk"                Create a todo
//   todo-dapp complete 3                    Mark todo 3 completed
//   todo-dapp delete 3                      Delete todo 3
//   todo-dapp watch                         Follow wallet and contract events
// ============================================================================

use alloy_primitives::U256;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use todo_core::networks::parse_chain_id;
use todo_core::{
    abi_source_for, DappConfig, JsonRpcClient, NetworkRegistry, StatusKind, TodoDapp, TodoFilter,
    UiState,
};
use tracing::info;

/// Manage a todo list stored in the TodoList contract
#[derive(Parser)]
#[command(name = "todo-dapp", version, about = "Manage an on-chain todo list through your wallet")]
struct Cli {
    /// JSON-RPC endpoint of the wallet / node (overrides TODO_DAPP_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// ABI file path or http(s) URL (overrides TODO_DAPP_ABI_PATH)
    #[arg(long, global = true)]
    abi: Option<String>,

    /// Print the UI snapshot as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account, network and todo counts
    Status,

    /// Ask the wallet for account access
    Connect,

    /// Switch the wallet to a supported chain (decimal or 0x-hex id)
    Switch { chain: String },

    /// List todos of the current account
    List {
        /// all, active or completed
        #[arg(long, default_value = "all")]
        filter: TodoFilter,
    },

    /// Create a todo (at most 32 printable ASCII characters)
    Add { content: String },

    /// Mark a todo completed
    Complete { id: u64 },

    /// Delete a todo
    Delete { id: u64 },

    /// Follow wallet notifications and contract events until Ctrl-C
    Watch,
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("todo_dapp=info".parse()?)
                .add_directive("todo_core=debug".parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = DappConfig::from_env()?;
    if let Some(url) = cli.rpc_url.clone() {
        config.rpc_url = url;
    }
    if let Some(abi) = cli.abi.clone() {
        config.abi_path = abi;
    }
    config.validate()?;

    info!("Using RPC endpoint {}", config.rpc_url);
    let client = JsonRpcClient::new(&config);
    let abi_source = abi_source_for(&config.abi_path);
    let (app, events) = TodoDapp::new(
        client.clone(),
        client.clone(),
        NetworkRegistry::builtin(),
        config,
        abi_source,
    );
    let app = Arc::new(app);

    let snapshot = app.init().await;
    if let Err(e) = &snapshot {
        print_toasts(&app).await;
        anyhow::bail!("Initialization failed: {}", e);
    }

    let filter = match &cli.command {
        Commands::List { filter } => *filter,
        _ => TodoFilter::All,
    };

    let outcome = match cli.command {
        Commands::Status => Ok(()),
        Commands::Connect => app.connect_wallet().await.map(|account| {
            println!("Connected: {:#x}", account);
        }),
        Commands::Switch { chain } => {
            let chain_id = parse_chain_id(&chain)
                .with_context(|| format!("Invalid chain id '{}'", chain))?;
            app.switch_network(chain_id).await
        }
        Commands::List { .. } => app.refresh().await.map(|_| ()),
        Commands::Add { content } => app
            .create_todo(&content)
            .await
            .map(|receipt| println!("Confirmed in {}", receipt.transaction_hash)),
        Commands::Complete { id } => app
            .complete_todo(U256::from(id))
            .await
            .map(|receipt| println!("Confirmed in {}", receipt.transaction_hash)),
        Commands::Delete { id } => app
            .delete_todo(U256::from(id))
            .await
            .map(|receipt| println!("Confirmed in {}", receipt.transaction_hash)),
        Commands::Watch => {
            let watcher = client.spawn_wallet_watcher();
            let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
            let runner = {
                let app = app.clone();
                tokio::spawn(async move {
                    app.run(events, async {
                        let _ = stopped.await;
                    })
                    .await
                })
            };

            println!("Watching for wallet and contract events (Ctrl-C to stop)");
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => print_toasts(&app).await,
                }
            }

            let _ = stop.send(());
            runner.await?;
            watcher.abort();
            Ok(())
        }
    };

    print_toasts(&app).await;
    let ui = app.ui_snapshot().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ui)?);
    } else {
        print_ui(&ui, filter);
    }

    outcome.map_err(|e| anyhow::anyhow!(todo_core::error_translator::describe(&e)))
}

async fn print_toasts(app: &TodoDapp) {
    let toasts = app.context().ui.write().await.drain_toasts();
    for toast in toasts {
        let tag = match toast.kind {
            StatusKind::Success => "ok",
            StatusKind::Error => "error",
            StatusKind::Info => "info",
            StatusKind::Warning => "warn",
        };
        println!("[{}] {}", tag, toast.text);
    }
}

fn print_ui(ui: &UiState, filter: TodoFilter) {
    println!();
    println!("Account: {}", ui.account_display);
    println!("Network: {}", ui.network_display);
    println!(
        "Todos:   {} total, {} completed, {} pending",
        ui.stats.total, ui.stats.completed, ui.stats.pending
    );

    let visible = ui.visible(filter);
    if visible.is_empty() {
        return;
    }

    println!();
    println!("{:>6}  {:<4}  {:<20}  {}", "ID", "DONE", "CREATED", "CONTENT");
    println!("{}", "-".repeat(70));
    for todo in visible {
        println!(
            "{:>6}  {:<4}  {:<20}  {}",
            todo.id,
            if todo.is_completed { "x" } else { "" },
            todo.created_at_display(),
            todo.content
        );
    }
}
