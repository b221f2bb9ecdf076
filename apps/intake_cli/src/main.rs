use std::{collections::HashMap, fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use shared::domain::{
    BasicOrderInfo, BranchId, ClientSummary, ItemSubstep, NewClient, OrderConfirmation,
    OrderParameters,
};
use tracing::{info, warn};
use wizard_core::{
    ClientCreation, HttpWorkflowService, ItemOutcome, OrderWizard, StepOutcome,
};

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Workflow service base URL; overrides config file and environment.
    #[arg(long)]
    workflow_url: Option<String>,
    #[arg(long, default_value = "intake.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Types each keyword into the client search and prints the final page.
    Search {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Drives a full order from a JSON script.
    Walkthrough {
        #[arg(long)]
        script: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClientChoice {
    Existing(ClientSummary),
    New(NewClient),
}

#[derive(Debug, Deserialize)]
struct ItemScript {
    substeps: HashMap<ItemSubstep, Value>,
}

#[derive(Debug, Deserialize)]
struct WalkthroughScript {
    client: ClientChoice,
    branch_id: BranchId,
    order_info: BasicOrderInfo,
    items: Vec<ItemScript>,
    order_parameters: OrderParameters,
    confirmation: OrderConfirmation,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config)?;
    if let Some(url) = args.workflow_url {
        settings.workflow_url = Some(url);
    }
    let Some(workflow_url) = settings.workflow_url.clone() else {
        bail!("no workflow service url; pass --workflow-url or set APP__WORKFLOW_URL");
    };

    let service = Arc::new(HttpWorkflowService::new(
        &workflow_url,
        settings.request_timeout(),
    )?);
    let wizard = OrderWizard::new(service, settings.wizard_config())?;
    info!(%workflow_url, "intake: connected");

    match args.command {
        Command::Search { keywords } => run_search(&wizard, &keywords).await,
        Command::Walkthrough { script } => {
            let raw = fs::read_to_string(&script)
                .with_context(|| format!("failed to read {}", script.display()))?;
            let script: WalkthroughScript =
                serde_json::from_str(&raw).context("walkthrough script is not valid")?;

            let outcome = run_walkthrough(&wizard, script).await;
            if outcome.is_err() {
                warn!("intake: walkthrough failed; cancelling open sessions");
                wizard.cancel().await;
            }
            outcome
        }
    }
}

async fn run_search(wizard: &OrderWizard, keywords: &[String]) -> Result<()> {
    let search = wizard.client_search();
    let mut updates = search.subscribe();
    for keyword in keywords {
        search.set_keyword(keyword.as_str());
    }
    let typed = search.status();
    if typed.too_short || typed.value.is_empty() {
        println!("Keyword '{}' is too short to search.", typed.value);
        return Ok(());
    }

    let quiet_period = wizard.config().search.delay;
    let settled = tokio::time::timeout(
        quiet_period + Duration::from_secs(30),
        updates.wait_for(|status| {
            !status.is_processing && (status.latest.is_some() || status.error.is_some())
        }),
    )
    .await
    .context("client search timed out")?
    .context("client search stopped")?
    .clone();

    if let Some(error) = settled.error {
        bail!("client search failed: {error}");
    }
    println!("{}", serde_json::to_string_pretty(&settled.latest)?);
    Ok(())
}

async fn run_walkthrough(wizard: &OrderWizard, script: WalkthroughScript) -> Result<()> {
    let order_session = wizard.start().await?;
    println!("Order session {order_session}");

    match script.client {
        ClientChoice::Existing(client) => wizard.select_client(client).await?,
        ClientChoice::New(draft) => match wizard.create_client(draft).await? {
            ClientCreation::Created(client) => println!("Created client {}", client.client_id),
            ClientCreation::Rejected(errors) => bail!("client rejected: {:?}", errors.issues()),
        },
    }
    expect_moved(wizard.advance())?;

    wizard.select_branch(script.branch_id).await?;
    wizard.update_order_info(script.order_info).await?;
    expect_moved(wizard.advance())?;

    for (index, item) in script.items.iter().enumerate() {
        wizard.begin_item().await?;
        loop {
            let substep = wizard
                .status()
                .item_step
                .context("item closed unexpectedly")?;
            let payload = item
                .substeps
                .get(&substep)
                .cloned()
                .with_context(|| format!("item {index} has no {substep} payload"))?;
            wizard.submit_item_step(payload).await?;

            match wizard.advance_item().await? {
                ItemOutcome::Moved(next) => info!(item = index, %next, "intake: item step"),
                ItemOutcome::Committed(item_id) => {
                    println!("Item {index} stored as {item_id}");
                    break;
                }
                ItemOutcome::Blocked(errors) => {
                    bail!("item {index} blocked at {substep}: {:?}", errors.issues())
                }
            }
        }
    }

    expect_moved(wizard.advance())?;
    wizard.update_order_parameters(script.order_parameters).await?;
    expect_moved(wizard.advance())?;
    wizard.confirm_order(script.confirmation).await?;

    match wizard.advance() {
        StepOutcome::ReadyToComplete => {}
        other => bail!("order is not ready to complete: {other:?}"),
    }
    let result = wizard.complete_order().await?;
    println!("{}", serde_json::to_string_pretty(&result.result)?);
    println!("{}", serde_json::to_string_pretty(&wizard.status())?);
    Ok(())
}

fn expect_moved(outcome: StepOutcome) -> Result<()> {
    match outcome {
        StepOutcome::Moved(step) => {
            info!(%step, "intake: step");
            Ok(())
        }
        StepOutcome::Blocked(errors) => bail!("step blocked: {:?}", errors.issues()),
        other => bail!("unexpected step outcome: {other:?}"),
    }
}
