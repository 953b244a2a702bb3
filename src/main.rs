use clap::Parser;
use inapp_billing::application::billing::InAppBilling;
use inapp_billing::application::orchestrator::PurchaseRequest;
use inapp_billing::config::BillingConfig;
use inapp_billing::domain::ports::BillingClientFactoryBox;
use inapp_billing::domain::product::ItemType;
use inapp_billing::domain::purchase::{ProrationMode, PurchaseOutcome};
use inapp_billing::error::AppError;
use inapp_billing::infrastructure::sandbox::{FlowBehavior, SandboxBackend};
use inapp_billing::interfaces::csv::catalog_reader::CatalogReader;
use inapp_billing::interfaces::csv::command_reader::{Command, CommandOp, CommandReader};
use inapp_billing::interfaces::csv::purchase_writer::PurchaseWriter;
use inapp_billing::logging;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV file
    commands: PathBuf,

    /// Product catalog CSV loaded into the sandbox backend
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// JSON configuration file (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connect without support for pending purchases
    #[arg(long)]
    no_pending_purchases: bool,

    /// Skip unknown product ids in catalog queries instead of failing
    #[arg(long)]
    ignore_invalid_products: bool,

    /// Upper bound on waiting for a purchase result
    #[arg(long)]
    purchase_timeout_secs: Option<u64>,
}

impl Cli {
    fn billing_config(&self) -> Result<BillingConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => BillingConfig::from_json_path(path)?,
            None => BillingConfig::default(),
        };
        if self.no_pending_purchases {
            config.enable_pending_purchases = false;
        }
        if self.ignore_invalid_products {
            config.ignore_invalid_products = true;
        }
        if let Some(secs) = self.purchase_timeout_secs {
            config.purchase_timeout_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = cli.billing_config().into_diagnostic()?;

    let sandbox = SandboxBackend::new();
    if let Some(path) = &cli.catalog {
        let file = File::open(path).into_diagnostic()?;
        for product in CatalogReader::new(file).products() {
            match product {
                Ok(product) => sandbox.add_product(product),
                Err(e) => eprintln!("Error reading catalog entry: {}", e),
            }
        }
    }

    let factory: BillingClientFactoryBox = Box::new(sandbox.clone());
    let billing = InAppBilling::new(factory, config);

    // Replay the script; one failing command does not stop the rest
    let file = File::open(&cli.commands).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = execute(&billing, &sandbox, &command).await {
                    eprintln!("Error executing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }
    billing.disconnect();

    let mut purchases = sandbox.owned_purchases(ItemType::InAppPurchase);
    purchases.extend(sandbox.owned_purchases(ItemType::Subscription));

    let stdout = io::stdout();
    let mut writer = PurchaseWriter::new(stdout.lock());
    writer.write_purchases(&purchases).into_diagnostic()?;

    Ok(())
}

async fn execute(
    billing: &InAppBilling,
    sandbox: &SandboxBackend,
    command: &Command,
) -> Result<(), AppError> {
    match command.op {
        CommandOp::Connect => {
            if !billing.connect_default().await? {
                return Err(AppError::CommandError(
                    "backend refused the connection".to_string(),
                ));
            }
        }
        CommandOp::Disconnect => billing.disconnect(),
        CommandOp::Query => {
            let products = billing
                .query_products(command.item_type(), [command.product()?])
                .await?;
            for product in &products {
                info!(
                    product_id = %product.product_id,
                    price = %product.price.formatted(),
                    price_micros = product.price.micros(),
                    "product available"
                );
            }
        }
        CommandOp::Purchase => {
            sandbox.set_flow_behavior(scripted_behavior(command));
            let request = PurchaseRequest::new(command.product()?, command.item_type());
            report(billing.purchase(request).await?)?;
        }
        CommandOp::Upgrade => {
            sandbox.set_flow_behavior(scripted_behavior(command));
            let outcome = billing
                .upgrade_subscription(
                    command.product()?,
                    command.token()?,
                    ProrationMode::default(),
                )
                .await?;
            report(outcome)?;
        }
        CommandOp::Finalize => {
            for (token, acknowledged) in billing.finalize([command.token()?]).await? {
                if !acknowledged {
                    return Err(AppError::CommandError(format!(
                        "purchase {} was not acknowledged",
                        token
                    )));
                }
            }
        }
        CommandOp::Consume => {
            billing
                .consume(command.product()?, command.token()?)
                .await?;
        }
        CommandOp::History => {
            let history = billing.get_purchase_history(command.item_type()).await?;
            info!(item_type = ?command.item_type(), records = history.len(), "purchase history");
        }
    }
    Ok(())
}

fn scripted_behavior(command: &Command) -> FlowBehavior {
    command.flow.unwrap_or_default().into()
}

fn report(outcome: PurchaseOutcome) -> Result<(), AppError> {
    match outcome {
        PurchaseOutcome::Purchased(purchase) => {
            info!(
                product_id = %purchase.product_id(),
                token = %purchase.purchase_token,
                "purchase completed"
            );
            Ok(())
        }
        PurchaseOutcome::UserCancelled => {
            info!("purchase cancelled by the user");
            Ok(())
        }
        PurchaseOutcome::AlreadyInProgress => Err(AppError::CommandError(
            "another purchase is in progress".to_string(),
        )),
        PurchaseOutcome::NoResult => Err(AppError::CommandError(
            "purchase finished without a result".to_string(),
        )),
    }
}
