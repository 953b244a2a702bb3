use crate::domain::product::ItemType;
use crate::domain::response::BillingResponseCode;
use crate::error::{AppError, Result};
use crate::infrastructure::sandbox::FlowBehavior;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandOp {
    Connect,
    Disconnect,
    Query,
    Purchase,
    Upgrade,
    Finalize,
    Consume,
    History,
}

/// How the sandbox should answer a scripted purchase.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedFlow {
    #[default]
    Complete,
    /// Succeeds, but the callback arrives without the purchase.
    Empty,
    Cancel,
    Error,
}

impl From<ScriptedFlow> for FlowBehavior {
    fn from(flow: ScriptedFlow) -> Self {
        match flow {
            ScriptedFlow::Complete => FlowBehavior::Complete,
            ScriptedFlow::Empty => FlowBehavior::CompleteWithoutPayload,
            ScriptedFlow::Cancel => FlowBehavior::Cancel,
            ScriptedFlow::Error => FlowBehavior::Fail(BillingResponseCode::Error),
        }
    }
}

/// One line of a command script.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct Command {
    pub op: CommandOp,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub flow: Option<ScriptedFlow>,
}

impl Command {
    pub fn product(&self) -> Result<&str, AppError> {
        self.product
            .as_deref()
            .ok_or_else(|| AppError::CommandError(format!("{:?} requires a product", self.op)))
    }

    pub fn token(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::CommandError(format!("{:?} requires a token", self.op)))
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type.unwrap_or(ItemType::InAppPurchase)
    }
}

/// Reads commands from a CSV source.
///
/// Expected header: `op, product, item_type, token, flow`. Rows are
/// deserialized lazily so one malformed line does not stop the script.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Command, AppError>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AppError::from))
    }
}
