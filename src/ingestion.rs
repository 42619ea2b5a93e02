use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::{Error, Money};

/// One row of a money-movement script. Accounts are addressed by label;
/// the driver resolves labels to the ids the store assigned at `open`.
#[derive(Debug, Clone)]
pub enum Operation {
    Open {
        label: String,
        opening_balance: Money,
    },
    Deposit {
        label: String,
        amount: Money,
        description: Option<String>,
    },
    Withdraw {
        label: String,
        amount: Money,
        description: Option<String>,
    },
    Transfer {
        label: String,
        to: String,
        amount: Money,
        description: Option<String>,
    },
}

pub trait OperationStream {
    type OpStream: Stream<Item = Result<Operation, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::OpStream;
}

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        Self { reader: Some(rdr) }
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    op: String,
    account: String,
    to: Option<String>,
    amount: Option<Money>,
    description: Option<String>,
}

impl TryFrom<CsvRow> for Operation {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let op = match (row.op.to_ascii_lowercase().as_str(), row.amount) {
            ("open", amount) => Operation::Open {
                label: row.account,
                opening_balance: amount.unwrap_or_else(Money::zero),
            },
            ("deposit", Some(amount)) => Operation::Deposit {
                label: row.account,
                amount,
                description: row.description,
            },
            ("withdraw", Some(amount)) => Operation::Withdraw {
                label: row.account,
                amount,
                description: row.description,
            },
            ("transfer", Some(amount)) => {
                let to = row.to.filter(|t| !t.is_empty()).ok_or_else(|| {
                    Error::invalid_argument("transfer row needs a destination")
                })?;
                Operation::Transfer {
                    label: row.account,
                    to,
                    amount,
                    description: row.description,
                }
            }
            (other, _) => {
                return Err(Error::invalid_argument(format!(
                    "invalid operation: {}",
                    other
                )));
            }
        };
        Ok(op)
    }
}

impl<R: Read + Send + 'static> OperationStream for CsvReader<R> {
    type OpStream = Pin<Box<dyn Stream<Item = Result<Operation, Error>> + Send>>;

    fn stream(&mut self) -> Self::OpStream {
        // Take ownership of the reader so the iterator owns all data and
        // is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<Operation, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Operation::try_from(row),
                Err(e) => Err(Error::invalid_argument(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
