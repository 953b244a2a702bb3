use crate::domain::purchase::{PurchaseRecord, PurchaseState};
use crate::error::AppError;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct PurchaseRow<'a> {
    product_id: &'a str,
    purchase_token: &'a str,
    state: PurchaseState,
    acknowledged: bool,
}

/// Writes purchases as CSV, one row per purchase.
pub struct PurchaseWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PurchaseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_purchases<'a, I>(&mut self, purchases: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = &'a PurchaseRecord>,
    {
        for purchase in purchases {
            self.writer.serialize(PurchaseRow {
                product_id: purchase.product_id(),
                purchase_token: &purchase.purchase_token,
                state: purchase.state,
                acknowledged: purchase.acknowledged,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_rows() {
        let mut first = PurchaseRecord::new("coins", "tok-1");
        first.acknowledged = true;
        let second = PurchaseRecord::new("gold", "tok-2");

        let mut out = Vec::new();
        PurchaseWriter::new(&mut out)
            .write_purchases([&first, &second])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "product_id,purchase_token,state,acknowledged\n\
             coins,tok-1,purchased,true\n\
             gold,tok-2,purchased,false\n"
        );
    }
}
