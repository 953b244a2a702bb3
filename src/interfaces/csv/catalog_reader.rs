use crate::domain::product::{ItemType, Price, ProductRecord, SubscriptionOffer};
use crate::error::AppError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRow {
    product_id: String,
    item_type: ItemType,
    name: String,
    price: Decimal,
    currency: String,
    #[serde(default)]
    offers: Option<String>,
}

impl From<CatalogRow> for ProductRecord {
    fn from(row: CatalogRow) -> Self {
        let offers = row
            .offers
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(SubscriptionOffer::new)
            .collect();
        ProductRecord {
            product_id: row.product_id,
            item_type: row.item_type,
            description: String::new(),
            name: row.name,
            price: Price::new(row.price, row.currency),
            offers,
        }
    }
}

/// Reads sandbox catalog entries from a CSV source.
///
/// Expected header: `product_id, item_type, name, price, currency, offers`,
/// where `offers` holds `|`-separated subscription offer tokens.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn products(self) -> impl Iterator<Item = Result<ProductRecord, AppError>> {
        self.reader
            .into_deserialize::<CatalogRow>()
            .map(|result| result.map(ProductRecord::from).map_err(AppError::from))
    }
}
