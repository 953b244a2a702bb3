#![allow(dead_code)]

use inapp_billing::application::billing::InAppBilling;
use inapp_billing::config::BillingConfig;
use inapp_billing::domain::ports::BillingClientFactoryBox;
use inapp_billing::domain::product::{ItemType, Price, ProductRecord, SubscriptionOffer};
use inapp_billing::infrastructure::sandbox::SandboxBackend;
use rust_decimal_macros::dec;
use std::fs;
use std::io::Error;
use std::path::{Path, PathBuf};

pub fn product(product_id: &str, item_type: ItemType, offers: &[&str]) -> ProductRecord {
    ProductRecord {
        product_id: product_id.to_string(),
        item_type,
        name: product_id.to_uppercase(),
        description: String::new(),
        price: Price::new(dec!(1.99), "USD"),
        offers: offers.iter().map(|t| SubscriptionOffer::new(*t)).collect(),
    }
}

/// Sandbox with two one-time products, a consumable and two subscriptions.
pub fn sandbox() -> SandboxBackend {
    SandboxBackend::with_catalog([
        product("sku_a", ItemType::InAppPurchase, &[]),
        product("sku_b", ItemType::InAppPurchase, &[]),
        product("coins", ItemType::InAppPurchaseConsumable, &[]),
        product("silver", ItemType::Subscription, &["silver-monthly", "silver-yearly"]),
        product("gold", ItemType::Subscription, &["gold-monthly"]),
    ])
}

pub fn billing_with(sandbox: &SandboxBackend, config: BillingConfig) -> InAppBilling {
    let factory: BillingClientFactoryBox = Box::new(sandbox.clone());
    InAppBilling::new(factory, config)
}

pub async fn connected(sandbox: &SandboxBackend) -> InAppBilling {
    let billing = billing_with(sandbox, BillingConfig::default());
    assert!(billing.connect_default().await.unwrap());
    billing
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, Error> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

pub const CATALOG_CSV: &str = "product_id,item_type,name,price,currency,offers\n\
sku_a,onetime,Premium,2.49,USD,\n\
coins,consumable,Coins,0.99,USD,\n\
gold,subscription,Gold,4.99,USD,gold-monthly|gold-yearly\n\
platinum,subscription,Platinum,9.99,USD,platinum-monthly\n";
