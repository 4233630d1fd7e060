use std::sync::Arc;

use checkout_journal::init::init_tracing;
use checkout_journal::{LogFacade, LoggerConfig, Payload};
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Stand-in for the cart rule: at most one item per order.
fn cart_allows_checkout(item_count: u32) -> bool {
    item_count <= 1
}

fn visit(journal: &LogFacade, item_count: u32) {
    let mut payload = Payload::new();
    let event = if cart_allows_checkout(item_count) {
        "visit_commander"
    } else {
        "block_checkout_legacy"
    };
    payload.insert("event".into(), json!(event));
    payload.insert("cart_count".into(), json!(item_count));
    payload.insert("ip_hash".into(), json!("5e884898da28"));

    if let Err(err) = journal.log_structured(&payload) {
        eprintln!("visit not journaled: {err}");
    }
}

#[tokio::main]
async fn main() {
    let config = LoggerConfig::from_env().unwrap_or_default();
    let journal: Arc<LogFacade> = LogFacade::assemble(config);

    if let Err(err) = init_tracing(Arc::clone(&journal)) {
        eprintln!("tracing not installed: {err}");
    }

    visit(&journal, 1);
    visit(&journal, 3);
    warn!(target: "shop::checkout", cart_count = 3, "checkout attempted with several items");

    // let the layer flush
    sleep(Duration::from_millis(1500)).await;

    println!("{}", journal.tail(10));
}
