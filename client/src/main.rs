//! Minimal CLI wrapper around the dispatcher: reads a cluster address list
//! and a JSON request body, fans it out, and prints the winning response.

use ringchat_client::{Dispatcher, Request};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let nodes_csv = args.next().ok_or_else(|| anyhow::anyhow!("usage: ringchat-cli <host:port,...> <json-body>"))?;
    let body_json = args.next().ok_or_else(|| anyhow::anyhow!("usage: ringchat-cli <host:port,...> <json-body>"))?;

    let node_addrs: Vec<String> = nodes_csv.split(',').map(|s| s.to_string()).collect();
    let body: serde_json::Value = serde_json::from_str(&body_json)?;

    let request = Request { id: uuid::Uuid::new_v4().to_string(), body };

    let dispatcher = Dispatcher::new(node_addrs);
    let response = dispatcher.dispatch(&request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
