//! Basic example driving an API described by a configuration file.
//!
//! Run with:
//! ```
//! TIN_CONFIG=github.yml TIN_ENV=production cargo run --example basic
//! ```

use tin::{Call, TinClient};

#[tokio::main]
async fn main() -> tin::Result<()> {
    // Initialize tracing for debugging (optional)
    tracing_subscriber::fmt::init();

    // Build the client from TIN_CONFIG / TIN_ENV
    println!("Loading API configuration...");
    let client = TinClient::from_env()?;
    println!("Connected to: {}", client.config().base_url());

    // Walk the endpoint tree
    println!("\n--- Methods ---");
    for method in client.root().all_methods() {
        println!("  {} {} {}", method.verb(), method.path(), method);
    }

    // Call the first method that needs no path tokens
    let Some(method) = client
        .root()
        .all_methods()
        .into_iter()
        .find(|m| m.path_tokens().is_empty())
    else {
        println!("\nNo token-free method to call");
        return Ok(());
    };

    println!("\n--- Calling {method} ---");
    let response = method.invoke(&client, Call::new()).await?;
    println!("Status: {}", response.response().status);

    let models = response.models();
    if models.is_empty() {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("Found {} models", models.len());
        for model in models.iter().take(5) {
            println!("  - {model}");
        }
    }

    Ok(())
}
