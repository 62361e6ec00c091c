use std::time::Duration;

use flipt_provider::{CallContext, FeatureProvider, FlattenedContext, TARGETING_KEY};

#[tokio::main]
async fn main() -> flipt_provider::Result<()> {
    // Configure env_logger to see provider logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("flipt")).init();

    let address = std::env::var("FLIPT_ADDRESS")
        .unwrap_or_else(|_| flipt_provider::ProviderConfig::DEFAULT_ADDRESS.to_owned());
    let provider = flipt_provider::ProviderConfig::new()
        .address(address)
        .to_provider()?;

    let context = FlattenedContext::from([
        (TARGETING_KEY.to_owned(), "test-subject".into()),
        ("plan".to_owned(), "pro".into()),
    ]);

    // Give up on the backend after a second; the default is returned instead.
    let cx = CallContext::new().with_timeout(Duration::from_secs(1));

    let detail = provider
        .boolean_evaluation(&cx, "default/a-boolean-flag", false, Some(&context))
        .await;

    println!("Resolved: {:?}", detail);

    Ok(())
}
