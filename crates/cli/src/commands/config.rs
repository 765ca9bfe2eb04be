use adoption_insights_core::BatchLoadConfig;
use anyhow::Result;

pub(crate) fn run() -> Result<()> {
    let config = BatchLoadConfig::from_env();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
