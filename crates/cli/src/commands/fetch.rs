use adoption_insights_client::InsightsClient;
use adoption_insights_core::{EntityType, Filters, PageRange};
use anyhow::{bail, Result};

pub(crate) async fn run(entity: EntityType, start: usize, end: usize, filters: Filters) -> Result<()> {
    if end <= start {
        bail!("--end ({end}) must be greater than --start ({start})");
    }
    let client = InsightsClient::from_env()?;
    let page = client
        .fetch_page::<serde_json::Value>(entity, &filters, PageRange::new(start, end))
        .await?;
    let output = serde_json::json!({
        "entity": entity,
        "start": start,
        "end": end,
        "totalCount": page.total_count,
        "records": page.records,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
