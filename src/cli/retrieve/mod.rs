//! Retrieve command - knowledge base lookup

use clap::Args;

#[derive(Debug, Args)]
pub struct RetrieveArgs {
    pub query: String,

    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long)]
    pub threshold: Option<f32>,

    #[arg(long)]
    pub category: Option<String>,

    /// Print passages as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RetrieveArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let services = crate::build_services(&config).await?;

    let passages = services
        .orchestrator
        .retrieve(&args.query, args.top_k, args.threshold, args.category)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&passages)?);
        return Ok(());
    }

    if passages.is_empty() {
        println!("No passage cleared the similarity threshold.");
        return Ok(());
    }

    for (rank, passage) in passages.iter().enumerate() {
        println!(
            "{}. [{}] {}  similarity={:.3}  score={:.3}",
            rank + 1,
            passage.document_id,
            passage.title,
            passage.similarity_score,
            passage.final_score()
        );
    }

    Ok(())
}
