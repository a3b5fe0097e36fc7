//! Ask command - one generation from the terminal

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::GenerationRequest;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The customer question
    pub question: String,

    /// Answer without knowledge base context
    #[arg(long)]
    pub no_rag: bool,

    /// Only try this provider
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long)]
    pub threshold: Option<f32>,

    /// Restrict retrieval to one document category
    #[arg(long)]
    pub category: Option<String>,

    /// Reorder cost-flexible providers by observed cost
    #[arg(long)]
    pub cost_aware: bool,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskArgs {
    fn to_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::prompt(self.question.clone());
        request.use_rag = !self.no_rag;
        request.top_k = self.top_k;
        request.similarity_threshold = self.threshold;
        request.category = self.category.clone();
        request.provider_override = self.provider.clone();
        if self.cost_aware {
            request.cost_aware = Some(true);
        }
        request
    }
}

pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let services = crate::build_services(&config).await?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling generation");
            on_interrupt.cancel();
        }
    });

    let result = services
        .orchestrator
        .generate_with_cancellation(args.to_request(), token)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match (result.content(), result.function_call()) {
        (Some(content), _) => println!("{}", content),
        (None, Some(call)) => println!("{}({})", call.name, call.arguments),
        (None, None) => {}
    }

    println!();
    println!(
        "provider: {} ({})  confidence: {:.2}  tokens: {}/{}  cost: ${:.6}  latency: {}ms",
        result.provider_used,
        result.model,
        result.confidence,
        result.tokens_in,
        result.tokens_out,
        result.cost_micros as f64 / 1_000_000.0,
        result.latency_ms
    );
    if !result.sources.is_empty() {
        println!("sources: {}", result.sources.join(", "));
    }
    for failure in &result.failed_attempts {
        println!("skipped {}: {} ({})", failure.provider, failure.kind, failure.message);
    }

    Ok(())
}
