//! # `docextract` Library Crate
//!
//! Command definitions and handlers for the `docextract` binary: single-field
//! extraction, batch evaluation against reference data, and web search.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docextract::{
    create_provider, AgentSettings, ConfigError, DocumentKind, DocumentRef, DocumentType,
    Evaluator, ExtractionAgent, ExtractionRequest, FactualityScorer, FetcherRouter,
    HttpReferenceSource, ProviderConfig, ProviderKind,
};
use docextract_ocr::{ImageFetcher, TesseractCli};
use docextract_pdf::PdfFetcher;
use docextract_search::{BraveSearchTool, WebSearchAgent};
use std::{
    env,
    io::{self, BufRead, Write},
    sync::Arc,
};
use tracing::info;

pub use docextract::config::load_dotenv;

pub const DOCUMENT_TYPE_PROMPT: &str = "Please provide the document type - Receipt OR Contract?";

// --- CLI Argument Structs ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub provider: ProviderArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract one field from a receipt image or a contract PDF
    Extract(ExtractArgs),
    /// Score receipt extraction against the reference data
    Eval(EvalArgs),
    /// Answer a question using web search
    Search(SearchArgs),
}

/// Model provider selection, shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// The model provider: openai, gemini or local.
    #[arg(long, env = "AI_PROVIDER", default_value = "openai", global = true)]
    pub ai_provider: ProviderKind,
    /// The model name. `LLM_MODEL` is also honored.
    #[arg(long, env = "AI_MODEL", global = true)]
    pub ai_model: Option<String>,
    /// Overrides the provider's default endpoint.
    #[arg(long, env = "AI_API_URL", global = true)]
    pub ai_api_url: Option<String>,
    #[arg(long, env = "AI_API_KEY", hide_env_values = true, global = true)]
    pub ai_api_key: Option<String>,
    /// Bounds each model call and each fetch.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,
    #[arg(long, env = "EXTRACTION_RETRIES", default_value_t = 2, global = true)]
    pub retries: usize,
}

impl ProviderArgs {
    pub fn provider_config(&self) -> ProviderConfig {
        let model = self
            .ai_model
            .clone()
            .or_else(|| env::var("LLM_MODEL").ok());
        ProviderConfig::resolve(
            self.ai_provider,
            model,
            self.ai_api_url.clone(),
            self.ai_api_key.clone(),
        )
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            retries: self.retries,
            timeout_secs: self.timeout_secs,
            ..AgentSettings::default()
        }
    }
}

/// Where receipt images and reference data come from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Base URL serving `img/{index}.jpg` and `key/{index}.json`.
    #[arg(long, env = "RAW_DATA_URL")]
    pub raw_data_url: Option<String>,
    /// Tesseract language codes used for OCR.
    #[arg(long, env = "TESSERACT_LANG", default_value = "eng")]
    pub tesseract_lang: String,
}

impl SourceArgs {
    pub fn require_raw_data_url(&self) -> Result<&str, ConfigError> {
        self.raw_data_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("RAW_DATA_URL"))
    }
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Receipt or Contract. Asked for interactively when omitted.
    #[arg(long)]
    pub document_type: Option<DocumentType>,
    /// The receipt index.
    #[arg(long, default_value = "069")]
    pub index: String,
    /// Path or URL of the contract PDF.
    #[arg(long, default_value = "ChinaRealEstateInformationCorp_20090929_1.pdf")]
    pub file: String,
    /// The field to extract. Defaults to `company` for receipts and `licensor` for contracts.
    #[arg(long)]
    pub field: Option<String>,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Number of receipts to evaluate, starting at index 000.
    #[arg(long, default_value_t = 3)]
    pub count: usize,
    #[arg(long, value_delimiter = ',', default_value = "company,date,address,total")]
    pub fields: Vec<String>,
    /// Maximum (receipt, field) pairs evaluated at once.
    #[arg(long, default_value_t = docextract::eval::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Print the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
    /// Also grade every scored value with the model.
    #[arg(long)]
    pub factuality: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub question: String,
    /// Without a key the search tool returns a placeholder result.
    #[arg(long, env = "BRAVE_API_KEY", hide_env_values = true)]
    pub brave_api_key: Option<String>,
}

// --- Helpers ---

/// Asks a question on `output` and reads one line from `input`; an empty
/// answer selects the default.
pub fn input_with_default<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    prompt: &str,
    default: &str,
) -> io::Result<String> {
    write!(output, "{prompt} [{default}]: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

/// Zero-padded receipt indices `000..count`.
pub fn receipt_indices(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{i:03}")).collect()
}

pub fn default_field(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Receipt => "company",
        DocumentType::Contract => "licensor",
    }
}

/// Routes image documents to OCR (when a content source is configured) and
/// PDF documents to the PDF reader.
pub fn build_fetcher(client: &reqwest::Client, source: &SourceArgs) -> FetcherRouter {
    let mut router = FetcherRouter::new().route(
        DocumentKind::Pdf,
        Arc::new(PdfFetcher::new(client.clone())),
    );
    if let Ok(base_url) = source.require_raw_data_url() {
        let engine = TesseractCli::new().with_language(source.tesseract_lang.clone());
        router = router.route(
            DocumentKind::Image,
            Arc::new(ImageFetcher::new(client.clone(), base_url, Arc::new(engine))),
        );
    }
    router
}

fn resolve_document_type(requested: Option<DocumentType>) -> Result<DocumentType> {
    if let Some(document_type) = requested {
        return Ok(document_type);
    }
    let answer = input_with_default(
        io::stdin().lock(),
        io::stdout(),
        DOCUMENT_TYPE_PROMPT,
        "Receipt",
    )?;
    answer.parse().map_err(anyhow::Error::msg)
}

// --- Public Entrypoint ---

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract(args) => handle_extract(&cli.provider, args).await,
        Commands::Eval(args) => handle_eval(&cli.provider, args).await,
        Commands::Search(args) => handle_search(&cli.provider, args).await,
    }
}

// --- Command Handlers ---

async fn handle_extract(provider_args: &ProviderArgs, args: ExtractArgs) -> Result<()> {
    let document_type = resolve_document_type(args.document_type)?;
    let document = match document_type {
        DocumentType::Receipt => {
            args.source.require_raw_data_url()?;
            DocumentRef::image(args.index.clone())
        }
        DocumentType::Contract => DocumentRef::pdf(args.file.clone()),
    };
    let field = args
        .field
        .clone()
        .unwrap_or_else(|| default_field(document_type).to_string());
    info!("Extracting '{}' from {}", field, document);

    let client = reqwest::Client::new();
    let provider = create_provider(&provider_args.provider_config(), client.clone())?;
    let fetcher = build_fetcher(&client, &args.source);
    let agent = ExtractionAgent::new(provider, document_type, Arc::new(fetcher))
        .with_settings(provider_args.agent_settings());

    let result = agent
        .extract(ExtractionRequest::new(document, field))
        .await?;
    println!("Response: {}", serde_json::to_string(&result)?);
    Ok(())
}

async fn handle_eval(provider_args: &ProviderArgs, args: EvalArgs) -> Result<()> {
    let base_url = args.source.require_raw_data_url()?;
    let documents: Vec<DocumentRef> = receipt_indices(args.count)
        .into_iter()
        .map(DocumentRef::image)
        .collect();
    info!(
        "Evaluating {} receipt(s) on fields {:?}",
        documents.len(),
        args.fields
    );

    let client = reqwest::Client::new();
    let provider = create_provider(&provider_args.provider_config(), client.clone())?;
    let fetcher = build_fetcher(&client, &args.source);
    let settings = provider_args.agent_settings();
    let judge = FactualityScorer::new(provider.clone()).with_timeout(settings.timeout());
    let agent = ExtractionAgent::new(provider, DocumentType::Receipt, Arc::new(fetcher))
        .with_settings(settings);
    let references = Arc::new(HttpReferenceSource::new(client, base_url));

    let mut evaluator = Evaluator::new(agent, references).with_concurrency(args.concurrency);
    if args.factuality {
        info!("Grading factuality with the extraction model");
        evaluator = evaluator.with_factuality(judge);
    }
    let report = evaluator.evaluate(&documents, &args.fields).await?;

    if args.json {
        println!("{}", report.to_json().context("Failed to serialize the report")?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

async fn handle_search(provider_args: &ProviderArgs, args: SearchArgs) -> Result<()> {
    let client = reqwest::Client::new();
    let provider = create_provider(&provider_args.provider_config(), client.clone())?;
    let search = BraveSearchTool::new(client, args.brave_api_key.clone());
    let agent =
        WebSearchAgent::new(provider, search).with_settings(provider_args.agent_settings());

    let answer = agent.ask(&args.question).await?;
    println!("{answer}");
    Ok(())
}
