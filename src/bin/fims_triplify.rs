use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use fims_triplifier::carryover::{
    carry_sequences, count_attachments, fetch_ids, parse_fasta, sequence_root, upload_fasta,
};
use fims_triplifier::config::{ConfigLoader, ResolvedConfig};
use fims_triplifier::error::FimsError;
use fims_triplifier::identifier::{ExpeditionContext, IdentifierAuthority};
use fims_triplifier::mapping::CompileNote;
use fims_triplifier::output::{JsonOutput, TableFormat, print_table};
use fims_triplifier::persistence::{
    DatasetPersistence, FilePersistence, Project, TriplestorePersistence, default_graph_root,
};
use fims_triplifier::query::{ConstructQuery, FilterCondition};
use fims_triplifier::snapshot::MemorySnapshot;
use fims_triplifier::triplestore::{FusekiClient, Triplestore};
use fims_triplifier::vocab::SEQUENCE;

#[derive(Parser)]
#[command(name = "fims-triplify")]
#[command(about = "Triplify collection datasets into versioned named graphs and query them back")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write the mapping and triple files for a snapshot")]
    Triplify(TriplifyArgs),
    #[command(about = "Triplify a snapshot and upload it as a new dataset graph")]
    Upload(UploadArgs),
    #[command(about = "Reconstruct tabular records from dataset graphs")]
    Query(QueryArgs),
    #[command(about = "Copy sequences from one dataset graph into the next")]
    Carryover(CarryoverArgs),
    #[command(about = "Count identifiers and attached sequences per graph")]
    Count(CountArgs),
    #[command(about = "Attach FASTA sequences to the latest dataset graph")]
    Fasta(FastaArgs),
    #[command(about = "List sequence root identifiers in the latest dataset graph")]
    Ids(ExpeditionArgs),
}

#[derive(Args, Clone)]
struct ExpeditionArgs {
    #[arg(long)]
    project: u32,

    #[arg(long)]
    expedition: String,
}

#[derive(Args)]
struct TriplifyArgs {
    snapshot: PathBuf,

    #[command(flatten)]
    expedition: ExpeditionArgs,

    /// Keep the mapping and triple files instead of removing them.
    #[arg(long)]
    keep: bool,
}

#[derive(Args)]
struct UploadArgs {
    snapshot: PathBuf,

    #[command(flatten)]
    expedition: ExpeditionArgs,

    /// Store graphs as files under this directory instead of a triplestore.
    #[arg(long)]
    store_dir: Option<Utf8PathBuf>,

    /// Check the snapshot against the mapping without uploading.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    expedition: ExpeditionArgs,

    /// Graphs to query; defaults to the latest dataset graph.
    #[arg(long = "graph")]
    graphs: Vec<String>,

    /// `value`, `<property>=value` or `AND:<property>=value`.
    #[arg(long = "filter")]
    filters: Vec<FilterCondition>,

    #[arg(long, value_enum, default_value = "json")]
    format: TableFormat,

    #[arg(long)]
    require_rows: bool,
}

#[derive(Args)]
struct CarryoverArgs {
    #[arg(long)]
    previous: String,

    #[arg(long)]
    new: String,
}

#[derive(Args)]
struct CountArgs {
    #[arg(long = "graph")]
    graphs: Vec<String>,
}

#[derive(Args)]
struct FastaArgs {
    file: PathBuf,

    #[command(flatten)]
    expedition: ExpeditionArgs,
}

#[derive(Serialize)]
struct TriplifySummary {
    triples: usize,
    mapping_file: Option<String>,
    triple_file: Option<String>,
    notes: Vec<CompileNote>,
}

#[derive(Serialize)]
struct ValidationSummary {
    valid: bool,
    errors: Vec<CompileNote>,
}

#[derive(Serialize)]
struct CarryoverSummary {
    previous: String,
    new: String,
    carried: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(fims) = report.downcast_ref::<FimsError>() {
            return ExitCode::from(map_exit_code(fims));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FimsError) -> u8 {
    match error {
        FimsError::MissingConfig
        | FimsError::ConfigRead(_)
        | FimsError::ConfigParse(_)
        | FimsError::UnknownEntity(_)
        | FimsError::InvalidAttribute { .. }
        | FimsError::MissingSequenceRoot(_) => 2,
        FimsError::TriplestoreHttp(_)
        | FimsError::TriplestoreStatus { .. }
        | FimsError::SparqlResults(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Triplify(args) => run_triplify(args, &resolved),
        Commands::Upload(args) => run_upload(args, &resolved),
        Commands::Query(args) => run_query(args, &resolved),
        Commands::Carryover(args) => run_carryover(args, &resolved),
        Commands::Count(args) => run_count(args, &resolved),
        Commands::Fasta(args) => run_fasta(args, &resolved),
        Commands::Ids(args) => run_ids(args, &resolved),
    }
}

fn project<'a>(resolved: &'a ResolvedConfig, args: &ExpeditionArgs) -> miette::Result<Project<'a>> {
    Ok(Project::resolve(
        &resolved.settings,
        &resolved.mapping,
        &resolved.validation,
        &resolved.authority,
        ExpeditionContext::new(args.project, args.expedition.clone()),
    )?)
}

fn fuseki(resolved: &ResolvedConfig) -> miette::Result<FusekiClient> {
    let service = resolved.settings.service.clone().ok_or_else(|| {
        FimsError::ConfigParse("settings.service is required for this command".to_string())
    })?;
    Ok(FusekiClient::new(service, resolved.settings.timeout)?)
}

fn latest_graph(resolved: &ResolvedConfig, args: &ExpeditionArgs) -> miette::Result<String> {
    let graph = resolved
        .authority
        .dataset_graphs(args.project, &args.expedition)?
        .into_iter()
        .next()
        .ok_or_else(|| FimsError::NoDataset {
            project_id: args.project,
            expedition_code: args.expedition.clone(),
        })?;
    Ok(graph)
}

fn run_triplify(args: TriplifyArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let snapshot = MemorySnapshot::from_path(&args.snapshot)?;
    let project = project(resolved, &args.expedition)?;
    let run = project
        .triplifier()
        .run(&snapshot, &format!("{}_output", args.expedition.expedition))?;
    let triples = run.triples.len();
    let notes = run.description.notes.clone();
    let (mapping_file, triple_file) = if args.keep {
        let (mapping, triple) = run.persist()?;
        (Some(mapping.to_string()), Some(triple.to_string()))
    } else {
        run.cleanup();
        (None, None)
    };
    JsonOutput::print(&TriplifySummary {
        triples,
        mapping_file,
        triple_file,
        notes,
    })
    .into_diagnostic()
}

fn run_upload(args: UploadArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let snapshot = MemorySnapshot::from_path(&args.snapshot)?;
    let project = project(resolved, &args.expedition)?;

    let store = match (&args.store_dir, &resolved.settings.service) {
        (None, Some(_)) => Some(fuseki(resolved)?),
        _ => None,
    };
    let mut persistence: Box<dyn DatasetPersistence + '_> = match (&store, args.store_dir) {
        (Some(store), _) => Box::new(TriplestorePersistence::new(project, store, &resolved.authority)),
        (None, Some(dir)) => Box::new(FilePersistence::new(project, &resolved.authority, dir)),
        (None, None) => Box::new(FilePersistence::new(
            project,
            &resolved.authority,
            default_graph_root()?,
        )),
    };

    let errors = persistence.validate(&snapshot)?;
    if args.dry_run {
        return JsonOutput::print(&ValidationSummary {
            valid: errors.is_empty(),
            errors,
        })
        .into_diagnostic();
    }
    let receipt = persistence.upload(&snapshot)?;
    JsonOutput::print(&receipt).into_diagnostic()
}

fn run_query(args: QueryArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let store = fuseki(resolved)?;
    let project = project(resolved, &args.expedition)?;
    let graphs = if args.graphs.is_empty() {
        vec![latest_graph(resolved, &args.expedition)?]
    } else {
        args.graphs
    };
    let query = ConstructQuery::new(graphs.clone(), resolved.settings.root_class.clone())
        .with_filters(args.filters)?;
    let triples = store.construct(&query)?;
    let mut model = project.reconstructor().reconstruct(&triples);
    if args.require_rows {
        model = model.require_rows(&graphs)?;
    }
    print_table(&model, args.format).into_diagnostic()
}

fn run_carryover(args: CarryoverArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let store = fuseki(resolved)?;
    let carried = carry_sequences(&store, &resolved.mapping, &args.previous, &args.new)?;
    JsonOutput::print(&CarryoverSummary {
        previous: args.previous,
        new: args.new,
        carried,
    })
    .into_diagnostic()
}

fn run_count(args: CountArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let store = fuseki(resolved)?;
    let root = sequence_root(&resolved.mapping)
        .ok_or_else(|| FimsError::MissingSequenceRoot(SEQUENCE.to_string()))?;
    let counts = count_attachments(&store, &args.graphs, &root.concept_uri, SEQUENCE)?;
    JsonOutput::print(&counts).into_diagnostic()
}

fn run_fasta(args: FastaArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let store = fuseki(resolved)?;
    let project = project(resolved, &args.expedition)?;
    let graph = latest_graph(resolved, &args.expedition)?;
    let text = fs::read_to_string(&args.file)
        .map_err(|err| FimsError::Filesystem(format!("read {}: {err}", args.file.display())))?;
    let sequences = parse_fasta(&text)?;
    upload_fasta(&store, &resolved.mapping, &project.identifiers, &graph, &sequences)?;
    JsonOutput::print(&serde_json::json!({
        "graph": graph,
        "sequences": sequences.len(),
    }))
    .into_diagnostic()
}

fn run_ids(args: ExpeditionArgs, resolved: &ResolvedConfig) -> miette::Result<()> {
    let store = fuseki(resolved)?;
    let project = project(resolved, &args)?;
    let graph = resolved
        .authority
        .dataset_graphs(args.project, &args.expedition)?
        .into_iter()
        .next();
    let ids = fetch_ids(&store, &resolved.mapping, &project.identifiers, graph.as_deref())?;
    JsonOutput::print(&ids).into_diagnostic()
}
