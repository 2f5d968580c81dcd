//! The `repair` command: load, repair, report, write

use anyhow::{bail, Context};
use manifix_ai::{LlmConfig, LlmError, LlmProposer, ModelId};
use manifix_core::{
    Controller, RepairBank, RepairConfig, RepairReport, SynthBudget, SynthStatus, TemplateSource,
    Verifier,
};
use manifix_k8s::{artifact_context, default_proposal, standard_oracles, K8sArtifact};
use std::path::PathBuf;
use std::time::Duration;

/// Options for one repair invocation.
pub struct RepairOptions {
    /// Input manifest path
    pub input: PathBuf,
    /// Output directory
    pub out: PathBuf,
    /// Optional output filename override
    pub output_filename: Option<String>,
    /// Candidate budget
    pub max_candidates: u32,
    /// No-progress iteration budget
    pub max_iters: u32,
    /// Wall-clock budget in seconds
    pub timeout_secs: u64,
    /// Bank file, or `None` when the bank is disabled
    pub bank: Option<PathBuf>,
    /// Whether to try the LLM proposer
    pub use_proposer: bool,
    /// Model override for the proposer
    pub model: Option<String>,
}

/// Run a repair; returns `Ok(true)` when the manifest ends up compliant.
pub async fn run(options: RepairOptions) -> anyhow::Result<bool> {
    if !options.input.exists() {
        bail!("input file not found: {}", options.input.display());
    }
    println!("Repairing: {}", options.input.display());

    let artifact = K8sArtifact::from_file(&options.input)
        .with_context(|| format!("failed to read {}", options.input.display()))?;

    let budget = SynthBudget::default()
        .with_max_candidates(options.max_candidates)
        .with_max_iters(options.max_iters)
        .with_timeout(Duration::from_secs(options.timeout_secs));

    let mut controller = Controller::new(
        Verifier::new(standard_oracles()),
        default_proposal(&artifact),
        RepairConfig::default().with_budget(budget),
    );

    if let Some(bank_path) = &options.bank {
        let bank = RepairBank::open(bank_path);
        if let Some(error) = bank.load_error() {
            eprintln!("Warning: bank file was corrupted, starting empty ({error})");
        }
        println!("Bank: {} ({} entries)", bank_path.display(), bank.len());
        controller = controller.with_bank(bank);
    } else {
        println!("Bank: disabled");
    }

    if options.use_proposer {
        let config = match &options.model {
            Some(model) => LlmConfig::with_model(ModelId::parse(model)),
            None => LlmConfig::default(),
        };
        match LlmProposer::from_config(config) {
            Ok(proposer) => {
                println!("Proposer: {}", proposer.model_id());
                controller = controller.with_proposer(Box::new(proposer));
            }
            Err(LlmError::NotConfigured) => {
                println!("Proposer: not configured (set ANTHROPIC_API_KEY or OPENAI_API_KEY)");
            }
            Err(e) => {
                eprintln!("Warning: proposer unavailable: {e}");
            }
        }
    } else {
        println!("Proposer: disabled (--no-proposer)");
    }

    let context = artifact_context(&artifact);
    let report = controller.repair(&artifact, context).await?;
    print_summary(&report);

    match report.status {
        SynthStatus::NoViolationsInitially => {
            println!("Manifest already passes all oracles, no repair needed");
            Ok(true)
        }
        SynthStatus::Success => {
            report
                .artifact
                .write_to_dir(&options.out, options.output_filename.as_deref())
                .with_context(|| format!("failed to write output to {}", options.out.display()))?;
            let written = options
                .output_filename
                .clone()
                .or_else(|| report.artifact.files().next().map(|(n, _)| n.to_string()))
                .unwrap_or_default();
            println!("Repair successful, wrote {}/{written}", options.out.display());
            Ok(true)
        }
        status => {
            println!("Repair failed: {status:?}");
            Ok(false)
        }
    }
}

fn print_summary(report: &RepairReport<K8sArtifact>) {
    println!();
    println!("Status: {:?}", report.status);
    let source = match report.template_source {
        Some(TemplateSource::Bank) => "bank (hit)",
        Some(TemplateSource::Proposer) => "proposer",
        Some(TemplateSource::Default) => "default template",
        None => "none needed",
    };
    println!("Template source: {source}");
    println!("Iterations: {}", report.iterations);
    println!("Candidates tried: {}", report.candidates_tried);
    println!("Constraints learned: {}", report.constraints_learned.len());
}
