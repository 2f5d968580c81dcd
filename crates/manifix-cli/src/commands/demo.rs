//! The `demo` command: repair the bundled broken manifest

use manifix_core::{Controller, RepairBank, RepairConfig, SynthStatus, Verifier};
use manifix_k8s::{
    artifact_context, default_proposal, standard_oracles, K8sArtifact, BROKEN_DEPLOYMENT,
};
use std::path::PathBuf;

/// Run the demo; returns `Ok(true)` on a successful repair.
pub async fn run(out: Option<PathBuf>, bank: Option<PathBuf>) -> anyhow::Result<bool> {
    println!("Repairing the bundled broken payments-api deployment");
    println!();

    let artifact = K8sArtifact::from_files([(
        "deployment.yaml".to_string(),
        BROKEN_DEPLOYMENT.to_string(),
    )]);

    let verifier = Verifier::new(standard_oracles());
    let initial = verifier.verify(&artifact);
    println!("Initial violations ({}):", initial.len());
    for violation in &initial {
        println!("  - {}: {}", violation.id, violation.message);
    }
    println!();

    let mut controller = Controller::new(
        verifier,
        default_proposal(&artifact),
        RepairConfig::default(),
    );
    if let Some(bank_path) = bank {
        let bank = RepairBank::open(&bank_path);
        println!("Bank: {} ({} entries)", bank_path.display(), bank.len());
        controller = controller.with_bank(bank);
    }

    let report = controller.repair(&artifact, artifact_context(&artifact)).await?;

    println!("Status: {:?}", report.status);
    println!("Candidates tried: {}", report.candidates_tried);
    println!("Constraints learned: {}", report.constraints_learned.len());
    if let Some(assignment) = &report.assignment {
        println!("Winning assignment:");
        for (hole, value) in assignment {
            println!("  {hole} = {value}");
        }
    }

    if report.status != SynthStatus::Success {
        return Ok(false);
    }

    if let Some(out) = out {
        report.artifact.write_to_dir(&out, None)?;
        println!("Wrote repaired manifest to {}", out.display());
    } else {
        println!();
        println!("Repaired manifest:");
        for (_, content) in report.artifact.files() {
            println!("{content}");
        }
    }
    Ok(true)
}
