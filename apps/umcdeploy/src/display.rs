//! Terminal output.
//!
//! Progress and results go to stdout; diagnostics from `tracing` go to
//! stderr so they never interleave with the URLs a user copies.

use umcdeploy_publish::{DeploymentRecord, PublishEvent, PublishResult, PublishStage};

pub fn banner() {
    println!("umcdeploy {}", env!("CARGO_PKG_VERSION"));
    println!();
}

pub fn step(message: &str) {
    println!("==> {message}");
}

fn stage_label(stage: PublishStage) -> &'static str {
    match stage {
        PublishStage::CheckingBuild => "Checking build directory",
        PublishStage::HealthCheck => "Checking store node",
        PublishStage::Ingesting => "Adding files",
        PublishStage::Announcing => "Announcing content",
        PublishStage::Pinning => "Pinning content",
        PublishStage::Recording => "Saving deployment record",
    }
}

pub fn event(event: &PublishEvent) {
    match event {
        PublishEvent::Stage(stage) => step(stage_label(*stage)),
        PublishEvent::Warning(warning) => println!("    warning: {warning}"),
        PublishEvent::Completed { cid } => println!("==> Published {cid}"),
        PublishEvent::Failed { .. } => {}
    }
}

pub fn results(result: &PublishResult, previous: Option<&DeploymentRecord>, ens_domain: Option<&str>) {
    println!();
    println!("Deployment complete");
    println!("  CID:      {}", result.cid);
    println!("  IPFS URL: {}", result.ipfs_url);
    println!("  Pinned:   {}", if result.pinned { "yes" } else { "no" });

    if let Some(previous) = previous {
        if result.cid.same_content(&previous.cid) {
            println!("  Content unchanged since {}", previous.timestamp.format("%Y-%m-%d %H:%M UTC"));
        } else {
            println!("  Replaces: {}", previous.cid);
        }
    }

    if !result.urls.is_empty() {
        println!();
        println!("Gateway URLs:");
        for (i, url) in result.urls.iter().enumerate() {
            println!("  {}. {url}", i + 1);
        }
    }

    if !result.is_clean() {
        println!();
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }

    println!();
    println!("Next steps:");
    println!("  1. Open one of the gateway URLs to verify the deployment");
    match ens_domain {
        Some(domain) => println!("  2. Point the content hash of {domain} at ipfs://{}", result.cid),
        None => println!("  2. Point your DNS or ENS record at ipfs://{}", result.cid),
    }
    if !result.pinned {
        println!("  3. Pin the content with a pinning service so it stays available");
    }
}

pub fn failure(error: &anyhow::Error) {
    eprintln!("error: {error:#}");
}
