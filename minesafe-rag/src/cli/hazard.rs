use std::path::Path;

use console::style;

use minesafe_rag::config::Config;
use minesafe_rag::domain::{Detection, RiskLevel};
use minesafe_rag::server::HazardResponse;
use minesafe_rag::{MineRagError, Result};

use super::{open_pipeline, print_degraded, print_json, print_references};

pub async fn run(
    config: &Config,
    detections_file: &Path,
    top_k: Option<usize>,
    conf: Option<f32>,
    json: bool,
) -> Result<()> {
    let detections = read_detections(detections_file)?;
    let (pipeline, _) = open_pipeline(config, true).await?;

    let response = HazardResponse::from(pipeline.hazard(detections, top_k, conf).await?);
    if json {
        return print_json(&response);
    }
    print_hazard(&response);
    Ok(())
}

/// Accepts a bare JSON array of detector records.
fn read_detections(path: &Path) -> Result<Vec<Detection>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| MineRagError::InvalidDetection(format!("{}: {e}", path.display())))
}

fn print_hazard(response: &HazardResponse) {
    let risk = match response.risk_level {
        RiskLevel::Critical => style(response.risk_level.as_str()).red().bold(),
        RiskLevel::Elevated => style(response.risk_level.as_str()).yellow().bold(),
        RiskLevel::Low => style(response.risk_level.as_str()).green(),
        RiskLevel::Unknown => style(response.risk_level.as_str()).dim(),
    };
    println!("{} {risk}", style("Risk:").bold());
    println!("{}", response.hazard_summary);
    println!("{} {}\n", style("Query:").dim(), response.rag_query);

    if let Some(error) = &response.error {
        print_degraded(error.kind, &error.message);
    }
    if let Some(answer) = &response.answer {
        println!("{}", style("Checklist").bold());
        println!("{answer}\n");
    }
    print_references(&response.references);
}
