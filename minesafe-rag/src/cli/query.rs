use console::style;

use minesafe_rag::Result;
use minesafe_rag::config::Config;
use minesafe_rag::server::{AnswerResponse, RetrieveResponse};

use super::{open_pipeline, print_degraded, print_json, print_references, snippet};

const SNIPPET_CHARS: usize = 240;

pub async fn run(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    retrieve_only: bool,
    json: bool,
) -> Result<()> {
    let (pipeline, _) = open_pipeline(config, true).await?;

    if retrieve_only {
        let response = RetrieveResponse::from(pipeline.retrieve(text, top_k).await?);
        if json {
            return print_json(&response);
        }
        print_passages(&response);
        return Ok(());
    }

    let response = AnswerResponse::from(pipeline.answer(text, top_k).await?);
    if json {
        return print_json(&response);
    }
    print_answer(&response);
    Ok(())
}

fn print_passages(response: &RetrieveResponse) {
    if let Some(error) = &response.error {
        print_degraded(error.kind, &error.message);
        return;
    }
    if response.results.is_empty() {
        println!("No passages found for \"{}\"", response.query);
        return;
    }
    for result in &response.results {
        println!(
            "{}. {} p.{} ({}) {}",
            result.rank,
            style(&result.source_path).cyan(),
            result.page_number,
            result.doc_type,
            style(format!("score {:.3}", result.score)).dim()
        );
        println!("   {}\n", snippet(&result.text, SNIPPET_CHARS));
    }
}

fn print_answer(response: &AnswerResponse) {
    if let Some(error) = &response.error {
        print_degraded(error.kind, &error.message);
    }
    match &response.answer {
        Some(answer) => println!("{answer}\n"),
        None => println!("{}\n", style("No answer was generated.").yellow()),
    }
    print_references(&response.references);
}
