//! One-shot smoke test of a RAG backend.
//!
//! Exercises settings, semantic search, knowledge-filter listing, and
//! document ingestion and deletion in a single pass, printing each section's
//! result or error. Failures in one section do not stop the rest.

use ragline::RagClient;
use ragline::config::Settings;
use ragline::rag::SearchOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let api_key = settings.require_api_key()?;
    let client = RagClient::new(&settings.base_url, api_key)?;

    println!("=== Settings ===");
    println!("{settings}");
    match client.get_settings().await {
        Ok(backend_settings) => {
            println!("{}", serde_json::to_string_pretty(&backend_settings)?);
        }
        Err(err) => eprintln!("settings: {err}"),
    }

    println!("\n=== Search ===");
    let options = SearchOptions {
        limit: Some(5),
        score_threshold: Some(0.3),
        filter_id: None,
    };
    match client.search("document processing", &options).await {
        Ok(response) => {
            println!("{} results", response.results.len());
            for hit in response.results {
                println!(
                    "  {} (score: {})",
                    hit.filename.as_deref().unwrap_or("?"),
                    hit.score.map(|s| format!("{s:.3}")).unwrap_or_default()
                );
            }
        }
        Err(err) => eprintln!("search: {err}"),
    }

    println!("\n=== Knowledge Filters ===");
    match client.search_filters("").await {
        Ok(filters) => {
            println!("{} filters", filters.len());
            for filter in filters {
                println!("  {} {}", filter.id, filter.name.as_deref().unwrap_or("?"));
            }
        }
        Err(err) => eprintln!("filters: {err}"),
    }

    println!("\n=== Documents ===");
    let doc_path = std::env::temp_dir().join("test_document.md");
    tokio::fs::write(
        &doc_path,
        "# Test Document\n\nThis document exists to verify ingestion.\n",
    )
    .await?;
    match client.ingest_document(&doc_path, true).await {
        Ok(result) => {
            println!(
                "ingested: status={:?} ok={:?} failed={:?}",
                result.status, result.successful_files, result.failed_files
            );
            match client.delete_document("test_document.md").await {
                Ok(_) => println!("deleted test_document.md"),
                Err(err) => eprintln!("delete: {err}"),
            }
        }
        Err(err) => eprintln!("ingest: {err}"),
    }
    let _ = tokio::fs::remove_file(&doc_path).await;

    Ok(())
}
