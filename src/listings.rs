use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

/// Base instruction for the assistant, used alone when no catalog is available
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant for a vacation rental website. Help users find the perfect rental for their needs.";

/// A single vacation-rental record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub rating: f64,
    #[serde(default, alias = "availability_window")]
    pub availability: String,
}

/// The rentals data document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub rentals: Vec<Listing>,
}

#[derive(Debug, Error)]
pub enum ListingsError {
    #[error("failed to read listings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch listings: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listings request returned {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse listings: {0}")]
    Parse(#[from] serde_json::Error),
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load the catalog from a file path or an http(s) URL
pub async fn load_catalog(source: &str, http: &reqwest::Client) -> Result<Catalog, ListingsError> {
    let body = if is_remote(source) {
        let response = http.get(source).send().await?;
        if !response.status().is_success() {
            return Err(ListingsError::Status(response.status()));
        }
        response.text().await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|source_err| ListingsError::Io {
                path: source.to_string(),
                source: source_err,
            })?
    };

    let catalog: Catalog = serde_json::from_str(&body)?;
    log::info!("Loaded {} rental listings from {}", catalog.rentals.len(), source);
    Ok(catalog)
}

/// Build the system prompt describing every listing
pub fn build_system_prompt(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return FALLBACK_SYSTEM_PROMPT.to_string();
    }

    let mut prompt = String::from(FALLBACK_SYSTEM_PROMPT);
    prompt.push_str(
        "\n\nOnly recommend rentals from this list, and mention the name, location and rating when you do:\n",
    );

    for listing in listings {
        let _ = write!(
            prompt,
            "\n- {} ({}), rated {}/5.",
            listing.name, listing.location, listing.rating
        );
        if !listing.description.is_empty() {
            let _ = write!(prompt, " {}", listing.description.trim());
        }
        if !listing.availability.is_empty() {
            let _ = write!(prompt, " Available: {}.", listing.availability.trim());
        }
    }

    prompt
}

/// Pick the system prompt for a catalog load. A failed load is not fatal.
pub fn system_prompt_for(result: Result<Catalog, ListingsError>) -> String {
    match result {
        Ok(catalog) => build_system_prompt(&catalog.rentals),
        Err(e) => {
            log::warn!("Using generic system prompt: {}", e);
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}
