//! Model listing functionality

use std::error::Error;

use chrono::{DateTime, Utc};

use crate::api::models::sort_models;
use crate::api::{ModelInfo, ModelSubType, ModelType};
use crate::cli::CliContext;

pub async fn list_models(
    context: &CliContext,
    model_type: Option<ModelType>,
    sub_type: Option<ModelSubType>,
) -> Result<(), Box<dyn Error>> {
    let client = context.client()?;
    let models_response = client.get_models(model_type, sub_type).await?;

    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if models_response.data.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    println!(
        "Found {} models (sorted newest first):",
        models_response.data.len()
    );
    println!();

    let mut models = models_response.data;
    sort_models(&mut models);
    for model in &models {
        for line in describe_model(model) {
            println!("{line}");
        }
        println!();
    }
    Ok(())
}

fn describe_model(model: &ModelInfo) -> Vec<String> {
    let mut lines = vec![format!("  • {}", model.id)];
    if let Some(owned_by) = &model.owned_by {
        if !owned_by.is_empty() && owned_by != "system" {
            lines.push(format!("    Owner: {owned_by}"));
        }
    }
    if let Some(created) = model.created.and_then(format_created) {
        lines.push(format!("    Created: {created}"));
    }
    lines
}

/// Some APIs report milliseconds, others seconds.
fn format_created(created: u64) -> Option<String> {
    if created == 0 {
        return None;
    }
    let secs = if created > 10_000_000_000 {
        created / 1000
    } else {
        created
    };
    let secs = i64::try_from(secs).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_accepts_seconds_and_milliseconds() {
        assert_eq!(
            format_created(1_700_000_000).as_deref(),
            Some("2023-11-14 22:13:20 UTC")
        );
        assert_eq!(
            format_created(1_700_000_000_000).as_deref(),
            Some("2023-11-14 22:13:20 UTC")
        );
        assert_eq!(format_created(0), None);
    }

    #[test]
    fn system_owner_is_not_shown() {
        let model = ModelInfo {
            id: "m".to_string(),
            object: None,
            created: None,
            owned_by: Some("system".to_string()),
        };
        assert_eq!(describe_model(&model), vec!["  • m"]);
    }
}
