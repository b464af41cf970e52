//! Image understanding: send a chart or screenshot to a vision model.

use std::path::Path;

use base64::Engine;

use super::{CompletionOptions, LlmClient, Message};

const DEFAULT_IMAGE_PROMPT: &str =
    "Analyze this chart and describe the main trends and key data points.";

/// Read an image and return it as a `data:` URL.
pub fn encode_image(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime_type(path), encoded))
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
}

/// Ask the model about an image.
pub async fn analyze_image(
    client: &dyn LlmClient,
    image_path: &Path,
    prompt: Option<&str>,
    model: Option<String>,
) -> anyhow::Result<String> {
    let url = encode_image(image_path)
        .map_err(|e| anyhow::anyhow!("Failed to read image {}: {}", image_path.display(), e))?;
    let messages = [Message::user_with_image(
        prompt.unwrap_or(DEFAULT_IMAGE_PROMPT),
        url,
    )];
    let reply = client
        .complete(&messages, &CompletionOptions::with_model(model))
        .await?;
    Ok(reply)
}

/// Analyze a spreadsheet chart screenshot, optionally with background context.
pub async fn analyze_chart(
    client: &dyn LlmClient,
    image_path: &Path,
    context: Option<&str>,
    model: Option<String>,
) -> anyhow::Result<String> {
    analyze_image(client, image_path, Some(&chart_prompt(context)), model).await
}

fn chart_prompt(context: Option<&str>) -> String {
    let mut prompt = String::from("You are a data analysis expert. Analyze this spreadsheet chart:\n");
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nContext: {}\n", context));
    }
    prompt.push_str(
        "\nPlease provide:\n1. Chart type\n2. Main trends\n3. Key data points\n4. Recommendations",
    );
    prompt
}
