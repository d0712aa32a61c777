use once_cell::sync::Lazy;

pub const DEFAULT_TEXT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

/// A model known to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub vision: bool,
}

pub static MODEL_CATALOG: Lazy<Vec<ModelInfo>> = Lazy::new(|| {
    vec![
        ModelInfo {
            id: DEFAULT_TEXT_MODEL,
            label: "Llama 3.3 70B (best for text)",
            vision: false,
        },
        ModelInfo {
            id: "llama-3.1-8b-instant",
            label: "Llama 3.1 8B Instant (fast)",
            vision: false,
        },
        ModelInfo {
            id: DEFAULT_VISION_MODEL,
            label: "Llama 4 Maverick (vision)",
            vision: true,
        },
        ModelInfo {
            id: "meta-llama/llama-4-scout-17b-16e-instruct",
            label: "Llama 4 Scout (vision)",
            vision: true,
        },
        ModelInfo {
            id: "mixtral-8x7b-32768",
            label: "Mixtral 8x7B (legacy)",
            vision: false,
        },
    ]
});

/// Outcome of the vision policy for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    pub substituted: bool,
}

/// Whether a model accepts image parts. Unknown ids fall back to a name check.
pub fn supports_vision(model: &str) -> bool {
    if let Some(info) = MODEL_CATALOG.iter().find(|info| info.id == model) {
        return info.vision;
    }
    let lower = model.to_lowercase();
    lower.contains("llama-4") || lower.contains("vision")
}

/// Pick the model for a submission: an image forces a vision-capable model.
pub fn resolve_model(selected: &str, has_image: bool, vision_model: &str) -> ModelChoice {
    if has_image && !supports_vision(selected) {
        ModelChoice {
            model: vision_model.to_string(),
            substituted: true,
        }
    } else {
        ModelChoice {
            model: selected.to_string(),
            substituted: false,
        }
    }
}

/// Resolve user input as a 1-based catalog index or a model id.
///
/// Ids outside the catalog are accepted as-is so newer models can be used.
pub fn lookup(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(index) = input.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| MODEL_CATALOG.get(i))
            .map(|info| info.id.to_string());
    }
    Some(input.to_string())
}

/// Render the catalog as numbered lines, marking the selected model.
pub fn catalog_listing(selected: &str) -> String {
    MODEL_CATALOG
        .iter()
        .enumerate()
        .map(|(i, info)| {
            let marker = if info.id == selected { "▶" } else { " " };
            let eye = if info.vision { " 👁" } else { "" };
            format!("{} {}. {} — {}{}", marker, i + 1, info.id, info.label, eye)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
