//! `image_qa`: zero-shot questions about a single image with CLIP.
//!
//! The question picks a list of candidate answers; each candidate is scored
//! against the image and the scores are turned into probabilities.

use crate::inference::{cosine_similarity, ClipEncoder, ToolSpec};
use crate::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

pub const NAME: &str = "image_qa";

const DESCRIPTION: &str = "Answer questions about food or restaurant images directly. \
Use this tool when the user wants to understand what's in a specific image without \
searching for similar restaurants. Can identify cuisine types, describe dishes, \
detect ingredients, and analyze presentation. Does NOT perform retrieval.";

/// CLIP logit scale applied to cosine similarities
const LOGIT_SCALE: f32 = 100.0;

const TOP_ANSWERS: usize = 3;

/// Confidence (percent) above which the best answer is called out
const CONFIDENT_PERCENT: f32 = 50.0;

const CUISINES: &[&str] = &[
    "Italian cuisine", "Chinese cuisine", "Japanese cuisine", "Mexican cuisine",
    "Indian cuisine", "Thai cuisine", "French cuisine", "American cuisine",
    "Mediterranean cuisine", "Korean cuisine", "Vietnamese cuisine", "Greek cuisine",
];

const DISHES: &[&str] = &[
    "a pizza", "a pasta dish", "a burger", "a salad", "a soup",
    "a sandwich", "a steak", "seafood", "a dessert", "a rice dish",
    "noodles", "a vegetable dish", "fried food", "grilled food", "baked food",
];

const INGREDIENTS: &[&str] = &[
    "vegetables", "meat", "seafood", "cheese", "pasta", "rice",
    "bread", "sauce", "herbs", "spices", "chicken", "beef",
    "pork", "fish", "tofu", "eggs", "mushrooms", "tomatoes",
];

const SETTINGS: &[&str] = &[
    "formal dining", "casual dining", "fast food", "fine dining",
    "outdoor seating", "indoor seating", "modern decor", "traditional decor",
    "cozy atmosphere", "elegant setting",
];

const PROTEINS: &[&str] = &[
    "chicken", "beef", "pork", "fish", "shrimp", "tofu",
    "lamb", "turkey", "duck", "seafood", "no protein (vegetarian)",
];

const GENERAL: &[&str] = &[
    "yes", "no", "possibly", "likely", "unlikely",
    "a food dish", "a restaurant setting", "a beverage",
    "multiple items", "unclear from image",
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImageQaArgs {
    pub image_path: String,
    pub question: String,
}

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: DESCRIPTION.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Path to the image file to analyze"
                },
                "question": {
                    "type": "string",
                    "description": "Question to answer about the image. Can be about cuisine type, dish description, ingredients, presentation, etc."
                }
            },
            "required": ["image_path", "question"]
        }),
    }
}

/// Candidate answers for a question, chosen by keywords (first match wins)
pub fn answer_candidates(question: &str) -> &'static [&'static str] {
    let question = question.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| question.contains(word));

    if mentions(&["cuisine", "type of food", "what kind"]) {
        CUISINES
    } else if mentions(&["describe", "what is this", "what dish"]) {
        DISHES
    } else if mentions(&["ingredient", "what's in", "contains"]) {
        INGREDIENTS
    } else if mentions(&["setting", "dining", "atmosphere", "ambiance"]) {
        SETTINGS
    } else if mentions(&["protein", "main ingredient"]) {
        PROTEINS
    } else {
        GENERAL
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}

/// Render the top answers and the verdict
pub fn format_answer(question: &str, candidates: &[&str], probabilities: &[f32]) -> String {
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(TOP_ANSWERS.min(candidates.len()));

    let mut response = format!("Question: {}\n\nAnswer based on image analysis:\n", question);
    for (rank, (index, probability)) in ranked.iter().enumerate() {
        response.push_str(&format!(
            "{}. {} (confidence: {:.1}%)\n",
            rank + 1,
            candidates[*index],
            probability * 100.0
        ));
    }

    match ranked.first() {
        Some((index, probability)) if probability * 100.0 > CONFIDENT_PERCENT => {
            response.push_str(&format!("\nMost likely: {}", candidates[*index]));
        }
        _ => response.push_str(
            "\nNote: Low confidence in all answers. The image may not clearly show the requested information.",
        ),
    }

    response
}

#[instrument(skip(clip))]
async fn analyze(clip: &ClipEncoder, args: &ImageQaArgs) -> Result<String> {
    let image = clip.embed_image(&args.image_path).await?;

    let candidates = answer_candidates(&args.question);
    let labels: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
    let label_embeddings = clip.embed_labels(&labels).await?;

    let logits: Vec<f32> = label_embeddings
        .iter()
        .map(|label| LOGIT_SCALE * cosine_similarity(&image, label))
        .collect();

    Ok(format_answer(&args.question, candidates, &softmax(&logits)))
}

pub async fn run(clip: &ClipEncoder, args: ImageQaArgs) -> String {
    match analyze(clip, &args).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("{} failed: {}", NAME, e);
            format!("Error analyzing image: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_by_keyword() {
        assert_eq!(answer_candidates("What cuisine is this?").len(), 12);
        assert_eq!(answer_candidates("Describe the plate"), DISHES);
        assert_eq!(answer_candidates("Which INGREDIENTS are visible?"), INGREDIENTS);
        assert_eq!(answer_candidates("Is this fine dining?"), SETTINGS);
        assert_eq!(answer_candidates("What's the protein here?"), PROTEINS);
        assert_eq!(answer_candidates("Is it spicy?"), GENERAL);
    }

    #[test]
    fn test_candidates_first_match_wins() {
        // "what kind" is checked before "dining"
        assert_eq!(answer_candidates("What kind of dining is this?"), CUISINES);
        // "ingredient" is checked before "main ingredient"
        assert_eq!(answer_candidates("What is the main ingredient?"), INGREDIENTS);
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 1.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);

        let probs = softmax(&[100.0, 0.0, 0.0]);
        assert!(probs[0] > 0.99);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_format_confident_answer() {
        let text = format_answer(
            "What dish is this?",
            &["a pizza", "a burger", "a salad", "a soup"],
            &[0.05, 0.8, 0.1, 0.05],
        );

        assert_eq!(
            text,
            "Question: What dish is this?\n\nAnswer based on image analysis:\n\
             1. a burger (confidence: 80.0%)\n\
             2. a salad (confidence: 10.0%)\n\
             3. a pizza (confidence: 5.0%)\n\
             \nMost likely: a burger"
        );
    }

    #[test]
    fn test_format_low_confidence() {
        let text = format_answer("Is it good?", &["yes", "no"], &[0.5, 0.5]);

        assert!(text.contains("1. yes (confidence: 50.0%)"));
        assert!(text.contains("2. no (confidence: 50.0%)"));
        assert!(text.ends_with(
            "Note: Low confidence in all answers. The image may not clearly show the requested information."
        ));
    }

    #[tokio::test]
    async fn test_missing_image_reports_error() {
        let clip = ClipEncoder::new(std::env::temp_dir());
        let output = run(
            &clip,
            ImageQaArgs {
                image_path: "/no/such/photo.jpg".into(),
                question: "What cuisine?".into(),
            },
        )
        .await;

        assert!(output.starts_with("Error analyzing image: "));
        assert!(output.contains("/no/such/photo.jpg"));
    }
}
