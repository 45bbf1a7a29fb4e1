// Prompt constants for chat message sentiment analysis.

use crate::llm_client::prompts::json_system;

pub fn sentiment_system() -> String {
    json_system(
        "You are a sentiment analysis expert. You read messages that young people send \
        to a career guidance assistant and judge their emotional state.",
    )
}

/// Sentiment prompt template. Replace `{message}` before sending.
pub const SENTIMENT_PROMPT_TEMPLATE: &str = r#"Analyse the message below in a career and education context.

Choose exactly one label:
- "positive": hopeful, motivated
- "negative": sad, disappointed
- "neutral": asking for information, objective questions
- "anxious": worried, stressed, uncertain
- "excited": very positive, enthusiastic, eager
- "undecided": hesitant, unable to choose
- "unmotivated": low energy, reluctant

Score the message from -1.0 (very negative) to 1.0 (very positive), 0 being neutral.

Return a JSON object with this EXACT schema:
{"label": "anxious", "score": -0.6}

Examples:
Message: "I feel lost, I don't know what to do"
Answer: {"label": "anxious", "score": -0.6}

Message: "Great! I don't want to miss this opportunity"
Answer: {"label": "excited", "score": 0.8}

Message: "I'd like to learn about web development"
Answer: {"label": "neutral", "score": 0.1}

Message: "{message}""#;

pub fn build_sentiment_prompt(message: &str) -> String {
    SENTIMENT_PROMPT_TEMPLATE.replace("{message}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_message() {
        let prompt = build_sentiment_prompt("Which course should I take first?");
        assert!(prompt.ends_with("Message: \"Which course should I take first?\""));
        assert!(!prompt.contains("{message}"));
    }
}
