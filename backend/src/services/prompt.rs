use crate::models::emotion::EmotionType;

/// Synthesis prompt for a meme of `emotion` based on the photo `caption`.
pub fn build_prompt(caption: &str, emotion: EmotionType) -> String {
    format!(
        "A meme-style sticker image based on this description: {}. Requirements: \
         1. clearly express the emotion {} ({}); \
         2. exaggerated, vivid expression; \
         3. suitable for use as a meme; \
         4. clean, simple background; \
         5. high quality, sharp image.",
        caption.trim(),
        emotion.display_name(),
        emotion.description()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_caption_and_emotion() {
        let prompt = build_prompt("a cat on a sofa", EmotionType::Sad);
        assert!(prompt.contains("a cat on a sofa"));
        assert!(prompt.contains(EmotionType::Sad.display_name()));
        assert!(prompt.contains(EmotionType::Sad.description()));
        assert!(prompt.contains("background"));
    }

    #[test]
    fn prompt_is_deterministic() {
        assert_eq!(
            build_prompt("dog", EmotionType::Calm),
            build_prompt("dog", EmotionType::Calm)
        );
        assert_ne!(
            build_prompt("dog", EmotionType::Calm),
            build_prompt("dog", EmotionType::Angry)
        );
    }
}
