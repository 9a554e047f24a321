use serde::Serialize;

/// Mood requested for the generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmotionType {
    #[default]
    Happy,
    Sad,
    Angry,
    Surprised,
    Confused,
    Excited,
    Calm,
    Shy,
    Playful,
}

impl EmotionType {
    pub const ALL: [EmotionType; 9] = [
        EmotionType::Happy,
        EmotionType::Sad,
        EmotionType::Angry,
        EmotionType::Surprised,
        EmotionType::Confused,
        EmotionType::Excited,
        EmotionType::Calm,
        EmotionType::Shy,
        EmotionType::Playful,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EmotionType::Happy => "happy",
            EmotionType::Sad => "sad",
            EmotionType::Angry => "angry",
            EmotionType::Surprised => "surprised",
            EmotionType::Confused => "confused",
            EmotionType::Excited => "excited",
            EmotionType::Calm => "calm",
            EmotionType::Shy => "shy",
            EmotionType::Playful => "playful",
        }
    }

    /// Label shown to users and returned as the result's emotion label.
    pub fn display_name(&self) -> &'static str {
        match self {
            EmotionType::Happy => "高兴",
            EmotionType::Sad => "伤心",
            EmotionType::Angry => "生气",
            EmotionType::Surprised => "惊讶",
            EmotionType::Confused => "困惑",
            EmotionType::Excited => "兴奋",
            EmotionType::Calm => "平静",
            EmotionType::Shy => "害羞",
            EmotionType::Playful => "调皮",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EmotionType::Happy => "a joyful, cheerful face beaming with a big smile",
            EmotionType::Sad => "a sorrowful, heartbroken face with tears",
            EmotionType::Angry => "a furious, fuming face with a fierce glare",
            EmotionType::Surprised => "an astonished, shocked face with wide-open eyes",
            EmotionType::Confused => "a puzzled, bewildered face full of doubt",
            EmotionType::Excited => "a thrilled, hyped face, practically dancing",
            EmotionType::Calm => "a serene, peaceful and relaxed face",
            EmotionType::Shy => "a bashful, timid face with blushing cheeks",
            EmotionType::Playful => "a mischievous, cheeky face pulling a silly grin",
        }
    }

    /// Resolves a code (`"sad"`, case-insensitive) or display label (`"伤心"`).
    /// Anything unrecognised maps to [`EmotionType::Happy`].
    pub fn resolve(input: &str) -> Self {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.code().eq_ignore_ascii_case(input) || e.display_name() == input)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_codes_case_insensitively() {
        assert_eq!(EmotionType::resolve("SAD"), EmotionType::Sad);
        assert_eq!(EmotionType::resolve(" playful "), EmotionType::Playful);
    }

    #[test]
    fn resolves_display_labels() {
        assert_eq!(EmotionType::resolve("害羞"), EmotionType::Shy);
        assert_eq!(EmotionType::resolve("惊讶"), EmotionType::Surprised);
    }

    #[test]
    fn unknown_input_defaults_to_happy() {
        assert_eq!(EmotionType::resolve(""), EmotionType::Happy);
        assert_eq!(EmotionType::resolve("melancholic"), EmotionType::Happy);
        assert_eq!(EmotionType::resolve("🙂"), EmotionType::Happy);
    }

    #[test]
    fn every_variant_has_labels() {
        for emotion in EmotionType::ALL {
            assert!(!emotion.display_name().is_empty());
            assert!(!emotion.description().is_empty());
            assert_eq!(EmotionType::resolve(emotion.code()), emotion);
        }
    }
}
