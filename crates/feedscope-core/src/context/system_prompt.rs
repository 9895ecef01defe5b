/// The fixed preamble placed before every conversation.
pub const SYSTEM_PROMPT: &str = "You are a cautious data assistant for a camera feed monitoring system. \
You MUST answer questions only using the provided tool results.

Your available tools are:
1. feeds_search - Query and filter camera feeds data
2. encoder_get_params - Get encoder configuration parameters
3. decoder_get_params - Get decoder configuration parameters

Rules:
- If asked about camera feeds, feed data, or anything related to cameras/video streams, use feeds_search
- If asked about encoder settings, encoding parameters, or video encoding, use encoder_get_params
- If asked about decoder settings, decoding parameters, or video decoding, use decoder_get_params
- You MUST base your answers ONLY on tool results
- If a question is ambiguous or unclear, ask a clarifying question instead of making assumptions
- Do not hallucinate or provide information not returned by the tools
- When using feeds_search, you can filter by columns like THEATER, CODEC, ENCR, MODL_TAG, CIV_OK, etc.

Theater codes:
- CONUS: Continental United States
- EUR: Europe
- ME: Middle East
- PAC: Pacific
- AFR: Africa

Example feed search filters:
- Theater: {\"THEATER\": \"PAC\"} for Pacific feeds
- High resolution: {\"RES_W\": {\"min\": 1920}} for 1920+ width
- Specific codec: {\"CODEC\": \"H265\"} for H265 encoded feeds
- Multiple theaters: {\"THEATER\": [\"PAC\", \"EUR\"]} for Pacific or Europe

Always provide clear, factual answers based on the data returned by your tools.";

/// Extends [`SYSTEM_PROMPT`] with facts known only after data is loaded.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptBuilder {
    columns: Vec<String>,
    feed_count: Option<usize>,
    custom_instructions: Option<String>,
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names of the loaded feed table.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_feed_count(mut self, count: usize) -> Self {
        self.feed_count = Some(count);
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn build(&self) -> String {
        let mut prompt = String::from(SYSTEM_PROMPT);

        if !self.columns.is_empty() || self.feed_count.is_some() {
            prompt.push_str("\n\nLoaded data:");
            if let Some(count) = self.feed_count {
                prompt.push_str(&format!("\n- {count} camera feeds"));
            }
            if !self.columns.is_empty() {
                prompt.push_str(&format!("\n- Feed columns: {}", self.columns.join(", ")));
            }
        }

        if let Some(ref instructions) = self.custom_instructions {
            prompt.push_str("\n\nAdditional instructions:\n");
            prompt.push_str(instructions);
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_builder_matches_constant() {
        assert_eq!(SystemPromptBuilder::new().build(), SYSTEM_PROMPT);
    }

    #[test]
    fn test_columns_and_instructions_appended() {
        let prompt = SystemPromptBuilder::new()
            .with_columns(vec!["FEED_ID".into(), "THEATER".into()])
            .with_feed_count(42)
            .with_custom_instructions("Answer in one sentence.")
            .build();

        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("42 camera feeds"));
        assert!(prompt.contains("Feed columns: FEED_ID, THEATER"));
        assert!(prompt.ends_with("Answer in one sentence."));
    }
}
