use moodring_schemas::Influence;

/// Prompt templates for the two reflection flows
pub struct PromptBuilder;

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Weekly themes prompt. Entries are listed in the order given, one bullet each.
    pub fn weekly(&self, influences: &[Influence]) -> String {
        let entries = influences
            .iter()
            .map(|i| format!("- {}", i.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a helpful and insightful reflection assistant. Based on the following journal \
             entries from a user's past week, identify 1-2 emerging themes or patterns in their \
             thinking. Write a short, encouraging reflection (2-3 sentences) directly to the user.\n\
             \n\
             Here are the user's entries:\n\
             {entries}"
        )
    }

    /// Connection analysis prompt for one influence and the influences linked to it.
    pub fn connections(&self, main: &Influence, linked: &[Influence]) -> String {
        let linked_lines = linked
            .iter()
            .map(|i| format!("- \"{}\"", i.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a thoughtful reflection assistant helping a user understand how their \
             thoughts connect.\n\
             \n\
             Main Thought: \"{main}\"\n\
             \n\
             Linked Influences:\n\
             {linked_lines}\n\
             \n\
             Analyze the relationship or shared theme between the main thought and its linked \
             influences. End with one reflective question for the user. Keep the response concise \
             and encouraging.",
            main = main.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use moodring_schemas::InfluenceId;

    fn influence(id: i64, content: &str) -> Influence {
        Influence {
            id: InfluenceId(id),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_weekly_prompt_bullets_every_entry() {
        let prompt = PromptBuilder::new().weekly(&[
            influence(1, "Read a book on stoicism"),
            influence(2, "Had a hard conversation with a friend"),
        ]);

        assert!(prompt.contains("identify 1-2 emerging themes"));
        assert!(prompt.contains("(2-3 sentences)"));
        assert!(prompt.ends_with(
            "Here are the user's entries:\n- Read a book on stoicism\n- Had a hard conversation with a friend"
        ));
    }

    #[test]
    fn test_connection_prompt_quotes_linked_influences() {
        let prompt = PromptBuilder::new().connections(
            &influence(1, "Started journaling daily"),
            &[influence(2, "Felt calmer this week"), influence(3, "Slept better")],
        );

        assert!(prompt.contains("Main Thought: \"Started journaling daily\""));
        assert!(prompt.contains("Linked Influences:\n- \"Felt calmer this week\"\n- \"Slept better\""));
        assert!(prompt.contains("one reflective question"));
    }
}
