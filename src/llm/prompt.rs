//! Prompt builder for the Sorting Hat dialogue.
//!
//! [`PromptBuilder`] turns settings plus a [`DialogueTurn`] into the
//! `(system, user)` message pair, the token budget, and the temperature.  It
//! is a pure function of its inputs so every turn can be checked in tests.
//!
//! ```text
//! step < planned   → ask Question step+1 (first-question wording at step 0)
//! step == planned  → final sort, with the house-balance paragraph
//! step > planned   → recovery sort
//! ```

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Fixed prompt text
// ---------------------------------------------------------------------------

const AUDIENCE: &str = "Your job is to talk to a Grade 6 student who is learning English. \
Use VERY simple words and short sentences. Be friendly and easy to understand.";

const VOICE: &str = "Speak DIRECTLY to the student as the Sorting Hat. \
Do NOT say things like 'Here is my response:'. Just start talking.";

const FIRST_QUESTION_EXAMPLES: &str = "For example: 'Hello! What is your name?' or \
'Tell me, what do you like to do for fun?'. Keep your question short and simple. \
Do NOT sort the student yet.";

const NEXT_QUESTION_EXAMPLES: &str = "It should be a new, simple question to learn more \
about them. For example: 'What makes you feel brave?' or 'What is your favorite subject \
in school?'. Do NOT sort the student yet.";

/// Token budget for a question turn.
pub const QUESTION_MAX_TOKENS: u32 = 80;
/// Token budget for the sorting turn.
pub const SORTING_MAX_TOKENS: u32 = 200;

// ---------------------------------------------------------------------------
// DialogueTurn
// ---------------------------------------------------------------------------

/// Everything about the session the prompt depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    /// Questions asked so far.
    pub step: u32,
    /// Questions to ask before sorting.
    pub planned: u32,
    /// What the student said, if anything was heard.
    pub user_text: Option<String>,
    /// Personality for this session (e.g. "kind").
    pub tone: String,
}

impl DialogueTurn {
    pub fn is_question_turn(&self) -> bool {
        self.step < self.planned
    }
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds Sorting Hat chat prompts from kiosk settings.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    academy_name: String,
    house_system_name: String,
    houses: Vec<String>,
    max_students: u32,
    words_question: u32,
    words_sorting: u32,
    temperature: f32,
    max_tokens_override: u32,
}

impl PromptBuilder {
    /// Read the prompt settings through the dotted-key provider.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            academy_name: config.get("academy_name", "The Grand Academy".to_string()),
            house_system_name: config.get("house_system_name", "Great Houses".to_string()),
            houses: config.get("custom_houses", Vec::new()),
            max_students: config.get("max_students_in_class", 20),
            words_question: config.get("response_formatting.target_word_count_question", 25),
            words_sorting: config.get("response_formatting.target_word_count", 70),
            temperature: config.get("api_parameters.deepseek_temperature", 0.7),
            max_tokens_override: config.get("api_parameters.max_tokens_override", 0),
        }
    }

    /// `"A, B, C, or D"`; a single house is returned as-is.
    pub fn houses_string(&self) -> String {
        match self.houses.as_slice() {
            [] => {
                log::warn!("prompt: no houses configured");
                "a default house (if none are configured)".to_string()
            }
            [only] => only.clone(),
            [init @ .., last] => format!("{}, or {}", init.join(", "), last),
        }
    }

    /// How the class splits across houses, e.g. "2 groups with 3 students,
    /// and 2 groups with 2 students".
    pub fn balance_paragraph(&self) -> String {
        let num_houses = if self.houses.is_empty() {
            4
        } else {
            self.houses.len() as u32
        };
        let base = self.max_students / num_houses;
        let remainder = self.max_students % num_houses;

        // (size, count), larger groups first.
        let mut groups: Vec<(u32, u32)> = Vec::new();
        for i in 0..num_houses {
            let size = if i < remainder { base + 1 } else { base };
            match groups.iter_mut().find(|(s, _)| *s == size) {
                Some((_, count)) => *count += 1,
                None => groups.push((size, 1)),
            }
        }
        groups.sort_by(|a, b| b.0.cmp(&a.0));

        let descriptions: Vec<String> = groups
            .iter()
            .map(|&(size, count)| {
                let group = if count == 1 { "group" } else { "groups" };
                let student = if size == 1 { "student" } else { "students" };
                format!("{count} {group} with {size} {student}")
            })
            .collect();

        format!(
            "The maximum class size is {}. To keep the houses balanced, they should be \
organized as evenly as possible: {}. Keep this principle of balance in mind when you \
are sorting.",
            self.max_students,
            descriptions.join(", and ")
        )
    }

    /// The system message for `turn`.
    pub fn system_prompt(&self, turn: &DialogueTurn) -> String {
        let houses = self.houses_string();
        let mut parts = vec![
            format!(
                "You are an AI Sorting Hat for the {}. You are very old and very smart.",
                self.academy_name
            ),
            AUDIENCE.to_string(),
            VOICE.to_string(),
            format!("For this talk, your main personality is: {}.", turn.tone),
        ];

        if turn.step < turn.planned {
            let question_number = turn.step + 1;
            if turn.step == 0 {
                parts.push(format!(
                    "This is your first time talking. Ask the student your Question \
{question_number} to learn about them. {FIRST_QUESTION_EXAMPLES}"
                ));
            } else {
                parts.push(format!(
                    "The student answered your last question. Now, ask your Question \
{question_number}. {NEXT_QUESTION_EXAMPLES}"
                ));
            }
        } else if turn.step == turn.planned {
            parts.push(format!(
                "You have asked all your questions. This is your final answer. Based on \
what the student said, you MUST choose one of these {} for them: {houses}. {} Tell them \
the house and give a short, simple reason why you chose it. You MUST sort them now.",
                self.house_system_name,
                self.balance_paragraph()
            ));
        } else {
            parts.push(format!(
                "Something is wrong. Just sort the student into one of the {}: {houses}. \
Give a simple reason.",
                self.house_system_name
            ));
        }

        if turn.is_question_turn() {
            parts.push(format!(
                "Your question should be about {} words long.",
                self.words_question
            ));
        } else {
            parts.push(format!(
                "Your full answer should be about {} words long.",
                self.words_sorting
            ));
        }

        parts.push(format!(
            "Only use the house names I gave you: {houses}. Do not use stars (*) or long \
dashes (\u{2014}) in your answer."
        ));
        parts.join(" ")
    }

    /// The user message for `turn`.
    pub fn user_message(&self, turn: &DialogueTurn) -> String {
        match turn.user_text.as_deref() {
            None if turn.step == 0 => {
                "Please give me your first question for the student.".to_string()
            }
            Some(text) if !text.is_empty() => format!("The student says: \"{text}\"."),
            _ if turn.step > 0 => "The student's answer was not heard. Please ask another \
question to keep the conversation going."
                .to_string(),
            _ => "The student is ready for your first question.".to_string(),
        }
    }

    /// 80 tokens for a question, 200 for sorting, unless overridden.
    pub fn max_tokens(&self, turn: &DialogueTurn) -> u32 {
        if self.max_tokens_override > 0 {
            return self.max_tokens_override;
        }
        if turn.is_question_turn() {
            QUESTION_MAX_TOKENS
        } else {
            SORTING_MAX_TOKENS
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn academy_name(&self) -> &str {
        &self.academy_name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(step: u32, planned: u32, text: Option<&str>) -> DialogueTurn {
        DialogueTurn {
            step,
            planned,
            user_text: text.map(str::to_string),
            tone: "kind".into(),
        }
    }

    fn builder() -> PromptBuilder {
        PromptBuilder::from_config(&AppConfig::default())
    }

    #[test]
    fn houses_are_joined_with_oxford_or() {
        assert_eq!(
            builder().houses_string(),
            "Tesla, Darwin, Pythagoras, or Einstein"
        );

        let mut cfg = AppConfig::default();
        cfg.custom_houses = vec!["Solo".into()];
        assert_eq!(PromptBuilder::from_config(&cfg).houses_string(), "Solo");
    }

    #[test]
    fn first_turn_asks_question_one() {
        let prompt = builder().system_prompt(&turn(0, 3, None));
        assert!(prompt.starts_with(
            "You are an AI Sorting Hat for the BIBS Magical Sorting Hat."
        ));
        assert!(prompt.contains("your main personality is: kind."));
        assert!(prompt.contains("This is your first time talking. Ask the student your Question 1"));
        assert!(prompt.contains("about 25 words long"));
        assert!(!prompt.contains("MUST sort"));
    }

    #[test]
    fn middle_turn_asks_next_question() {
        let prompt = builder().system_prompt(&turn(2, 4, Some("I like cats")));
        assert!(prompt.contains("Now, ask your Question 3."));
    }

    #[test]
    fn final_turn_sorts_with_balance() {
        let prompt = builder().system_prompt(&turn(3, 3, Some("I love experiments")));
        assert!(prompt.contains("you MUST choose one of these Scientist for them"));
        assert!(prompt.contains("4 groups with 2 students"));
        assert!(prompt.contains("You MUST sort them now."));
        assert!(prompt.contains("about 70 words long"));
        assert!(prompt.ends_with("Do not use stars (*) or long dashes (\u{2014}) in your answer."));
    }

    #[test]
    fn uneven_class_lists_bigger_groups_first() {
        let mut cfg = AppConfig::default();
        cfg.max_students_in_class = 10;
        let paragraph = PromptBuilder::from_config(&cfg).balance_paragraph();
        assert!(paragraph.contains(
            "as evenly as possible: 2 groups with 3 students, and 2 groups with 2 students."
        ));
    }

    #[test]
    fn past_final_turn_uses_recovery_wording() {
        let prompt = builder().system_prompt(&turn(5, 3, None));
        assert!(prompt.contains("Something is wrong."));
    }

    #[test]
    fn user_message_variants() {
        let b = builder();
        assert_eq!(
            b.user_message(&turn(0, 3, None)),
            "Please give me your first question for the student."
        );
        assert_eq!(
            b.user_message(&turn(1, 3, Some("my name is Ana"))),
            "The student says: \"my name is Ana\"."
        );
        assert!(b
            .user_message(&turn(2, 3, None))
            .starts_with("The student's answer was not heard."));
        assert_eq!(
            b.user_message(&turn(0, 3, Some(""))),
            "The student is ready for your first question."
        );
    }

    #[test]
    fn token_budget_per_turn_and_override() {
        let b = builder();
        assert_eq!(b.max_tokens(&turn(0, 3, None)), 80);
        assert_eq!(b.max_tokens(&turn(3, 3, None)), 200);

        let mut cfg = AppConfig::default();
        cfg.api_parameters.max_tokens_override = 150;
        let b = PromptBuilder::from_config(&cfg);
        assert_eq!(b.max_tokens(&turn(0, 3, None)), 150);
    }
}
