//! Prompt templates for the map and reduce stages
//!
//! PRIVATE MODULE - Not exported from crate

use graphsearch_core::prompt::render;

pub const MAP_SYSTEM: &str = include_str!("../assets/prompts/map_system.txt");

pub const REDUCE_SYSTEM: &str = include_str!("../assets/prompts/reduce_system.txt");

pub const GENERAL_KNOWLEDGE_INSTRUCTION: &str =
    include_str!("../assets/prompts/general_knowledge.txt");

const LANGUAGE_INSTRUCTION: &str = include_str!("../assets/prompts/language_instruction.txt");

/// Instruction block appended to prompts when a response language is requested
pub fn language_instruction(language: Option<&str>) -> String {
    match language.map(str::trim).filter(|l| !l.is_empty()) {
        Some(language) => render(LANGUAGE_INSTRUCTION, &[("language", language)]),
        None => String::new(),
    }
}

/// Appends the user query the way every stage prompt ends
pub fn with_user_query(prompt: &str, query: &str) -> String {
    format!("{prompt}\n\nUser Query: {query}")
}
