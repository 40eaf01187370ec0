//! Fixed prompt text and the message layouts sent to the completion API.

use crate::completion::{CompletionRequest, PromptMessage};

/// Client sentinel asking the assistant to introduce itself.
pub const GREETING_SENTINEL: &str = "[SALUDO_INICIAL_SISTEMA]";

pub const CHAT_SYSTEM_PROMPT: &str = "Eres Pulso, un asistente de pre-diagnóstico y bienestar. \
Conversas con pacientes en español, de forma cálida y clara. Haces preguntas breves para \
entender síntomas, hábitos de sueño, alimentación, actividad física y estrés. No emites \
diagnósticos definitivos ni recetas medicamentos; ante síntomas de alarma recomiendas acudir \
a urgencias. Cuando el paciente lo pida, propones un plan de nutrición con desayuno, almuerzo \
y cena.";

pub const GREETING_INSTRUCTION: &str = "Preséntate brevemente ante el paciente: di quién eres, \
en qué puedes ayudarle durante este pre-diagnóstico y hazle una primera pregunta sobre cómo \
se siente hoy.";

/// Shown when a patient has no stored messages yet. Never persisted.
pub const WELCOME_MESSAGE: &str = "¡Hola! Soy Pulso, tu asistente de salud. Cuéntame cómo te \
sientes hoy y empezamos tu pre-diagnóstico.";

pub const FOOD_SYSTEM_PROMPT: &str = "You are a nutrition analysis engine. Given a free-text \
description of food, estimate its nutritional content. Respond with strict JSON only, no prose \
and no markdown, exactly in this shape: {\"calories\": <number>, \"nutrients\": {\"protein\": \
\"<grams>g\", \"carbs\": \"<grams>g\", \"fat\": \"<grams>g\"}}";

pub fn is_greeting_sentinel(text: &str) -> bool {
    text.trim() == GREETING_SENTINEL
}

/// Builds the chat layout: fixed system instruction, optional caller system
/// prompt, then the user turn. The greeting sentinel is swapped for the
/// introduction instruction.
pub fn chat_request(user_message: &str, system_prompt: Option<&str>) -> CompletionRequest {
    let mut messages = vec![PromptMessage::system(CHAT_SYSTEM_PROMPT)];

    if let Some(extra) = system_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(PromptMessage::system(extra));
    }

    let user_turn = if is_greeting_sentinel(user_message) {
        GREETING_INSTRUCTION
    } else {
        user_message
    };
    messages.push(PromptMessage::user(user_turn));

    CompletionRequest::new(messages)
}

pub fn food_request(food_text: &str) -> CompletionRequest {
    CompletionRequest::json(vec![
        PromptMessage::system(FOOD_SYSTEM_PROMPT),
        PromptMessage::user(food_text.trim()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::PromptRole;

    #[test]
    fn test_sentinel_becomes_introduction() {
        let req = chat_request(GREETING_SENTINEL, None);
        assert_eq!(req.messages.len(), 2);
        let last = req.messages.last().unwrap();
        assert_eq!(last.role, PromptRole::User);
        assert_eq!(last.content, GREETING_INSTRUCTION);
        assert!(req.messages.iter().all(|m| !m.content.contains(GREETING_SENTINEL)));
    }

    #[test]
    fn test_plain_message_is_forwarded_verbatim() {
        let req = chat_request("me duele la cabeza", None);
        assert_eq!(req.messages[0].content, CHAT_SYSTEM_PROMPT);
        assert_eq!(req.messages[1].content, "me duele la cabeza");
        assert!(!req.json_mode);
    }

    #[test]
    fn test_caller_system_prompt_is_second_system_message() {
        let req = chat_request("hola", Some("Paciente diabético"));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[1].role, PromptRole::System);
        assert_eq!(req.messages[1].content, "Paciente diabético");
        assert_eq!(req.messages[2].role, PromptRole::User);
    }

    #[test]
    fn test_blank_caller_prompt_is_dropped() {
        assert_eq!(chat_request("hola", Some("   ")).messages.len(), 2);
    }

    #[test]
    fn test_food_request_is_json_mode() {
        let req = food_request("  two eggs and toast ");
        assert!(req.json_mode);
        assert_eq!(req.messages[1].content, "two eggs and toast");
    }
}
