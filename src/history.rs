//! Conversation history windowing for the biodiversity chat.

use crate::completion::{ChatMessage, Role};

/// The last `turns` user/assistant exchanges of `history`, ready to resend.
///
/// Only the most recent user message with an image keeps its image; older image messages
/// are dropped. Everything else is reduced to its text, and empty messages are skipped.
pub fn recent_window(history: &[ChatMessage], turns: usize) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(turns.saturating_mul(2));
    let window = &history[start..];

    let latest_image = window
        .iter()
        .rposition(|m| m.role == Role::User && m.has_image());

    window
        .iter()
        .enumerate()
        .filter_map(|(i, message)| {
            if Some(i) == latest_image {
                return Some(message.clone());
            }
            if message.role == Role::User && message.has_image() {
                return None;
            }
            let text = message.text();
            if text.trim().is_empty() {
                None
            } else {
                Some(ChatMessage::new(message.role, text))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = "data:image/png;base64,AA";

    #[test]
    fn test_keeps_last_turns_in_order() {
        let history: Vec<ChatMessage> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("pregunta {}", i / 2))
                } else {
                    ChatMessage::assistant(format!("respuesta {}", i / 2))
                }
            })
            .collect();

        let window = recent_window(&history, 2);
        let texts: Vec<String> = window.iter().map(ChatMessage::text).collect();
        assert_eq!(
            texts,
            vec!["pregunta 2", "respuesta 2", "pregunta 3", "respuesta 3"]
        );
    }

    #[test]
    fn test_only_latest_image_is_kept() {
        let history = vec![
            ChatMessage::user_with_image("Identify the organism in the picture.", IMAGE),
            ChatMessage::assistant("Es probablemente un **barranquero**."),
            ChatMessage::user_with_image("Identify the organism in the picture.", IMAGE),
            ChatMessage::assistant("Parece una **heliconia**."),
            ChatMessage::user("¿Dónde crece?"),
        ];

        let window = recent_window(&history, 5);
        assert_eq!(window.len(), 4);
        assert_eq!(window.iter().filter(|m| m.has_image()).count(), 1);
        assert!(window[1].has_image());
        assert_eq!(window[2].text(), "Parece una **heliconia**.");
    }

    #[test]
    fn test_empty_messages_are_dropped() {
        let history = vec![
            ChatMessage::user("hola"),
            ChatMessage::assistant("   "),
            ChatMessage::user("¿Qué aves hay en el parque?"),
        ];
        let window = recent_window(&history, 5);
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn test_zero_turns_is_empty() {
        let history = vec![ChatMessage::user("hola")];
        assert!(recent_window(&history, 0).is_empty());
        assert!(recent_window(&[], 5).is_empty());
    }
}
