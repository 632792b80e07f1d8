//! Conversation context builder.
//!
//! Assembles the ordered message list replayed to the model: the most
//! recent `limit` messages in chronological order, minus the message that
//! was just appended for the current turn (it is passed separately as the
//! new user turn). Older context is silently dropped -- a deliberate
//! bounded-window policy.

use mn_domain::chat::Message;
use mn_domain::error::Result;
use mn_store::Database;

pub fn build_history(
    db: &Database,
    conversation_id: i64,
    limit: usize,
    exclude_message_id: i64,
) -> Result<Vec<Message>> {
    let rows = db.recent_messages(conversation_id, limit)?;
    Ok(rows
        .into_iter()
        .filter(|m| m.id != exclude_message_id)
        .map(|m| match m.role.as_str() {
            "assistant" => Message::assistant(m.content),
            _ => Message::user(m.content),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mn_domain::chat::Role;

    #[test]
    fn excludes_the_current_turn_message() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.create_conversation("t").unwrap();
        db.append_message(conv.id, "user", "q1").unwrap();
        db.append_message(conv.id, "assistant", "a1").unwrap();
        let current = db.append_message(conv.id, "user", "q2").unwrap();

        let history = build_history(&db, conv.id, 10, current.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content.extract_all_text(), "q1");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content.extract_all_text(), "a1");
    }

    #[test]
    fn window_is_bounded_and_chronological() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.create_conversation("t").unwrap();
        for i in 0..8 {
            db.append_message(conv.id, "user", &format!("m{i}")).unwrap();
        }
        let current = db.append_message(conv.id, "user", "now").unwrap();

        // Window of 4 covers the current message plus the 3 before it.
        let history = build_history(&db, conv.id, 4, current.id).unwrap();
        let contents: Vec<_> = history
            .iter()
            .map(|m| m.content.extract_all_text())
            .collect();
        assert_eq!(contents, vec!["m5", "m6", "m7"]);
    }

    #[test]
    fn same_state_builds_identical_history() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.create_conversation("t").unwrap();
        db.append_message(conv.id, "user", "q").unwrap();
        let current = db.append_message(conv.id, "user", "now").unwrap();

        let a = build_history(&db, conv.id, 10, current.id).unwrap();
        let b = build_history(&db, conv.id, 10, current.id).unwrap();
        let texts = |h: &[Message]| {
            h.iter()
                .map(|m| m.content.extract_all_text())
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(&a), texts(&b));
    }
}
