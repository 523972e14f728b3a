use chrono::DateTime;

use connections::common::{Conversation, Group, Message, Person};

/// Label of the refresh control: disabled while a countdown runs.
pub fn refresh_label(countdown: u64) -> String {
    if countdown == 0 {
        "[refresh]".to_string()
    } else {
        format!("[refresh in {countdown}s]")
    }
}

pub fn groups(groups: &[Group], own_uid: &str) -> String {
    if groups.is_empty() {
        return "No groups yet".to_string();
    }
    groups
        .iter()
        .map(|group| {
            let mine = if group.created_by == own_uid { " *" } else { "" };
            format!("  {}  {}{mine}", group.id, group.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn people(people: &[Person], conversations: &[Conversation]) -> String {
    if people.is_empty() {
        return "No people found".to_string();
    }
    people
        .iter()
        .map(|person| {
            let has_chat = conversations
                .iter()
                .any(|conversation| conversation.companion_id == person.uid);
            let marker = if has_chat { "●" } else { " " };
            format!("{marker} {}  {}", person.uid, person.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn messages(messages: &[Message], own_uid: &str) -> String {
    if messages.is_empty() {
        return "No messages yet".to_string();
    }
    messages
        .iter()
        .map(|message| {
            let author = if message.author_id == own_uid {
                "You"
            } else {
                message.author_name.as_str()
            };
            format!("[{}] {author}: {}", timestamp(message.created_at), message.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_label() {
        assert_eq!(refresh_label(0), "[refresh]");
        assert_eq!(refresh_label(42), "[refresh in 42s]");
    }

    #[test]
    fn test_own_messages_are_marked() {
        let mut theirs = Message::new("u2", "hi", 0);
        theirs.author_name = "Bob".into();
        let mine = Message::new("me", "hello", 1_000);

        let out = messages(&[theirs, mine], "me");
        assert_eq!(
            out,
            "[1970-01-01 00:00:00] Bob: hi\n[1970-01-01 00:00:01] You: hello"
        );
    }

    #[test]
    fn test_people_marks_existing_conversations() {
        let people_list = vec![
            Person {
                uid: "u1".into(),
                name: "Alice".into(),
            },
            Person {
                uid: "u2".into(),
                name: "Bob".into(),
            },
        ];
        let conversations = vec![Conversation {
            id: "c1".into(),
            companion_id: "u2".into(),
        }];

        let out = people(&people_list, &conversations);
        assert_eq!(out, "  u1  Alice\n● u2  Bob");
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(groups(&[], "me"), "No groups yet");
        assert_eq!(people(&[], &[]), "No people found");
    }
}
