//! Context window: the slice of history sent on each round-trip.
//!
//! System messages (the base prompt and every skill injection) are always
//! sent, first and in order. The rest is cut to the most recent turns,
//! where a turn starts at a user message.

use capstan_core::message::{Conversation, Message, Role};
use tracing::debug;

/// Default number of user turns kept in the window.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Calls whose exchanges are folded away once a skill is enabled.
pub const DISCOVERY_TOOLS: [&str; 3] = ["list_skills", "list_files", "search_skills"];

#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    max_turns: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ContextWindow {
    /// `max_turns` of zero is treated as one.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Build the view for one request without touching the history.
    pub fn window_for(&self, conversation: &Conversation) -> Vec<Message> {
        let (mut view, chat): (Vec<&Message>, Vec<&Message>) = conversation
            .snapshot()
            .iter()
            .partition(|m| m.role == Role::System);

        let turn_starts: Vec<usize> = chat
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();

        let mut start = match turn_starts.len().checked_sub(self.max_turns) {
            Some(skip) if skip > 0 => turn_starts[skip],
            _ => 0,
        };

        // Never open on a result whose call was cut off
        while chat.get(start).is_some_and(|m| m.role == Role::Tool) {
            start += 1;
        }

        view.extend_from_slice(&chat[start..]);
        view.into_iter().cloned().collect()
    }
}

/// Remove every closed single-call exchange to a discovery tool.
///
/// Returns how many exchanges were removed. Running it again right away
/// removes nothing.
pub fn fold_discovery_noise(conversation: &mut Conversation) -> usize {
    let mut folded = 0;
    let mut index = 0;

    while index < conversation.len() {
        let discovery_call = conversation
            .snapshot()
            .get(index)
            .filter(|_| conversation.is_single_exchange(index))
            .and_then(|m| m.calls.first())
            .filter(|call| DISCOVERY_TOOLS.contains(&call.name.as_str()))
            .map(|call| call.name.clone());

        match discovery_call {
            Some(name) if conversation.remove_exchange(index).is_ok() => {
                debug!(tool = %name, index, "Folded discovery exchange");
                folded += 1;
            }
            _ => index += 1,
        }
    }

    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_core::message::ToolCall;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, serde_json::Map::new())
    }

    fn exchange(conv: &mut Conversation, id: &str, name: &str) {
        conv.append(Message::assistant_calls(None, vec![call(id, name)]))
            .unwrap();
        conv.append(Message::tool_result(id, format!("{name} output")))
            .unwrap();
    }

    fn texts(view: &[Message]) -> Vec<String> {
        view.iter().map(|m| m.text().to_string()).collect()
    }

    #[test]
    fn keeps_system_first_and_last_turns() {
        let mut conv = Conversation::with_system_prompt("sys");
        for i in 1..=3 {
            conv.append(Message::user(format!("q{i}"))).unwrap();
            conv.append(Message::assistant(format!("a{i}"))).unwrap();
        }
        conv.append(Message::system("injected")).unwrap();

        let view = ContextWindow::new(2).window_for(&conv);
        assert_eq!(texts(&view), vec!["sys", "injected", "q2", "a2", "q3", "a3"]);
        assert_eq!(conv.len(), 8);
    }

    #[test]
    fn short_history_is_sent_whole() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("q1")).unwrap();
        conv.append(Message::assistant("a1")).unwrap();

        let view = ContextWindow::default().window_for(&conv);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn turn_includes_its_call_exchanges() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("q1")).unwrap();
        conv.append(Message::assistant("a1")).unwrap();
        conv.append(Message::user("q2")).unwrap();
        exchange(&mut conv, "c1", "run_command");
        conv.append(Message::assistant("a2")).unwrap();

        let view = ContextWindow::new(1).window_for(&conv);
        assert_eq!(view[1].text(), "q2");
        assert_eq!(view[2].calls[0].id, "c1");
        assert_eq!(view[3].call_id.as_deref(), Some("c1"));
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn window_never_opens_on_a_tool_result() {
        let mut conv = Conversation::with_system_prompt("sys");
        for i in 0..4 {
            conv.append(Message::user(format!("q{i}"))).unwrap();
            exchange(&mut conv, &format!("c{i}"), "read_file");
            conv.append(Message::assistant(format!("a{i}"))).unwrap();
        }
        for turns in 1..=5 {
            let view = ContextWindow::new(turns).window_for(&conv);
            let first_chat = view.iter().find(|m| m.role != Role::System).unwrap();
            assert_ne!(first_chat.role, Role::Tool);
        }
    }

    #[test]
    fn folds_single_discovery_exchanges() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("use the calculator")).unwrap();
        exchange(&mut conv, "c1", "list_skills");
        exchange(&mut conv, "c2", "run_command");
        exchange(&mut conv, "c3", "search_skills");
        exchange(&mut conv, "c4", "list_files");

        assert_eq!(fold_discovery_noise(&mut conv), 3);
        let names: Vec<&str> = conv
            .snapshot()
            .iter()
            .flat_map(|m| m.calls.iter().map(|c| c.name.as_str()))
            .collect();
        assert_eq!(names, vec!["run_command"]);
        assert_eq!(conv.len(), 4);
    }

    #[test]
    fn fold_is_idempotent() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("hi")).unwrap();
        exchange(&mut conv, "c1", "list_skills");
        assert_eq!(fold_discovery_noise(&mut conv), 1);
        let after_first: Vec<String> = conv.snapshot().iter().map(|m| m.id.clone()).collect();
        assert_eq!(fold_discovery_noise(&mut conv), 0);
        let after_second: Vec<String> = conv.snapshot().iter().map(|m| m.id.clone()).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn multi_call_batches_are_kept() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("hi")).unwrap();
        conv.append(Message::assistant_calls(
            None,
            vec![call("a", "list_skills"), call("b", "list_files")],
        ))
        .unwrap();
        conv.append(Message::tool_result("a", "x")).unwrap();
        conv.append(Message::tool_result("b", "y")).unwrap();

        assert_eq!(fold_discovery_noise(&mut conv), 0);
        assert_eq!(conv.len(), 5);
    }

    #[test]
    fn open_batch_is_left_alone() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.append(Message::user("hi")).unwrap();
        exchange(&mut conv, "c1", "list_skills");
        conv.append(Message::assistant_calls(None, vec![call("c2", "list_skills")]))
            .unwrap();

        assert_eq!(fold_discovery_noise(&mut conv), 1);
        assert_eq!(conv.outstanding_calls(), ["c2"]);
        conv.append(Message::tool_result("c2", "done")).unwrap();
    }
}
