//! Reply filter: first qualifying message from the target conversation, in arrival order.

use crate::channels::InboundMessage;

/// First message from `conversation_id` whose trimmed text is non-empty and passes `accept`.
pub fn select_where<'a, I, F>(
    batch: I,
    conversation_id: &str,
    mut accept: F,
) -> Option<&'a InboundMessage>
where
    I: IntoIterator<Item = &'a InboundMessage>,
    F: FnMut(&str) -> bool,
{
    batch.into_iter().find(|m| {
        let text = m.text.trim();
        m.conversation_id == conversation_id && !text.is_empty() && accept(text)
    })
}
