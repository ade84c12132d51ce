use std::collections::VecDeque;

use futures::{stream, Stream};

use crate::{
    chat::{ChatClient, ChatError, PageRequest, ResolvedChannel},
    domain::{DateWindow, Message},
};

struct Cursor {
    buffer: VecDeque<Message>,
    next: PageRequest,
}

/// Messages of `window`, newest first.
///
/// Pages are requested backward from `window.end`. The stream ends at the
/// first message older than `window.start`; the lower bound is enforced
/// here, not by the remote.
pub fn history_in_window<'a>(
    client: &'a dyn ChatClient,
    channel: &'a ResolvedChannel,
    window: DateWindow,
    page_size: u32,
) -> impl Stream<Item = Result<Message, ChatError>> + 'a {
    let cursor = Cursor {
        buffer: VecDeque::new(),
        next: PageRequest {
            offset_date: window.end,
            offset_id: None,
            limit: page_size.max(1),
        },
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        loop {
            if let Some(message) = cursor.buffer.pop_front() {
                if message.timestamp < window.start {
                    return Ok(None);
                }
                if !window.contains(message.timestamp) {
                    continue;
                }
                return Ok(Some((message, cursor)));
            }

            let mut page = client.history_page(channel, cursor.next).await?;
            // Ids at or above the cursor were already yielded; a page with
            // nothing older ends the history.
            if let Some(prev) = cursor.next.offset_id {
                page.retain(|m| m.id < prev);
            }
            let Some(last_id) = page.last().map(|m| m.id) else {
                return Ok(None);
            };
            cursor.next.offset_id = Some(last_id);
            cursor.buffer.extend(page);
        }
    })
}
