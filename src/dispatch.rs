//! Routing validated requests to their handlers.

use std::sync::Arc;

use log::{debug, error, warn};

use crate::error::HandlerError;
use crate::protocol::{ClientMessage, ConfigRecord, SaveRecord, ServerMessage};
use crate::thread_pool::ThreadPool;
use crate::writer::ResponseWriter;

/// Outcome of a single handler call.
pub type HandlerResult = Result<ServerMessage, HandlerError>;

/// One operation per request tag.
///
/// A handler set that does not serve a tag returns
/// [`HandlerError::Unsupported`]; the client then gets an `Unknown message`
/// error and the connection carries on.
pub trait Handlers: Clone + Send + 'static {
    /// `get_config`
    fn get_config(&self, id: String) -> HandlerResult;
    /// `update_config`
    fn update_config(&self, config: ConfigRecord) -> HandlerResult;
    /// `save_message`
    fn save_message(&self, record: SaveRecord) -> HandlerResult;
    /// `get_message`
    fn get_message(&self, id: String) -> HandlerResult;
    /// `save_user`
    fn save_user(&self, record: SaveRecord) -> HandlerResult;
    /// `get_user`
    fn get_user(&self, id: String) -> HandlerResult;
    /// `put_test_data`
    fn put_test_data(&self, data: String) -> HandlerResult;
    /// `get_test_data`
    fn get_test_data(&self, id: String) -> HandlerResult;
}

/// Hands each request to its handler on the worker pool.
pub struct Dispatcher<H, P> {
    handlers: H,
    pool: Arc<P>,
    writer: ResponseWriter,
}

impl<H: Handlers, P: ThreadPool> Dispatcher<H, P> {
    /// Dispatcher answering on `writer`.
    pub fn new(handlers: H, pool: Arc<P>, writer: ResponseWriter) -> Self {
        Self {
            handlers,
            pool,
            writer,
        }
    }

    /// Queue `message` for its handler and return without waiting.
    ///
    /// The handler's response is written whenever it finishes, so responses
    /// to pipelined requests may come back in a different order.
    pub fn dispatch(&self, message: ClientMessage) {
        let handlers = self.handlers.clone();
        let writer = self.writer.clone();
        self.pool.spawn(move || {
            let response = run(&handlers, message);
            if let Err(e) = writer.write(&response) {
                warn!("dropping response, connection is gone: {e}");
            }
        });
    }
}

fn run<H: Handlers>(handlers: &H, message: ClientMessage) -> ServerMessage {
    let tag = message.tag();
    debug!("handling {tag}");
    let result = match message {
        ClientMessage::GetConfig { id } => handlers.get_config(id),
        ClientMessage::UpdateConfig { config } => handlers.update_config(config),
        ClientMessage::SaveMessage(record) => handlers.save_message(record),
        ClientMessage::GetMessage { id } => handlers.get_message(id),
        ClientMessage::SaveUser(record) => handlers.save_user(record),
        ClientMessage::GetUser { id } => handlers.get_user(id),
        ClientMessage::PutTestData { data } => handlers.put_test_data(data),
        ClientMessage::GetTestData { id } => handlers.get_test_data(id),
    };

    match result {
        Ok(response) => response,
        Err(e @ HandlerError::Unsupported(_)) => {
            error!("no handler serves {tag}; answering with an error");
            ServerMessage::error(e.to_string())
        }
        Err(e @ HandlerError::Invalid(_)) => {
            warn!("stored document for {tag} does not match its response shape: {e}");
            ServerMessage::error(e.to_string())
        }
        Err(HandlerError::Store(e)) => {
            error!("store failure while handling {tag}: {e}");
            ServerMessage::error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{InlinePool, ScriptedHandlers, SharedSink};
    use serde_json::json;

    fn dispatcher(
        handlers: ScriptedHandlers,
    ) -> (Dispatcher<ScriptedHandlers, InlinePool>, SharedSink) {
        let sink = SharedSink::default();
        let writer = ResponseWriter::new(sink.clone());
        (
            Dispatcher::new(handlers, Arc::new(InlinePool), writer),
            sink,
        )
    }

    #[test]
    fn each_tag_reaches_its_handler() {
        let handlers = ScriptedHandlers::default();
        let (dispatcher, sink) = dispatcher(handlers.clone());
        dispatcher.dispatch(ClientMessage::GetUser { id: "1".into() });
        dispatcher.dispatch(ClientMessage::SaveMessage(SaveRecord::default()));
        dispatcher.dispatch(ClientMessage::GetTestData { id: "t".into() });

        assert_eq!(handlers.calls(), vec!["get_user", "save_message", "get_test_data"]);
        assert_eq!(sink.lines().len(), 3);
    }

    #[test]
    fn unsupported_tag_becomes_an_error_response() {
        let (dispatcher, sink) = dispatcher(ScriptedHandlers::default());
        dispatcher.dispatch(ClientMessage::PutTestData { data: "x".into() });
        assert_eq!(
            sink.lines(),
            vec![json!({"message": "error", "error": "Unknown message: put_test_data"})]
        );
    }

    #[test]
    fn handler_failures_are_answered_with_their_message() {
        let (dispatcher, sink) = dispatcher(ScriptedHandlers::default());
        dispatcher.dispatch(ClientMessage::GetConfig { id: "g".into() });
        dispatcher.dispatch(ClientMessage::UpdateConfig {
            config: ConfigRecord {
                guild: "g".into(),
                fields: Default::default(),
            },
        });
        assert_eq!(
            sink.lines(),
            vec![
                json!({
                    "message": "error",
                    "error": r#"{"_errors":["Expected object, received string"]}"#,
                }),
                json!({"message": "error", "error": "the collection config does not exist"}),
            ]
        );
    }

    #[test]
    fn closed_connection_does_not_stop_dispatch() {
        let handlers = ScriptedHandlers::default();
        let (dispatcher, sink) = dispatcher(handlers.clone());
        dispatcher.writer.close();
        dispatcher.dispatch(ClientMessage::GetUser { id: "1".into() });
        assert_eq!(handlers.calls(), vec!["get_user"]);
        assert!(sink.lines().is_empty());
    }
}
