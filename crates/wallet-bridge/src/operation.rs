//! Progress reporting for wallet operations
//!
//! An operation reports up to two kinds of intermediate events before its
//! result: `Connected` once a usable session exists, and `StatusUpdate` when
//! the user has to switch to the wallet app. [`operation_events`] turns an
//! operation into a stream that always ends with exactly one `Completed`.

use std::future::Future;

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::status::WalletInfo;

/// Intermediate event of a running operation
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Connected(WalletInfo),
    StatusUpdate { needs_app_switch: bool },
}

/// Event yielded by an operation stream; `Completed` is terminal
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent<T> {
    Connected(WalletInfo),
    StatusUpdate { needs_app_switch: bool },
    Completed(Result<T>),
}

impl<T> From<ProgressEvent> for OperationEvent<T> {
    fn from(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Connected(info) => OperationEvent::Connected(info),
            ProgressEvent::StatusUpdate { needs_app_switch } => {
                OperationEvent::StatusUpdate { needs_app_switch }
            }
        }
    }
}

/// Sink for the intermediate events of one operation. A silent sink drops them.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn connected(&self, info: &WalletInfo) {
        self.emit(ProgressEvent::Connected(info.clone()));
    }

    /// The user must bring the wallet app to the foreground
    pub fn needs_app_switch(&self) {
        self.emit(ProgressEvent::StatusUpdate {
            needs_app_switch: true,
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

enum Step<T> {
    Event(ProgressEvent),
    Done(Result<T>),
}

/// Run an operation and yield its events in order, ending with `Completed`
pub fn operation_events<T, F, Fut>(run: F) -> impl Stream<Item = OperationEvent<T>>
where
    F: FnOnce(Progress) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    async_stream::stream! {
        let (progress, mut events) = Progress::channel();
        let operation = run(progress);
        tokio::pin!(operation);

        let result = loop {
            let step = tokio::select! {
                biased;
                Some(event) = events.recv() => Step::Event(event),
                result = &mut operation => Step::Done(result),
            };
            match step {
                Step::Event(event) => yield OperationEvent::from(event),
                Step::Done(result) => break result,
            }
        };

        while let Ok(event) = events.try_recv() {
            yield OperationEvent::from(event);
        }
        yield OperationEvent::Completed(result);
    }
}
