use raet_transaction::Delivery;
use std::sync::mpsc::{Receiver, Sender};

/// The application's read side of the stack: every delivered message or
/// delivery failure lands here, drained at the application's own pace.
pub struct Inbox {
    rx: Receiver<Delivery>,
}

impl Inbox {
    pub fn try_recv(&self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            out.push(item);
        }
        out
    }
}

pub(crate) fn channel() -> (Sender<Delivery>, Inbox) {
    let (tx, rx) = std::sync::mpsc::channel();
    (tx, Inbox { rx })
}
