//! Work queue from the tray thread to the UI thread

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Requests the tray can make of the UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowCredits,
    /// Add or replace a rule
    OpenSettings,
    /// Remove a rule
    Delete,
    ListRules,
    ToggleEnabled,
    Reload,
    Exit,
}

/// Create a connected sender/queue pair
pub fn channel() -> (CommandSender, CommandQueue) {
    let (tx, rx) = unbounded();
    (CommandSender { tx }, CommandQueue { rx })
}

/// Cloneable producer side, safe to move to other threads
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Queue a command. Returns `false` once the UI thread is gone.
    pub fn enqueue(&self, command: Command) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(?command, "command dropped, queue closed");
                false
            }
        }
    }
}

/// Consumer side, owned by the UI thread
pub struct CommandQueue {
    rx: Receiver<Command>,
}

impl CommandQueue {
    /// Take every command queued so far without blocking
    pub fn drain(&self) -> Vec<Command> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_each_command_once_in_order() {
        let (tx, queue) = channel();
        assert!(tx.enqueue(Command::ListRules));
        assert!(tx.enqueue(Command::ToggleEnabled));

        assert_eq!(queue.drain(), vec![Command::ListRules, Command::ToggleEnabled]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn enqueue_from_other_thread() {
        let (tx, queue) = channel();
        let sender = tx.clone();
        std::thread::spawn(move || sender.enqueue(Command::Exit))
            .join()
            .unwrap();
        assert_eq!(queue.drain(), vec![Command::Exit]);
    }

    #[test]
    fn enqueue_after_queue_dropped_reports_false() {
        let (tx, queue) = channel();
        drop(queue);
        assert!(!tx.enqueue(Command::Reload));
    }
}
