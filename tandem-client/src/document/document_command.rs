use tokio::sync::oneshot;

#[derive(Debug)]
pub enum DocumentCommand {
    /// Stop autosave and end the actor.
    Close { reply: oneshot::Sender<()> },
}
